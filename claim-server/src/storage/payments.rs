use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use shared::models::{Claim, Payment};

use super::{
    CLAIM_PAYMENTS_TABLE, ClaimStorage, PAYMENTS_TABLE, StorageError, StorageResult,
};

/// Result of applying a gateway status to a stored payment
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub payment: Payment,
    /// false when the status was already recorded
    pub changed: bool,
}

impl ClaimStorage {
    // ========== Payout Commit ==========

    /// Persist a gateway-accepted payment together with the confirmed claim
    ///
    /// Payment row, claim index and claim are written in one transaction.
    /// Fails with [`StorageError::DuplicatePayment`] if the claim already has
    /// a payment that did not fail, so a claim is never paid twice even if
    /// two callers get this far.
    pub fn commit_payout(&self, claim: &Claim, payment: &Payment) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.ensure_no_live_payment_txn(&txn, &payment.claim_id)?;

        {
            let mut payments = txn.open_table(PAYMENTS_TABLE)?;
            if payments.get(payment.konsol_id.as_str())?.is_some() {
                return Err(StorageError::DuplicatePayment {
                    claim_id: payment.claim_id.clone(),
                    konsol_id: payment.konsol_id.clone(),
                });
            }
            let value = serde_json::to_vec(payment)?;
            payments.insert(payment.konsol_id.as_str(), value.as_slice())?;

            let mut index = txn.open_table(CLAIM_PAYMENTS_TABLE)?;
            index.insert(payment.claim_id.as_str(), payment.konsol_id.as_str())?;
        }

        self.update_claim_txn(&txn, claim)?;
        txn.commit()?;
        Ok(())
    }

    fn ensure_no_live_payment_txn(&self, txn: &WriteTransaction, claim_id: &str) -> StorageResult<()> {
        let index = txn.open_table(CLAIM_PAYMENTS_TABLE)?;
        let existing = match index.get(claim_id)? {
            Some(guard) => guard.value().to_string(),
            None => return Ok(()),
        };

        let payments = txn.open_table(PAYMENTS_TABLE)?;
        let live = match payments.get(existing.as_str())? {
            Some(value) => !serde_json::from_slice::<Payment>(value.value())?.is_failed(),
            None => false,
        };
        if live {
            return Err(StorageError::DuplicatePayment {
                claim_id: claim_id.to_string(),
                konsol_id: existing,
            });
        }
        Ok(())
    }

    // ========== Payment Operations ==========

    pub fn get_payment(&self, konsol_id: &str) -> StorageResult<Option<Payment>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENTS_TABLE)?;

        match table.get(konsol_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Latest payment recorded for a claim
    pub fn get_payment_for_claim(&self, claim_id: &str) -> StorageResult<Option<Payment>> {
        let konsol_id = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_table(CLAIM_PAYMENTS_TABLE)?;
            match index.get(claim_id)? {
                Some(guard) => guard.value().to_string(),
                None => return Ok(None),
            }
        };
        self.get_payment(&konsol_id)
    }

    /// Apply an observed gateway status in one read-modify-write transaction
    ///
    /// Only `status`, `updated_at` and `paid_at` can change. Applying the
    /// status already stored commits nothing and reports `changed: false`.
    pub fn apply_payment_status(
        &self,
        konsol_id: &str,
        status: &str,
        paid_status: &str,
        now: i64,
    ) -> StorageResult<StatusUpdate> {
        let txn = self.begin_write()?;
        let update = {
            let mut table = txn.open_table(PAYMENTS_TABLE)?;
            let mut payment: Payment = match table.get(konsol_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::PaymentNotFound(konsol_id.to_string())),
            };

            let changed = payment.apply_status(status, paid_status, now);
            if changed {
                let value = serde_json::to_vec(&payment)?;
                table.insert(konsol_id, value.as_slice())?;
            }
            StatusUpdate { payment, changed }
        };

        if update.changed {
            txn.commit()?;
        } else {
            txn.abort()?;
        }
        Ok(update)
    }

    /// Payments whose status is not in `terminal_statuses`
    pub fn list_open_payments(&self, terminal_statuses: &[String]) -> StorageResult<Vec<Payment>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENTS_TABLE)?;

        let mut payments = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let payment: Payment = serde_json::from_slice(value.value())?;
            if !payment.is_terminal(terminal_statuses) {
                payments.push(payment);
            }
        }

        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::{BankDetails, ClaimStatus, NewPayment, PayoutDestination};

    const PAID: &str = "executed";

    fn reviewed_claim(storage: &ClaimStorage) -> Claim {
        let txn = storage.begin_write().unwrap();
        let mut claim = storage
            .insert_new_claim_txn(&txn, |id| {
                Claim::new_draft(id, 42, Some("Ivan".into()), "ABC123", Decimal::new(10000, 2), 1)
            })
            .unwrap();
        txn.commit().unwrap();
        claim
            .submit_for_review(
                PayoutDestination::Card {
                    card_number: "1234567812345678".into(),
                },
                2,
            )
            .unwrap();
        storage.update_claim(&claim).unwrap();
        claim
    }

    fn payment_for(claim: &Claim, konsol_id: &str, status: &str) -> Payment {
        Payment::new(
            NewPayment {
                konsol_id: konsol_id.into(),
                claim_id: claim.claim_id.clone(),
                user_id: claim.user_id,
                contractor_id: "ctr_1".into(),
                amount: claim.amount,
                purpose: "Prize payout".into(),
                bank_details: BankDetails::Card {
                    card_number: "1234567812345678".into(),
                },
                status: status.into(),
            },
            PAID,
            10,
        )
    }

    #[test]
    fn test_commit_payout_writes_all_records() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let mut claim = reviewed_claim(&storage);
        let payment = payment_for(&claim, "pay_1", "created");
        claim.confirm("pay_1", 10).unwrap();

        storage.commit_payout(&claim, &payment).unwrap();

        let stored = storage.get_claim(&claim.claim_id).unwrap().unwrap();
        assert_eq!(stored.claim_status(), ClaimStatus::Confirm);
        assert_eq!(stored.konsol_payment_id(), Some("pay_1"));
        assert_eq!(storage.get_payment("pay_1").unwrap().unwrap().status, "created");
        assert_eq!(
            storage
                .get_payment_for_claim(&claim.claim_id)
                .unwrap()
                .unwrap()
                .konsol_id,
            "pay_1"
        );
    }

    #[test]
    fn test_second_live_payment_rejected() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let mut claim = reviewed_claim(&storage);
        let first = payment_for(&claim, "pay_1", "created");
        let pending = claim.clone();
        claim.confirm("pay_1", 10).unwrap();
        storage.commit_payout(&claim, &first).unwrap();

        let mut racing = pending;
        racing.confirm("pay_2", 11).unwrap();
        let second = payment_for(&racing, "pay_2", "created");
        assert!(matches!(
            storage.commit_payout(&racing, &second),
            Err(StorageError::DuplicatePayment { konsol_id, .. }) if konsol_id == "pay_1"
        ));

        assert!(storage.get_payment("pay_2").unwrap().is_none());
        let stored = storage.get_claim(&claim.claim_id).unwrap().unwrap();
        assert_eq!(stored.konsol_payment_id(), Some("pay_1"));
    }

    #[test]
    fn test_invalid_claim_rolls_back_payment() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let claim = reviewed_claim(&storage);
        let payment = payment_for(&claim, "pay_1", "created");

        // A claim row that fails validation aborts the payment insert too
        let mut json = serde_json::to_value(&claim).unwrap();
        json["claim_status"] = "confirm".into();
        let broken: Claim = serde_json::from_value(json).unwrap();

        assert!(matches!(
            storage.commit_payout(&broken, &payment),
            Err(StorageError::Invariant(_))
        ));
        assert!(storage.get_payment("pay_1").unwrap().is_none());
        assert!(storage.get_payment_for_claim(&claim.claim_id).unwrap().is_none());
    }

    #[test]
    fn test_apply_payment_status_idempotent() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let mut claim = reviewed_claim(&storage);
        let payment = payment_for(&claim, "pay_1", "created");
        claim.confirm("pay_1", 10).unwrap();
        storage.commit_payout(&claim, &payment).unwrap();

        let first = storage.apply_payment_status("pay_1", PAID, PAID, 100).unwrap();
        assert!(first.changed);
        assert_eq!(first.payment.paid_at, Some(100));

        let second = storage.apply_payment_status("pay_1", PAID, PAID, 200).unwrap();
        assert!(!second.changed);
        assert_eq!(second.payment.paid_at, Some(100));
        assert_eq!(storage.get_payment("pay_1").unwrap().unwrap().updated_at, 100);

        assert!(matches!(
            storage.apply_payment_status("missing", PAID, PAID, 300),
            Err(StorageError::PaymentNotFound(_))
        ));
    }

    #[test]
    fn test_list_open_payments() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let mut claim = reviewed_claim(&storage);
        let payment = payment_for(&claim, "pay_1", "created");
        claim.confirm("pay_1", 10).unwrap();
        storage.commit_payout(&claim, &payment).unwrap();

        let terminal = vec![PAID.to_string(), "failed".to_string()];
        assert_eq!(storage.list_open_payments(&terminal).unwrap().len(), 1);

        storage.apply_payment_status("pay_1", PAID, PAID, 100).unwrap();
        assert!(storage.list_open_payments(&terminal).unwrap().is_empty());
    }
}
