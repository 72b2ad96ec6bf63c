use serde::Serialize;
use shared::models::{BankDetails, Claim, NewPayment, Payment, PaymentMethod, ProcessStatus};
use shared::util::now_millis;
use std::sync::Arc;

use super::error::{ClaimError, ClaimResult, Prerequisite};
use crate::gateway::{
    BankMember, ContractorProfile, CreatePaymentRequest, GatewayError, PayoutGateway,
};
use crate::locks::ClaimLocks;
use crate::notify::ClaimNotifier;
use crate::storage::ClaimStorage;

/// Payout parameters taken from configuration
#[derive(Debug, Clone)]
pub struct PayoutSettings {
    /// Payment purpose, also used as the service line title
    pub purpose: String,
    /// Gateway status that marks a payment as paid
    pub paid_status: String,
    /// Contact phone for card-payout contractors
    pub placeholder_phone: String,
}

/// A committed payout
#[derive(Debug, Clone, Serialize)]
pub struct Payout {
    pub claim: Claim,
    pub payment: Payment,
}

/// The only component that decides claims and starts payouts
///
/// Every decision runs under the claim lock and re-reads the claim first,
/// so a duplicate approve sees the first one's result.
#[derive(Clone)]
pub struct ClaimController {
    storage: ClaimStorage,
    gateway: Arc<dyn PayoutGateway>,
    notifier: Arc<dyn ClaimNotifier>,
    locks: Arc<ClaimLocks>,
    settings: Arc<PayoutSettings>,
}

impl std::fmt::Debug for ClaimController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimController")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ClaimController {
    pub fn new(
        storage: ClaimStorage,
        gateway: Arc<dyn PayoutGateway>,
        notifier: Arc<dyn ClaimNotifier>,
        locks: Arc<ClaimLocks>,
        settings: PayoutSettings,
    ) -> Self {
        Self {
            storage,
            gateway,
            notifier,
            locks,
            settings: Arc::new(settings),
        }
    }

    // ========== Decisions ==========

    /// Approve a claim and pay it out
    ///
    /// On any failure before the commit the claim stays
    /// `(awaiting_review, pending)` and no payment row exists. A contractor
    /// registered on the way is kept on the claim for the next attempt.
    pub async fn approve(&self, claim_id: &str, actor: &str) -> ClaimResult<Payout> {
        let key = claim_id.to_string();
        let guard = self.locks.claims.lock(&key).await;

        let mut claim = self.load_reviewable(claim_id)?;
        let bank_details = Self::bank_details(&claim)?;

        let contractor_id = match claim.contractor_id() {
            Some(id) => id.to_string(),
            None => self.register_contractor(&mut claim).await?,
        };

        let request = CreatePaymentRequest::new(
            contractor_id.clone(),
            claim.amount,
            self.settings.purpose.clone(),
            bank_details.clone(),
        );
        let created = match self.gateway.create_payment(&request).await {
            Ok(created) if !created.id.is_empty() => created,
            Ok(_) => {
                return Err(GatewayError::InvalidResponse("payment without id".to_string()).into());
            }
            Err(e) => {
                tracing::warn!(claim_id, actor, error = %e, "Payment creation failed");
                return Err(e.into());
            }
        };

        let now = now_millis();
        let payment = Payment::new(
            NewPayment {
                konsol_id: created.id.clone(),
                claim_id: claim.claim_id.clone(),
                user_id: claim.user_id,
                contractor_id,
                amount: claim.amount,
                purpose: self.settings.purpose.clone(),
                bank_details,
                status: created.status.clone(),
            },
            &self.settings.paid_status,
            now,
        );
        claim
            .confirm(created.id.as_str(), now)
            .map_err(|e| ClaimError::from_invariant(claim_id, e))?;

        if let Err(e) = self.storage.commit_payout(&claim, &payment) {
            // Money may move; the gateway id is the only trace of it
            tracing::error!(
                claim_id,
                konsol_id = %created.id,
                actor,
                error = %e,
                "Payment created at gateway but not recorded"
            );
            return Err(e.into());
        }

        drop(guard);
        self.locks.claims.evict(&key);

        tracing::info!(
            claim_id,
            konsol_id = %payment.konsol_id,
            status = %payment.status,
            actor,
            "Claim approved, payout created"
        );
        self.notifier.payout_sent(&claim).await;
        Ok(Payout { claim, payment })
    }

    /// Reject a claim; no gateway call, irreversible
    pub async fn reject(&self, claim_id: &str, actor: &str) -> ClaimResult<Claim> {
        let key = claim_id.to_string();
        let guard = self.locks.claims.lock(&key).await;

        let mut claim = self.load_reviewable(claim_id)?;
        claim
            .cancel(now_millis())
            .map_err(|e| ClaimError::from_invariant(claim_id, e))?;
        self.storage.update_claim(&claim)?;

        drop(guard);
        self.locks.claims.evict(&key);

        tracing::info!(claim_id, actor, "Claim rejected");
        self.notifier.claim_rejected(&claim).await;
        Ok(claim)
    }

    /// Record the gateway bank reference for a phone payout
    pub async fn set_bank_member_id(
        &self,
        claim_id: &str,
        bank_member_id: &str,
        actor: &str,
    ) -> ClaimResult<Claim> {
        let _guard = self.locks.claims.lock(&claim_id.to_string()).await;

        let mut claim = self.load_reviewable(claim_id)?;
        claim
            .set_bank_member_id(bank_member_id.trim(), now_millis())
            .map_err(|e| ClaimError::from_invariant(claim_id, e))?;
        self.storage.update_claim(&claim)?;

        tracing::info!(claim_id, bank_member_id, actor, "Bank member id set");
        Ok(claim)
    }

    // ========== Reads ==========

    pub fn get_claim(&self, claim_id: &str) -> ClaimResult<Claim> {
        self.storage
            .get_claim(claim_id)?
            .ok_or_else(|| ClaimError::NotFound(claim_id.to_string()))
    }

    pub fn claim_payment(&self, claim_id: &str) -> ClaimResult<Option<Payment>> {
        Ok(self.storage.get_payment_for_claim(claim_id)?)
    }

    pub fn list_claims(&self, process_status: ProcessStatus) -> ClaimResult<Vec<Claim>> {
        Ok(self.storage.list_claims(process_status)?)
    }

    /// FPS banks, optionally filtered by a case-insensitive name fragment
    pub async fn list_bank_members(&self, query: Option<&str>) -> ClaimResult<Vec<BankMember>> {
        let mut members = self.gateway.list_bank_members().await?;
        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            members.retain(|m| m.name.to_lowercase().contains(&q));
        }
        members.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(members)
    }

    // ========== Helpers ==========

    fn load_reviewable(&self, claim_id: &str) -> ClaimResult<Claim> {
        let claim = self.get_claim(claim_id)?;
        claim
            .ensure_reviewable()
            .map_err(|e| ClaimError::from_invariant(claim_id, e))?;
        Ok(claim)
    }

    fn bank_details(claim: &Claim) -> ClaimResult<BankDetails> {
        let missing = |reason| ClaimError::MissingPrerequisite {
            claim_id: claim.claim_id.clone(),
            reason,
        };

        match claim.payment_method() {
            PaymentMethod::Phone => {
                let phone = claim
                    .phone()
                    .ok_or_else(|| missing(Prerequisite::Destination(PaymentMethod::Phone)))?;
                let bank_member_id = claim
                    .bank_member_id()
                    .ok_or_else(|| missing(Prerequisite::BankMemberId))?;
                Ok(BankDetails::Fps {
                    fps_mobile_phone: phone.to_string(),
                    fps_bank_member_id: bank_member_id.to_string(),
                })
            }
            PaymentMethod::Card => {
                let card_number = claim
                    .card_number()
                    .ok_or_else(|| missing(Prerequisite::Destination(PaymentMethod::Card)))?;
                Ok(BankDetails::Card {
                    card_number: card_number.to_string(),
                })
            }
            PaymentMethod::Unknown => Err(missing(Prerequisite::Destination(PaymentMethod::Unknown))),
        }
    }

    /// Register the claimant as a contractor and persist the id right away
    async fn register_contractor(&self, claim: &mut Claim) -> ClaimResult<String> {
        let phone = match claim.payment_method() {
            PaymentMethod::Phone => claim
                .phone()
                .map(str::to_string)
                .unwrap_or_else(|| self.settings.placeholder_phone.clone()),
            _ => self.settings.placeholder_phone.clone(),
        };
        let Some(display_name) = claim.display_name.as_deref() else {
            return Err(ClaimError::MissingPrerequisite {
                claim_id: claim.claim_id.clone(),
                reason: Prerequisite::PayeeName,
            });
        };
        let profile = ContractorProfile::individual(display_name, phone);

        let contractor_id = match self.gateway.register_contractor(&profile).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(claim_id = %claim.claim_id, error = %e, "Contractor registration failed");
                return Err(e.into());
            }
        };

        claim
            .set_contractor_id(contractor_id.as_str(), now_millis())
            .map_err(|e| ClaimError::from_invariant(&claim.claim_id, e))?;
        if let Err(e) = self.storage.update_claim(claim) {
            tracing::error!(
                claim_id = %claim.claim_id,
                contractor_id = %contractor_id,
                error = %e,
                "Contractor registered but not recorded"
            );
            return Err(e.into());
        }

        tracing::info!(claim_id = %claim.claim_id, contractor_id = %contractor_id, "Contractor registered");
        Ok(contractor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayPayment;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use shared::models::{ClaimStatus, PayoutDestination};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeGateway {
        contractors: AtomicUsize,
        payments: AtomicUsize,
        fail_payment: bool,
        last_request: Mutex<Option<CreatePaymentRequest>>,
    }

    #[async_trait]
    impl PayoutGateway for FakeGateway {
        async fn register_contractor(&self, _profile: &ContractorProfile) -> Result<String, GatewayError> {
            let n = self.contractors.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("ctr_{n}"))
        }

        async fn create_payment(
            &self,
            request: &CreatePaymentRequest,
        ) -> Result<GatewayPayment, GatewayError> {
            if self.fail_payment {
                return Err(GatewayError::Status {
                    status: 422,
                    body: "{\"error\":\"rejected\"}".into(),
                });
            }
            *self.last_request.lock().unwrap() = Some(request.clone());
            let n = self.payments.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(GatewayPayment {
                id: format!("pay_{n}"),
                status: "created".into(),
                extra: Default::default(),
            })
        }

        async fn get_payment(&self, konsol_id: &str) -> Result<GatewayPayment, GatewayError> {
            Ok(GatewayPayment {
                id: konsol_id.into(),
                status: "created".into(),
                extra: Default::default(),
            })
        }

        async fn list_bank_members(&self) -> Result<Vec<BankMember>, GatewayError> {
            Ok(vec![
                BankMember {
                    id: "100000000011".into(),
                    name: "Sberbank".into(),
                    bic: None,
                },
                BankMember {
                    id: "100000000004".into(),
                    name: "T-Bank".into(),
                    bic: None,
                },
            ])
        }
    }

    struct Silent;

    #[async_trait]
    impl ClaimNotifier for Silent {
        async fn claim_submitted(&self, _claim: &Claim) {}
        async fn payout_sent(&self, _claim: &Claim) {}
        async fn claim_rejected(&self, _claim: &Claim) {}
    }

    fn controller(gateway: Arc<FakeGateway>) -> (ClaimController, ClaimStorage) {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let controller = ClaimController::new(
            storage.clone(),
            gateway,
            Arc::new(Silent),
            Arc::new(ClaimLocks::new()),
            PayoutSettings {
                purpose: "Prize payout".into(),
                paid_status: "executed".into(),
                placeholder_phone: "+79000000000".into(),
            },
        );
        (controller, storage)
    }

    fn submitted_claim(storage: &ClaimStorage, destination: PayoutDestination) -> Claim {
        named_claim(storage, Some("Ivan Petrov"), destination)
    }

    fn named_claim(storage: &ClaimStorage, name: Option<&str>, destination: PayoutDestination) -> Claim {
        let txn = storage.begin_write().unwrap();
        let mut claim = storage
            .insert_new_claim_txn(&txn, |id| {
                Claim::new_draft(id, 42, name.map(str::to_string), "ABC123", Decimal::new(10000, 2), 1)
            })
            .unwrap();
        txn.commit().unwrap();
        claim.submit_for_review(destination, 2).unwrap();
        storage.update_claim(&claim).unwrap();
        claim
    }

    fn card() -> PayoutDestination {
        PayoutDestination::Card {
            card_number: "1234567812345678".into(),
        }
    }

    #[tokio::test]
    async fn test_approve_card_claim() {
        let gateway = Arc::new(FakeGateway::default());
        let (controller, storage) = controller(gateway.clone());
        let claim = submitted_claim(&storage, card());

        let payout = controller.approve(&claim.claim_id, "admin").await.unwrap();
        assert_eq!(payout.payment.konsol_id, "pay_1");
        assert_eq!(payout.claim.claim_status(), ClaimStatus::Confirm);
        assert_eq!(payout.claim.process_status(), ProcessStatus::Complete);

        let stored = storage.get_claim(&claim.claim_id).unwrap().unwrap();
        assert_eq!(stored.konsol_payment_id(), Some("pay_1"));
        assert_eq!(stored.contractor_id(), Some("ctr_1"));

        let request = gateway.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(
            request.bank_details,
            BankDetails::Card {
                card_number: "1234567812345678".into()
            }
        );
        assert_eq!(request.purpose, "Prize payout");
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_claim_pending() {
        let gateway = Arc::new(FakeGateway {
            fail_payment: true,
            ..Default::default()
        });
        let (controller, storage) = controller(gateway.clone());
        let claim = submitted_claim(&storage, card());

        let err = controller.approve(&claim.claim_id, "admin").await.unwrap_err();
        assert!(matches!(&err, ClaimError::Gateway(e) if e.status() == Some(422)));

        let stored = storage.get_claim(&claim.claim_id).unwrap().unwrap();
        assert_eq!(stored.claim_status(), ClaimStatus::Pending);
        assert_eq!(stored.process_status(), ProcessStatus::AwaitingReview);
        assert!(storage.get_payment_for_claim(&claim.claim_id).unwrap().is_none());

        // The contractor survives for the next attempt
        assert_eq!(stored.contractor_id(), Some("ctr_1"));
        let _ = controller.approve(&claim.claim_id, "admin").await;
        assert_eq!(gateway.contractors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_phone_claim_needs_bank_member() {
        let gateway = Arc::new(FakeGateway::default());
        let (controller, storage) = controller(gateway.clone());
        let claim = submitted_claim(
            &storage,
            PayoutDestination::Phone {
                phone: "+79001234567".into(),
                bank_name: "Sber".into(),
            },
        );

        let err = controller.approve(&claim.claim_id, "admin").await.unwrap_err();
        assert!(matches!(
            err,
            ClaimError::MissingPrerequisite {
                reason: Prerequisite::BankMemberId,
                ..
            }
        ));
        assert_eq!(storage.get_claim(&claim.claim_id).unwrap().unwrap(), claim);
        assert_eq!(gateway.contractors.load(Ordering::SeqCst), 0);

        controller
            .set_bank_member_id(&claim.claim_id, "100000000011", "admin")
            .await
            .unwrap();
        let payout = controller.approve(&claim.claim_id, "admin").await.unwrap();
        assert_eq!(payout.payment.bank_details.kind(), shared::models::BankDetailsKind::Fps);
    }

    #[tokio::test]
    async fn test_unnamed_claim_is_not_paid() {
        let gateway = Arc::new(FakeGateway::default());
        let (controller, storage) = controller(gateway.clone());
        let claim = named_claim(&storage, None, card());

        let err = controller.approve(&claim.claim_id, "admin").await.unwrap_err();
        assert!(matches!(
            err,
            ClaimError::MissingPrerequisite {
                reason: Prerequisite::PayeeName,
                ..
            }
        ));
        assert_eq!(storage.get_claim(&claim.claim_id).unwrap().unwrap(), claim);
        assert_eq!(gateway.contractors.load(Ordering::SeqCst), 0);
        assert!(storage.get_payment_for_claim(&claim.claim_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reject_is_final() {
        let gateway = Arc::new(FakeGateway::default());
        let (controller, storage) = controller(gateway.clone());
        let claim = submitted_claim(&storage, card());

        let rejected = controller.reject(&claim.claim_id, "admin").await.unwrap();
        assert_eq!(rejected.claim_status(), ClaimStatus::Cancelled);

        assert!(matches!(
            controller.approve(&claim.claim_id, "admin").await,
            Err(ClaimError::AlreadyDecided { .. })
        ));
        assert!(matches!(
            controller.reject(&claim.claim_id, "admin").await,
            Err(ClaimError::AlreadyDecided { .. })
        ));
        assert_eq!(gateway.payments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_draft_claims() {
        let (controller, storage) = controller(Arc::new(FakeGateway::default()));
        assert!(matches!(
            controller.approve("000404", "admin").await,
            Err(ClaimError::NotFound(_))
        ));

        let txn = storage.begin_write().unwrap();
        let draft = storage
            .insert_new_claim_txn(&txn, |id| Claim::new_draft(id, 1, None, "X", Decimal::ONE, 1))
            .unwrap();
        txn.commit().unwrap();
        assert!(matches!(
            controller.reject(&draft.claim_id, "admin").await,
            Err(ClaimError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn test_bank_member_filter() {
        let (controller, _storage) = controller(Arc::new(FakeGateway::default()));
        let all = controller.list_bank_members(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let sber = controller.list_bank_members(Some("SBER")).await.unwrap();
        assert_eq!(sber.len(), 1);
        assert_eq!(sber[0].id, "100000000011");
    }
}
