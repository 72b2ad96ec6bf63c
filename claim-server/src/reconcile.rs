//! Payment reconciliation
//!
//! Brings stored payment statuses in line with the gateway. The periodic
//! worker, the webhook and the admin refresh all go through
//! [`Reconciler::apply_status`], so they agree on when `paid_at` is set.
//! Claims are never touched here.

use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::Payment;
use shared::util::now_millis;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::gateway::{GatewayError, PayoutGateway};
use crate::storage::{ClaimStorage, StatusUpdate, StorageError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Storage(e) => e.into(),
            ReconcileError::Gateway(e) => {
                AppError::gateway(ErrorCode::GatewayUnavailable, e.status(), e.body())
            }
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Stored payment, refreshed from the gateway when it answered
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSnapshot {
    pub payment: Payment,
    /// false when the gateway was unavailable and the stored row is returned
    pub refreshed: bool,
}

#[derive(Clone)]
pub struct Reconciler {
    storage: ClaimStorage,
    gateway: Arc<dyn PayoutGateway>,
    paid_status: Arc<str>,
    terminal_statuses: Arc<[String]>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("paid_status", &self.paid_status)
            .field("terminal_statuses", &self.terminal_statuses)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        storage: ClaimStorage,
        gateway: Arc<dyn PayoutGateway>,
        paid_status: impl Into<String>,
        terminal_statuses: Vec<String>,
    ) -> Self {
        Self {
            storage,
            gateway,
            paid_status: Arc::from(paid_status.into()),
            terminal_statuses: Arc::from(terminal_statuses),
        }
    }

    /// Record an observed status for a stored payment
    pub fn apply_status(&self, konsol_id: &str, status: &str) -> Result<StatusUpdate, StorageError> {
        let update =
            self.storage
                .apply_payment_status(konsol_id, status, &self.paid_status, now_millis())?;
        if update.changed {
            tracing::info!(
                konsol_id,
                claim_id = %update.payment.claim_id,
                status,
                paid = update.payment.paid_at.is_some(),
                "Payment status updated"
            );
        }
        Ok(update)
    }

    /// Apply a webhook notification; unknown payments give `None`
    pub fn apply_webhook(&self, konsol_id: &str, status: &str) -> Result<Option<StatusUpdate>, StorageError> {
        match self.apply_status(konsol_id, status) {
            Ok(update) => Ok(Some(update)),
            Err(StorageError::PaymentNotFound(_)) => {
                tracing::warn!(konsol_id, status, "Webhook for unknown payment");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch one payment from the gateway and apply its status
    pub async fn refresh(&self, konsol_id: &str) -> Result<StatusUpdate, ReconcileError> {
        let remote = self.gateway.get_payment(konsol_id).await?;
        Ok(self.apply_status(konsol_id, &remote.status)?)
    }

    /// Stored payment after a refresh attempt
    ///
    /// Falls back to the stored row when the gateway cannot be reached.
    pub async fn snapshot(&self, konsol_id: &str) -> Result<PaymentSnapshot, ReconcileError> {
        let stored = self
            .storage
            .get_payment(konsol_id)?
            .ok_or_else(|| StorageError::PaymentNotFound(konsol_id.to_string()))?;

        match self.refresh(konsol_id).await {
            Ok(update) => Ok(PaymentSnapshot {
                payment: update.payment,
                refreshed: true,
            }),
            Err(ReconcileError::Gateway(e)) => {
                tracing::warn!(konsol_id, error = %e, "Gateway unavailable, returning stored payment");
                Ok(PaymentSnapshot {
                    payment: stored,
                    refreshed: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh every payment that has not reached a terminal status
    ///
    /// A failure on one payment is logged and the sweep moves on.
    pub async fn reconcile_once(&self) -> Result<SweepSummary, StorageError> {
        let open = self.storage.list_open_payments(&self.terminal_statuses)?;
        let mut summary = SweepSummary {
            checked: open.len(),
            ..Default::default()
        };

        for payment in open {
            match self.refresh(&payment.konsol_id).await {
                Ok(update) if update.changed => summary.updated += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        konsol_id = %payment.konsol_id,
                        claim_id = %payment.claim_id,
                        error = %e,
                        "Payment refresh failed"
                    );
                }
            }
        }

        Ok(summary)
    }
}

/// Periodic reconciliation loop
pub struct ReconcileWorker {
    reconciler: Reconciler,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ReconcileWorker {
    pub fn new(reconciler: Reconciler, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            reconciler,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Reconcile worker started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.reconciler.reconcile_once().await {
                        Ok(summary) if summary.checked > 0 => {
                            tracing::info!(
                                checked = summary.checked,
                                updated = summary.updated,
                                failed = summary.failed,
                                "Reconciliation sweep finished"
                            );
                        }
                        Ok(_) => tracing::debug!("No open payments"),
                        Err(e) => tracing::error!(error = %e, "Reconciliation sweep failed"),
                    }
                }
            }
        }

        tracing::info!("Reconcile worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BankMember, ContractorProfile, CreatePaymentRequest, GatewayPayment};
    use async_trait::async_trait;
    use dashmap::DashMap;
    use rust_decimal::Decimal;
    use shared::models::{BankDetails, Claim, NewPayment, PayoutDestination};

    /// Gateway whose payment statuses are set by the test
    #[derive(Default)]
    struct StatusBoard {
        statuses: DashMap<String, String>,
    }

    #[async_trait]
    impl PayoutGateway for StatusBoard {
        async fn register_contractor(&self, _: &ContractorProfile) -> Result<String, GatewayError> {
            unreachable!()
        }

        async fn create_payment(&self, _: &CreatePaymentRequest) -> Result<GatewayPayment, GatewayError> {
            unreachable!()
        }

        async fn get_payment(&self, konsol_id: &str) -> Result<GatewayPayment, GatewayError> {
            match self.statuses.get(konsol_id) {
                Some(status) => Ok(GatewayPayment {
                    id: konsol_id.to_string(),
                    status: status.clone(),
                    extra: Default::default(),
                }),
                None => Err(GatewayError::Status {
                    status: 404,
                    body: "not found".into(),
                }),
            }
        }

        async fn list_bank_members(&self) -> Result<Vec<BankMember>, GatewayError> {
            Ok(Vec::new())
        }
    }

    fn seed_payment(storage: &ClaimStorage, konsol_id: &str) -> Claim {
        let txn = storage.begin_write().unwrap();
        let mut claim = storage
            .insert_new_claim_txn(&txn, |id| Claim::new_draft(id, 5, None, "C", Decimal::ONE, 1))
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
        claim.confirm(konsol_id, 3).unwrap();
        let payment = Payment::new(
            NewPayment {
                konsol_id: konsol_id.into(),
                claim_id: claim.claim_id.clone(),
                user_id: 5,
                contractor_id: "ctr_1".into(),
                amount: Decimal::ONE,
                purpose: "Prize payout".into(),
                bank_details: BankDetails::Card {
                    card_number: "1234567812345678".into(),
                },
                status: "created".into(),
            },
            "executed",
            3,
        );
        storage.commit_payout(&claim, &payment).unwrap();
        claim
    }

    fn reconciler(storage: &ClaimStorage, board: Arc<StatusBoard>) -> Reconciler {
        Reconciler::new(
            storage.clone(),
            board,
            "executed",
            vec!["executed".into(), "failed".into()],
        )
    }

    #[tokio::test]
    async fn test_sweep_sets_paid_at_once() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let claim = seed_payment(&storage, "pay_1");
        let board = Arc::new(StatusBoard::default());
        board.statuses.insert("pay_1".into(), "executed".into());
        let reconciler = reconciler(&storage, board);

        let summary = reconciler.reconcile_once().await.unwrap();
        assert_eq!(
            summary,
            SweepSummary {
                checked: 1,
                updated: 1,
                failed: 0
            }
        );
        let paid = storage.get_payment("pay_1").unwrap().unwrap();
        assert_eq!(paid.status, "executed");
        let paid_at = paid.paid_at.unwrap();

        // Terminal now: the next sweep skips it; a webhook replay changes nothing
        assert_eq!(reconciler.reconcile_once().await.unwrap().checked, 0);
        let replay = reconciler.apply_webhook("pay_1", "executed").unwrap().unwrap();
        assert!(!replay.changed);
        assert_eq!(replay.payment.paid_at, Some(paid_at));

        assert_eq!(storage.get_claim(&claim.claim_id).unwrap().unwrap(), claim);
    }

    #[tokio::test]
    async fn test_sweep_continues_after_failure() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        seed_payment(&storage, "pay_1");
        seed_payment(&storage, "pay_2");
        let board = Arc::new(StatusBoard::default());
        board.statuses.insert("pay_2".into(), "processing".into());
        let reconciler = reconciler(&storage, board);

        let summary = reconciler.reconcile_once().await.unwrap();
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(storage.get_payment("pay_2").unwrap().unwrap().status, "processing");
    }

    #[tokio::test]
    async fn test_snapshot_falls_back_to_stored_row() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        seed_payment(&storage, "pay_1");
        let reconciler = reconciler(&storage, Arc::new(StatusBoard::default()));

        let snapshot = reconciler.snapshot("pay_1").await.unwrap();
        assert!(!snapshot.refreshed);
        assert_eq!(snapshot.payment.status, "created");

        assert!(matches!(
            reconciler.snapshot("pay_404").await,
            Err(ReconcileError::Storage(StorageError::PaymentNotFound(_)))
        ));
    }

    #[test]
    fn test_unknown_webhook_is_acknowledged() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let reconciler = reconciler(&storage, Arc::new(StatusBoard::default()));
        assert!(reconciler.apply_webhook("pay_x", "executed").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_worker_stops_on_cancel() {
        let storage = ClaimStorage::open_in_memory().unwrap();
        let token = CancellationToken::new();
        let worker = ReconcileWorker::new(
            reconciler(&storage, Arc::new(StatusBoard::default())),
            Duration::from_millis(10),
            token.clone(),
        );
        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
