//! Payment Model
//!
//! One row per payout attempt the gateway accepted, keyed by the gateway's
//! payment id. Rows are never deleted; only status fields move.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status the gateway reports for a payment it gave up on
pub const FAILED_STATUS: &str = "failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankDetailsKind {
    /// Faster payments system transfer to a phone number
    Fps,
    Card,
}

/// Bank details payload sent to the gateway, shape depends on the kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BankDetails {
    Fps {
        fps_mobile_phone: String,
        fps_bank_member_id: String,
    },
    Card {
        card_number: String,
    },
}

impl BankDetails {
    pub fn kind(&self) -> BankDetailsKind {
        match self {
            Self::Fps { .. } => BankDetailsKind::Fps,
            Self::Card { .. } => BankDetailsKind::Card,
        }
    }
}

/// Payment entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Gateway payment id, immutable
    pub konsol_id: String,
    pub claim_id: String,
    pub user_id: i64,
    pub contractor_id: String,
    pub amount: Decimal,
    pub purpose: String,
    pub bank_details_kind: BankDetailsKind,
    pub bank_details: BankDetails,
    /// Opaque gateway status
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
    /// First time the paid status was observed
    pub paid_at: Option<i64>,
}

/// Fields known when the gateway accepts a payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub konsol_id: String,
    pub claim_id: String,
    pub user_id: i64,
    pub contractor_id: String,
    pub amount: Decimal,
    pub purpose: String,
    pub bank_details: BankDetails,
    pub status: String,
}

impl Payment {
    /// Build the row for a freshly created gateway payment
    pub fn new(new: NewPayment, paid_status: &str, now: i64) -> Self {
        let paid_at = (new.status == paid_status).then_some(now);
        Self {
            konsol_id: new.konsol_id,
            claim_id: new.claim_id,
            user_id: new.user_id,
            contractor_id: new.contractor_id,
            amount: new.amount,
            purpose: new.purpose,
            bank_details_kind: new.bank_details.kind(),
            bank_details: new.bank_details,
            status: new.status,
            created_at: now,
            updated_at: now,
            paid_at,
        }
    }

    /// Record an observed gateway status
    ///
    /// Returns `true` if the row changed. Re-applying the current status is a
    /// no-op, and `paid_at` is set only the first time `paid_status` is seen.
    pub fn apply_status(&mut self, status: &str, paid_status: &str, now: i64) -> bool {
        let reaches_paid = status == paid_status && self.paid_at.is_none();
        if self.status == status && !reaches_paid {
            return false;
        }
        self.status = status.to_string();
        if reaches_paid {
            self.paid_at = Some(now);
        }
        self.updated_at = now;
        true
    }

    pub fn is_failed(&self) -> bool {
        self.status == FAILED_STATUS
    }

    pub fn is_terminal(&self, terminal_statuses: &[String]) -> bool {
        terminal_statuses.iter().any(|s| s == &self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(status: &str) -> Payment {
        Payment::new(
            NewPayment {
                konsol_id: "pay_1".into(),
                claim_id: "000001".into(),
                user_id: 42,
                contractor_id: "ctr_1".into(),
                amount: Decimal::new(10000, 2),
                purpose: "Prize payout".into(),
                bank_details: BankDetails::Fps {
                    fps_mobile_phone: "+79001234567".into(),
                    fps_bank_member_id: "100000000011".into(),
                },
                status: status.into(),
            },
            "executed",
            100,
        )
    }

    #[test]
    fn test_new_derives_kind() {
        let p = payment("created");
        assert_eq!(p.bank_details_kind, BankDetailsKind::Fps);
        assert_eq!(p.paid_at, None);
        assert_eq!(payment("executed").paid_at, Some(100));
    }

    #[test]
    fn test_apply_status_idempotent() {
        let mut p = payment("created");
        assert!(!p.apply_status("created", "executed", 200));
        assert_eq!(p.updated_at, 100);

        assert!(p.apply_status("processing", "executed", 200));
        assert_eq!(p.paid_at, None);

        assert!(p.apply_status("executed", "executed", 300));
        assert_eq!(p.paid_at, Some(300));

        assert!(!p.apply_status("executed", "executed", 400));
        assert_eq!(p.paid_at, Some(300));
        assert_eq!(p.updated_at, 300);
    }

    #[test]
    fn test_paid_at_kept_after_later_status() {
        let mut p = payment("created");
        p.apply_status("executed", "executed", 300);
        p.apply_status("refunded", "executed", 400);
        p.apply_status("executed", "executed", 500);
        assert_eq!(p.paid_at, Some(300));
        assert_eq!(p.status, "executed");
    }

    #[test]
    fn test_terminal() {
        let terminal = vec!["executed".to_string(), "failed".to_string()];
        assert!(!payment("created").is_terminal(&terminal));
        assert!(payment("failed").is_terminal(&terminal));
        assert!(payment("failed").is_failed());
    }

    #[test]
    fn test_bank_details_untagged_shape() {
        let card = BankDetails::Card {
            card_number: "1234567812345678".into(),
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json, serde_json::json!({"card_number": "1234567812345678"}));
        let back: BankDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), BankDetailsKind::Card);
    }
}
