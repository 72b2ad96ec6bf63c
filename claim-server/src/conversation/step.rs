//! Conversation steps and the per-user draft

use serde::{Deserialize, Serialize};
use shared::models::{PaymentMethod, PayoutDestination};

/// Where a user is in the claim conversation
///
/// Steps only move forward; going back means abandoning the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStep {
    AwaitingCode,
    AwaitingReviewProof,
    AwaitingPaymentChoice,
    AwaitingPhone,
    AwaitingBank,
    AwaitingCard,
}

/// Conversation state of one user, persisted between replies
///
/// Never shown to administrators or sent to the gateway; the claim only
/// receives the payout destination when the draft is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub user_id: i64,
    pub step: ConversationStep,
    /// Set once a code was redeemed
    pub claim_id: Option<String>,
    pub method: PaymentMethod,
    pub phone: Option<String>,
    pub bank_name: Option<String>,
    pub card_number: Option<String>,
    pub updated_at: i64,
}

impl Draft {
    pub fn new(user_id: i64, now: i64) -> Self {
        Self {
            user_id,
            step: ConversationStep::AwaitingCode,
            claim_id: None,
            method: PaymentMethod::Unknown,
            phone: None,
            bank_name: None,
            card_number: None,
            updated_at: now,
        }
    }

    /// Move to `step`, stamping the draft
    pub fn advance(&mut self, step: ConversationStep, now: i64) {
        self.step = step;
        self.updated_at = now;
    }

    /// The destination collected so far, if complete for the chosen method
    pub fn destination(&self) -> Option<PayoutDestination> {
        match self.method {
            PaymentMethod::Phone => Some(PayoutDestination::Phone {
                phone: self.phone.clone()?,
                bank_name: self.bank_name.clone()?,
            }),
            PaymentMethod::Card => Some(PayoutDestination::Card {
                card_number: self.card_number.clone()?,
            }),
            PaymentMethod::Unknown => None,
        }
    }
}
