//! Claim Model
//!
//! A claim is created when a code is redeemed and moves through
//! `draft -> awaiting_review -> complete | cancelled`. Payout fields and the
//! decision fields are private: every change goes through a method that
//! checks the lifecycle stage, so an illegal combination never reaches storage.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the claimant wants to be paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Unknown,
    /// Instant transfer to a phone number (FPS)
    Phone,
    Card,
}

/// Where the claim is in its processing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Draft,
    AwaitingReview,
    Complete,
    Cancelled,
}

/// Administrator decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Confirm,
    Cancelled,
}

/// A complete payout destination, one of the two supported shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PayoutDestination {
    Phone { phone: String, bank_name: String },
    Card { card_number: String },
}

impl PayoutDestination {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Phone { .. } => PaymentMethod::Phone,
            Self::Card { .. } => PaymentMethod::Card,
        }
    }
}

/// Rejected claim mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimInvariantError {
    #[error("claim is {0:?}, expected draft")]
    NotDraft(ProcessStatus),

    #[error("claim is {0:?}, expected awaiting_review")]
    NotAwaitingReview(ProcessStatus),

    #[error("claim already decided as {0:?}")]
    AlreadyDecided(ClaimStatus),

    #[error("claim is not a phone payout")]
    NotPhonePayout,

    #[error("payment id must not be empty")]
    EmptyPaymentId,

    #[error("phone and card number are both set")]
    PhoneAndCard,

    #[error("claim is {0:?} without a payout destination")]
    MissingDestination(ProcessStatus),

    #[error("confirmed claim has no payment id")]
    ConfirmedWithoutPayment,

    #[error("claim status {0:?} does not match process status {1:?}")]
    StatusMismatch(ClaimStatus, ProcessStatus),
}

/// Claim entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Zero-padded sequence number, e.g. "000001"
    pub claim_id: String,
    pub user_id: i64,
    /// Payee name used for contractor registration
    pub display_name: Option<String>,
    pub code: String,
    pub amount: Decimal,
    payment_method: PaymentMethod,
    phone: Option<String>,
    bank_name: Option<String>,
    card_number: Option<String>,
    /// Gateway bank reference, set by an administrator
    bank_member_id: Option<String>,
    pub review_text: Option<String>,
    pub attachment_ids: Vec<String>,
    contractor_id: Option<String>,
    konsol_payment_id: Option<String>,
    process_status: ProcessStatus,
    claim_status: ClaimStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Claim {
    /// Fresh `(draft, pending)` claim right after a code redemption
    pub fn new_draft(
        claim_id: impl Into<String>,
        user_id: i64,
        display_name: Option<String>,
        code: impl Into<String>,
        amount: Decimal,
        now: i64,
    ) -> Self {
        Self {
            claim_id: claim_id.into(),
            user_id,
            display_name,
            code: code.into(),
            amount,
            payment_method: PaymentMethod::Unknown,
            phone: None,
            bank_name: None,
            card_number: None,
            bank_member_id: None,
            review_text: None,
            attachment_ids: Vec::new(),
            contractor_id: None,
            konsol_payment_id: None,
            process_status: ProcessStatus::Draft,
            claim_status: ClaimStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    // ========== Accessors ==========

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn bank_name(&self) -> Option<&str> {
        self.bank_name.as_deref()
    }

    pub fn card_number(&self) -> Option<&str> {
        self.card_number.as_deref()
    }

    pub fn bank_member_id(&self) -> Option<&str> {
        self.bank_member_id.as_deref()
    }

    pub fn contractor_id(&self) -> Option<&str> {
        self.contractor_id.as_deref()
    }

    pub fn konsol_payment_id(&self) -> Option<&str> {
        self.konsol_payment_id.as_deref()
    }

    pub fn process_status(&self) -> ProcessStatus {
        self.process_status
    }

    pub fn claim_status(&self) -> ClaimStatus {
        self.claim_status
    }

    /// True once an administrator approved or rejected the claim
    pub fn is_decided(&self) -> bool {
        self.claim_status != ClaimStatus::Pending
    }

    /// The stored destination, if the payout fields form a complete one
    pub fn payout_destination(&self) -> Option<PayoutDestination> {
        match self.payment_method {
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

    // ========== Conversation-side mutations (draft only) ==========

    /// Append a proof attachment and/or review text
    ///
    /// Text from several replies is joined with a newline.
    pub fn add_proof(
        &mut self,
        attachment_id: Option<String>,
        text: Option<String>,
        now: i64,
    ) -> Result<(), ClaimInvariantError> {
        self.require_draft()?;
        if let Some(id) = attachment_id {
            self.attachment_ids.push(id);
        }
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            self.review_text = Some(match self.review_text.take() {
                Some(existing) => format!("{existing}\n{text}"),
                None => text,
            });
        }
        self.touch(now);
        Ok(())
    }

    /// Write the payout destination and hand the claim to administrators
    ///
    /// This is the only way payout fields get populated; the fields of the
    /// other method are cleared.
    pub fn submit_for_review(
        &mut self,
        destination: PayoutDestination,
        now: i64,
    ) -> Result<(), ClaimInvariantError> {
        self.require_draft()?;
        self.payment_method = destination.method();
        match destination {
            PayoutDestination::Phone { phone, bank_name } => {
                self.phone = Some(phone);
                self.bank_name = Some(bank_name);
                self.card_number = None;
            }
            PayoutDestination::Card { card_number } => {
                self.card_number = Some(card_number);
                self.phone = None;
                self.bank_name = None;
                self.bank_member_id = None;
            }
        }
        self.process_status = ProcessStatus::AwaitingReview;
        self.touch(now);
        Ok(())
    }

    // ========== Controller-side mutations ==========

    /// Check the claim is waiting for an administrator decision
    pub fn ensure_reviewable(&self) -> Result<(), ClaimInvariantError> {
        if self.is_decided() {
            return Err(ClaimInvariantError::AlreadyDecided(self.claim_status));
        }
        if self.process_status != ProcessStatus::AwaitingReview {
            return Err(ClaimInvariantError::NotAwaitingReview(self.process_status));
        }
        Ok(())
    }

    pub fn set_bank_member_id(
        &mut self,
        bank_member_id: impl Into<String>,
        now: i64,
    ) -> Result<(), ClaimInvariantError> {
        self.ensure_reviewable()?;
        if self.payment_method != PaymentMethod::Phone {
            return Err(ClaimInvariantError::NotPhonePayout);
        }
        self.bank_member_id = Some(bank_member_id.into());
        self.touch(now);
        Ok(())
    }

    /// Cache the gateway contractor so a retried approve skips registration
    pub fn set_contractor_id(
        &mut self,
        contractor_id: impl Into<String>,
        now: i64,
    ) -> Result<(), ClaimInvariantError> {
        self.ensure_reviewable()?;
        self.contractor_id = Some(contractor_id.into());
        self.touch(now);
        Ok(())
    }

    /// `(awaiting_review, pending)` -> `(complete, confirm)`
    pub fn confirm(
        &mut self,
        konsol_payment_id: impl Into<String>,
        now: i64,
    ) -> Result<(), ClaimInvariantError> {
        self.ensure_reviewable()?;
        let id = konsol_payment_id.into();
        if id.is_empty() {
            return Err(ClaimInvariantError::EmptyPaymentId);
        }
        self.konsol_payment_id = Some(id);
        self.claim_status = ClaimStatus::Confirm;
        self.process_status = ProcessStatus::Complete;
        self.touch(now);
        Ok(())
    }

    /// `(awaiting_review, pending)` -> `(cancelled, cancelled)`
    pub fn cancel(&mut self, now: i64) -> Result<(), ClaimInvariantError> {
        self.ensure_reviewable()?;
        self.claim_status = ClaimStatus::Cancelled;
        self.process_status = ProcessStatus::Cancelled;
        self.touch(now);
        Ok(())
    }

    /// Check the cross-field invariants
    ///
    /// Storage calls this before every write.
    pub fn validate(&self) -> Result<(), ClaimInvariantError> {
        if self.phone.is_some() && self.card_number.is_some() {
            return Err(ClaimInvariantError::PhoneAndCard);
        }
        if self.process_status != ProcessStatus::Draft && self.payout_destination().is_none() {
            return Err(ClaimInvariantError::MissingDestination(self.process_status));
        }
        match (self.claim_status, self.process_status) {
            (ClaimStatus::Pending, ProcessStatus::Draft | ProcessStatus::AwaitingReview)
            | (ClaimStatus::Confirm, ProcessStatus::Complete)
            | (ClaimStatus::Cancelled, ProcessStatus::Cancelled) => {}
            (claim, process) => return Err(ClaimInvariantError::StatusMismatch(claim, process)),
        }
        if self.claim_status == ClaimStatus::Confirm && self.konsol_payment_id.is_none() {
            return Err(ClaimInvariantError::ConfirmedWithoutPayment);
        }
        Ok(())
    }

    fn require_draft(&self) -> Result<(), ClaimInvariantError> {
        if self.process_status != ProcessStatus::Draft {
            return Err(ClaimInvariantError::NotDraft(self.process_status));
        }
        Ok(())
    }

    fn touch(&mut self, now: i64) {
        self.updated_at = now;
    }
}
