//! Claim conversation
//!
//! Per-user state machine that turns a redeemed code into a claim waiting
//! for review:
//!
//! ```text
//! awaiting_code -> awaiting_review_proof -> awaiting_payment_choice
//!     -> awaiting_phone -> awaiting_bank -> finalize
//!     -> awaiting_card                   -> finalize
//! ```
//!
//! Every reply for a user runs under that user's lock. Replies that touch
//! the claim also take the claim lock (user before claim). Invalid input is
//! answered with a prompt and leaves stored data untouched.

mod prompt;
mod step;

pub use prompt::{BufferedChannel, ConversationChannel, Prompt};
pub use step::{ConversationStep, Draft};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Claim, ClaimInvariantError, PaymentMethod};
use shared::util::now_millis;
use std::sync::Arc;
use thiserror::Error;

use crate::locks::ClaimLocks;
use crate::notify::{ClaimNotifier, EngagementVerifier};
use crate::storage::{ClaimStorage, StorageError};
use crate::utils::validation::{
    normalize_bank_name, normalize_card, normalize_code, normalize_display_name, normalize_phone,
    normalize_review_text,
};
use crate::vault::CodeVault;

/// A reply typed (or tapped) by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserReply {
    /// `/start`: drop any draft and ask for a code
    Start,
    /// Code together with the name the payout is registered under
    Code {
        code: String,
        #[serde(default)]
        display_name: Option<String>,
    },
    Proof {
        #[serde(default)]
        attachment_id: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
    PaymentMethod {
        method: PaymentMethod,
    },
    Phone {
        phone: String,
    },
    Bank {
        bank_name: String,
    },
    Card {
        card_number: String,
    },
    Abandon,
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("claim {0} was already submitted")]
    AlreadySubmitted(String),
}

impl From<ConversationError> for AppError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::Storage(e) => e.into(),
            ConversationError::AlreadySubmitted(claim_id) => AppError::with_message(
                ErrorCode::ConversationStepMismatch,
                format!("Claim {claim_id} was already submitted"),
            )
            .with_detail("claim_id", claim_id),
        }
    }
}

pub type ConversationResult<T> = Result<T, ConversationError>;

/// Drives the claim conversation for every user
#[derive(Clone)]
pub struct ConversationService {
    storage: ClaimStorage,
    vault: Arc<dyn CodeVault>,
    engagement: Arc<dyn EngagementVerifier>,
    channel: Arc<dyn ConversationChannel>,
    notifier: Arc<dyn ClaimNotifier>,
    locks: Arc<ClaimLocks>,
    claim_amount: Decimal,
}

impl std::fmt::Debug for ConversationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationService")
            .field("claim_amount", &self.claim_amount)
            .finish_non_exhaustive()
    }
}

impl ConversationService {
    pub fn new(
        storage: ClaimStorage,
        vault: Arc<dyn CodeVault>,
        engagement: Arc<dyn EngagementVerifier>,
        channel: Arc<dyn ConversationChannel>,
        notifier: Arc<dyn ClaimNotifier>,
        locks: Arc<ClaimLocks>,
        claim_amount: Decimal,
    ) -> Self {
        Self {
            storage,
            vault,
            engagement,
            channel,
            notifier,
            locks,
            claim_amount,
        }
    }

    /// Apply one reply and return the step the user is in afterwards
    pub async fn handle(&self, user_id: i64, reply: UserReply) -> ConversationResult<ConversationStep> {
        match reply {
            UserReply::Start => self.start(user_id).await,
            UserReply::Code { code, display_name } => {
                self.submit_code(user_id, &code, display_name).await
            }
            UserReply::Proof {
                attachment_id,
                text,
            } => self.submit_proof(user_id, attachment_id, text).await,
            UserReply::PaymentMethod { method } => self.choose_payment_method(user_id, method).await,
            UserReply::Phone { phone } => self.submit_phone(user_id, &phone).await,
            UserReply::Bank { bank_name } => self.submit_bank(user_id, &bank_name).await,
            UserReply::Card { card_number } => self.submit_card(user_id, &card_number).await,
            UserReply::Abandon => self.abandon(user_id).await,
        }
    }

    /// Current step; users without a draft are waiting for a code
    pub fn step(&self, user_id: i64) -> ConversationResult<ConversationStep> {
        Ok(self
            .storage
            .get_draft(user_id)?
            .map(|d| d.step)
            .unwrap_or(ConversationStep::AwaitingCode))
    }

    /// Restart: discard any draft and ask for a code
    pub async fn start(&self, user_id: i64) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        self.discard_draft(user_id)?;
        self.channel.send(user_id, Prompt::AskCode).await;
        Ok(ConversationStep::AwaitingCode)
    }

    /// Redeem a code and open a draft claim for it
    ///
    /// The claimant's name is required alongside the code. Without one the
    /// code is left unredeemed and the user is asked to send both again.
    pub async fn submit_code(
        &self,
        user_id: i64,
        raw_code: &str,
        display_name: Option<String>,
    ) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        let now = now_millis();
        let mut draft = self.load_draft(user_id, now)?;
        if draft.step != ConversationStep::AwaitingCode {
            return Ok(self.wrong_step(&draft).await);
        }

        let Some(code) = normalize_code(raw_code) else {
            self.channel.send(user_id, Prompt::InvalidCode).await;
            return Ok(draft.step);
        };
        let Some(display_name) = normalize_display_name(display_name.as_deref()) else {
            self.channel.send(user_id, Prompt::AskName).await;
            return Ok(draft.step);
        };

        if !self.vault.redeem(&code).await? {
            tracing::info!(user_id, code = %code, "Code rejected");
            self.channel.send(user_id, Prompt::InvalidCode).await;
            return Ok(draft.step);
        }

        // The code is spent from here on; a failed insert cannot give it back
        let claim = match self.open_claim(&mut draft, &code, display_name, now) {
            Ok(claim) => claim,
            Err(e) => {
                tracing::error!(user_id, code = %code, error = %e, "Code redeemed but claim was not stored");
                return Err(e.into());
            }
        };

        tracing::info!(user_id, claim_id = %claim.claim_id, "Claim draft created");
        self.channel
            .send(
                user_id,
                Prompt::AskProof {
                    claim_id: claim.claim_id.clone(),
                },
            )
            .await;
        Ok(draft.step)
    }

    fn open_claim(
        &self,
        draft: &mut Draft,
        code: &str,
        display_name: String,
        now: i64,
    ) -> Result<Claim, StorageError> {
        let txn = self.storage.begin_write()?;
        let claim = self.storage.insert_new_claim_txn(&txn, |claim_id| {
            Claim::new_draft(claim_id, draft.user_id, Some(display_name), code, self.claim_amount, now)
        })?;
        draft.claim_id = Some(claim.claim_id.clone());
        draft.advance(ConversationStep::AwaitingReviewProof, now);
        self.storage.put_draft_txn(&txn, draft)?;
        txn.commit()?;
        Ok(claim)
    }

    /// Attach a screenshot and/or review text to the draft claim
    ///
    /// Requires the engagement check to pass. The first attachment moves the
    /// draft to the payment choice; more attachments are accepted there too.
    pub async fn submit_proof(
        &self,
        user_id: i64,
        attachment_id: Option<String>,
        text: Option<String>,
    ) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        let now = now_millis();
        let mut draft = self.load_draft(user_id, now)?;
        if !matches!(
            draft.step,
            ConversationStep::AwaitingReviewProof | ConversationStep::AwaitingPaymentChoice
        ) {
            return Ok(self.wrong_step(&draft).await);
        }
        let Some(claim_id) = draft.claim_id.clone() else {
            return Ok(self.reset_orphan_draft(&draft).await?);
        };

        if !self.engagement.is_subscribed(user_id).await {
            self.channel.send(user_id, Prompt::NotSubscribed).await;
            return Ok(draft.step);
        }

        let attachment_id = attachment_id
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        let text = normalize_review_text(text);
        if attachment_id.is_none() && text.is_none() {
            self.channel
                .send(user_id, Prompt::AskProof { claim_id })
                .await;
            return Ok(draft.step);
        }

        let _claim_guard = self.locks.claims.lock(&claim_id).await;
        let has_attachment = attachment_id.is_some();
        let txn = self.storage.begin_write()?;
        let mut claim = self.storage.require_claim_txn(&txn, &claim_id)?;
        claim
            .add_proof(attachment_id, text, now)
            .map_err(|e| already_submitted(e, &claim_id))?;
        self.storage.update_claim_txn(&txn, &claim)?;

        let advanced = has_attachment && draft.step == ConversationStep::AwaitingReviewProof;
        if advanced {
            draft.advance(ConversationStep::AwaitingPaymentChoice, now);
            self.storage.put_draft_txn(&txn, &draft)?;
        }
        txn.commit().map_err(StorageError::from)?;

        self.channel
            .send(
                user_id,
                Prompt::ProofReceived {
                    attachments: claim.attachment_ids.len(),
                },
            )
            .await;
        if advanced {
            self.channel.send(user_id, Prompt::AskPaymentMethod).await;
        } else if claim.attachment_ids.is_empty() {
            self.channel.send(user_id, Prompt::AskProof { claim_id }).await;
        }
        Ok(draft.step)
    }

    pub async fn choose_payment_method(
        &self,
        user_id: i64,
        method: PaymentMethod,
    ) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        let now = now_millis();
        let mut draft = self.load_draft(user_id, now)?;
        if draft.step != ConversationStep::AwaitingPaymentChoice {
            return Ok(self.wrong_step(&draft).await);
        }

        let (next, prompt) = match method {
            PaymentMethod::Phone => (ConversationStep::AwaitingPhone, Prompt::AskPhone),
            PaymentMethod::Card => (ConversationStep::AwaitingCard, Prompt::AskCard),
            PaymentMethod::Unknown => {
                self.channel.send(user_id, Prompt::AskPaymentMethod).await;
                return Ok(draft.step);
            }
        };

        draft.method = method;
        draft.advance(next, now);
        self.storage.put_draft(&draft)?;
        self.channel.send(user_id, prompt).await;
        Ok(draft.step)
    }

    pub async fn submit_phone(&self, user_id: i64, raw: &str) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        let now = now_millis();
        let mut draft = self.load_draft(user_id, now)?;
        if draft.step != ConversationStep::AwaitingPhone {
            return Ok(self.wrong_step(&draft).await);
        }

        let Some(phone) = normalize_phone(raw) else {
            self.channel.send(user_id, Prompt::InvalidPhone).await;
            return Ok(draft.step);
        };

        draft.phone = Some(phone);
        draft.advance(ConversationStep::AwaitingBank, now);
        self.storage.put_draft(&draft)?;
        self.channel.send(user_id, Prompt::AskBank).await;
        Ok(draft.step)
    }

    /// Store the bank name and finalize a phone payout
    pub async fn submit_bank(&self, user_id: i64, raw: &str) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        let now = now_millis();
        let mut draft = self.load_draft(user_id, now)?;
        if draft.step != ConversationStep::AwaitingBank {
            return Ok(self.wrong_step(&draft).await);
        }

        let Some(bank_name) = normalize_bank_name(raw) else {
            self.channel.send(user_id, Prompt::InvalidBank).await;
            return Ok(draft.step);
        };

        draft.bank_name = Some(bank_name);
        self.finalize_draft(draft, now).await
    }

    /// Store the card number and finalize a card payout
    pub async fn submit_card(&self, user_id: i64, raw: &str) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        let now = now_millis();
        let mut draft = self.load_draft(user_id, now)?;
        if draft.step != ConversationStep::AwaitingCard {
            return Ok(self.wrong_step(&draft).await);
        }

        let Some(card_number) = normalize_card(raw) else {
            self.channel.send(user_id, Prompt::InvalidCard).await;
            return Ok(draft.step);
        };

        draft.card_number = Some(card_number);
        self.finalize_draft(draft, now).await
    }

    /// Hand a draft with a complete destination to administrators
    pub async fn finalize(&self, user_id: i64) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        let now = now_millis();
        let draft = self.load_draft(user_id, now)?;
        if draft.destination().is_none() {
            return Ok(self.wrong_step(&draft).await);
        }
        self.finalize_draft(draft, now).await
    }

    /// Single commit point: destination onto the claim, claim to
    /// `awaiting_review`, draft removed. Caller holds the user lock.
    async fn finalize_draft(&self, draft: Draft, now: i64) -> ConversationResult<ConversationStep> {
        let Some(destination) = draft.destination() else {
            return Ok(self.wrong_step(&draft).await);
        };
        let Some(claim_id) = draft.claim_id.clone() else {
            return self.reset_orphan_draft(&draft).await;
        };

        let claim = {
            let _claim_guard = self.locks.claims.lock(&claim_id).await;
            let txn = self.storage.begin_write()?;
            let mut claim = self.storage.require_claim_txn(&txn, &claim_id)?;
            claim
                .submit_for_review(destination, now)
                .map_err(|e| already_submitted(e, &claim_id))?;
            self.storage.update_claim_txn(&txn, &claim)?;
            self.storage.remove_draft_txn(&txn, draft.user_id)?;
            txn.commit().map_err(StorageError::from)?;
            claim
        };

        tracing::info!(
            user_id = draft.user_id,
            claim_id = %claim_id,
            method = ?claim.payment_method(),
            "Claim submitted for review"
        );
        self.notifier.claim_submitted(&claim).await;
        self.channel
            .send(draft.user_id, Prompt::ClaimSubmitted { claim_id })
            .await;
        Ok(ConversationStep::AwaitingCode)
    }

    /// Drop the draft; its claim stays in `draft`
    pub async fn abandon(&self, user_id: i64) -> ConversationResult<ConversationStep> {
        let _guard = self.locks.users.lock(&user_id).await;
        self.discard_draft(user_id)?;
        self.channel.send(user_id, Prompt::Abandoned).await;
        Ok(ConversationStep::AwaitingCode)
    }

    // ========== Helpers ==========

    fn load_draft(&self, user_id: i64, now: i64) -> Result<Draft, StorageError> {
        Ok(self
            .storage
            .get_draft(user_id)?
            .unwrap_or_else(|| Draft::new(user_id, now)))
    }

    fn discard_draft(&self, user_id: i64) -> Result<(), StorageError> {
        if let Some(draft) = self.storage.get_draft(user_id)? {
            self.storage.remove_draft(user_id)?;
            if let Some(claim_id) = draft.claim_id {
                tracing::info!(user_id, claim_id = %claim_id, step = ?draft.step, "Draft abandoned");
            }
        }
        Ok(())
    }

    async fn wrong_step(&self, draft: &Draft) -> ConversationStep {
        tracing::debug!(user_id = draft.user_id, step = ?draft.step, "Reply does not match step");
        self.channel
            .send(draft.user_id, Prompt::WrongStep { expected: draft.step })
            .await;
        draft.step
    }

    /// A draft past the code step without a claim cannot continue
    async fn reset_orphan_draft(&self, draft: &Draft) -> ConversationResult<ConversationStep> {
        tracing::warn!(user_id = draft.user_id, step = ?draft.step, "Draft has no claim, resetting");
        self.storage.remove_draft(draft.user_id)?;
        self.channel.send(draft.user_id, Prompt::AskCode).await;
        Ok(ConversationStep::AwaitingCode)
    }
}

fn already_submitted(err: ClaimInvariantError, claim_id: &str) -> ConversationError {
    match err {
        ClaimInvariantError::NotDraft(_) => ConversationError::AlreadySubmitted(claim_id.to_string()),
        other => ConversationError::Storage(other.into()),
    }
}
