//! Outbound messages and the channel that delivers them

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::Claim;

use super::ConversationStep;

/// What the bot says
///
/// Wording and keyboards belong to the transport; this only says which
/// message to show and with which values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Prompt {
    AskCode,
    InvalidCode,
    /// Code reply came without the claimant's name; the code is not spent
    AskName,
    AskProof { claim_id: String },
    NotSubscribed,
    ProofReceived { attachments: usize },
    AskPaymentMethod,
    AskPhone,
    InvalidPhone,
    AskBank,
    InvalidBank,
    AskCard,
    InvalidCard,
    ClaimSubmitted { claim_id: String },
    WrongStep { expected: ConversationStep },
    Abandoned,

    // Administrator chat
    ReviewRequested { claim: Box<Claim> },

    // Claimant, after an administrator decision
    PayoutSent { claim_id: String, amount: Decimal },
    ClaimRejected { claim_id: String },
}

/// Delivery of prompts to a chat
#[async_trait]
pub trait ConversationChannel: Send + Sync {
    async fn send(&self, chat_id: i64, prompt: Prompt);
}

/// Channel that queues prompts per chat until the transport drains them
///
/// Used by the HTTP conversation endpoint, which returns the queued prompts
/// in its response.
#[derive(Debug, Default)]
pub struct BufferedChannel {
    outbox: DashMap<i64, Vec<Prompt>>,
}

impl BufferedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued prompt for `chat_id`
    pub fn drain(&self, chat_id: i64) -> Vec<Prompt> {
        self.outbox
            .remove(&chat_id)
            .map(|(_, prompts)| prompts)
            .unwrap_or_default()
    }

    /// Queued prompts for `chat_id` without removing them
    pub fn peek(&self, chat_id: i64) -> Vec<Prompt> {
        self.outbox
            .get(&chat_id)
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationChannel for BufferedChannel {
    async fn send(&self, chat_id: i64, prompt: Prompt) {
        tracing::debug!(chat_id, ?prompt, "Queued prompt");
        self.outbox.entry(chat_id).or_default().push(prompt);
    }
}
