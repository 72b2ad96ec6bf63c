//! Notifications and the engagement check
//!
//! - [`ClaimNotifier`] - tells administrators about new claims and claimants
//!   about decisions
//! - [`EngagementVerifier`] - "is this user subscribed to the channel"

use async_trait::async_trait;
use serde::Deserialize;
use shared::models::Claim;
use std::sync::Arc;
use std::time::Duration;

use crate::conversation::{ConversationChannel, Prompt};

#[async_trait]
pub trait ClaimNotifier: Send + Sync {
    /// A claim reached `awaiting_review`
    async fn claim_submitted(&self, claim: &Claim);

    /// The payout for the claim was committed
    async fn payout_sent(&self, claim: &Claim);

    async fn claim_rejected(&self, claim: &Claim);
}

/// Sends notifications through the conversation channel
pub struct ChannelNotifier {
    channel: Arc<dyn ConversationChannel>,
    admin_chat_id: i64,
}

impl ChannelNotifier {
    pub fn new(channel: Arc<dyn ConversationChannel>, admin_chat_id: i64) -> Self {
        Self {
            channel,
            admin_chat_id,
        }
    }
}

#[async_trait]
impl ClaimNotifier for ChannelNotifier {
    async fn claim_submitted(&self, claim: &Claim) {
        tracing::info!(claim_id = %claim.claim_id, user_id = claim.user_id, "Claim awaiting review");
        self.channel
            .send(
                self.admin_chat_id,
                Prompt::ReviewRequested {
                    claim: Box::new(claim.clone()),
                },
            )
            .await;
    }

    async fn payout_sent(&self, claim: &Claim) {
        self.channel
            .send(
                claim.user_id,
                Prompt::PayoutSent {
                    claim_id: claim.claim_id.clone(),
                    amount: claim.amount,
                },
            )
            .await;
    }

    async fn claim_rejected(&self, claim: &Claim) {
        self.channel
            .send(
                claim.user_id,
                Prompt::ClaimRejected {
                    claim_id: claim.claim_id.clone(),
                },
            )
            .await;
    }
}

#[async_trait]
pub trait EngagementVerifier: Send + Sync {
    async fn is_subscribed(&self, user_id: i64) -> bool;
}

/// Accepts everyone (no channel configured)
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl EngagementVerifier for AllowAll {
    async fn is_subscribed(&self, _user_id: i64) -> bool {
        true
    }
}

/// Checks channel membership through the Telegram Bot API `getChatMember`
#[derive(Debug, Clone)]
pub struct TelegramSubscriptionChecker {
    client: reqwest::Client,
    api_base: String,
    channel: String,
}

#[derive(Deserialize)]
struct ChatMemberResponse {
    ok: bool,
    result: Option<ChatMember>,
}

#[derive(Deserialize)]
struct ChatMember {
    status: String,
    /// Only sent for `restricted` members
    #[serde(default)]
    is_member: Option<bool>,
}

impl ChatMember {
    /// `restricted` users count only while they are still in the chat
    fn counts_as_subscribed(&self) -> bool {
        match self.status.as_str() {
            "creator" | "administrator" | "member" => true,
            "restricted" => self.is_member == Some(true),
            _ => false,
        }
    }
}

impl TelegramSubscriptionChecker {
    pub fn new(bot_token: &str, channel: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_base: format!("https://api.telegram.org/bot{bot_token}"),
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl EngagementVerifier for TelegramSubscriptionChecker {
    async fn is_subscribed(&self, user_id: i64) -> bool {
        let user_id_param = user_id.to_string();
        let response = self
            .client
            .get(format!("{}/getChatMember", self.api_base))
            .query(&[("chat_id", self.channel.as_str()), ("user_id", user_id_param.as_str())])
            .send()
            .await;

        let body: ChatMemberResponse = match response {
            Ok(resp) => match resp.json().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Invalid getChatMember response");
                    return false;
                }
            },
            Err(e) => {
                tracing::warn!(user_id, error = %e, "getChatMember request failed");
                return false;
            }
        };

        body.ok
            && body
                .result
                .is_some_and(|member| member.counts_as_subscribed())
    }
}
