//! Payout gateway (Konsol)
//!
//! # Calls
//!
//! | Call | Endpoint | Idempotent |
//! |------|----------|------------|
//! | `register_contractor` | `POST /api/contractors` | no, cached on the claim |
//! | `create_payment` | `POST /api/payments` | no, cached as `konsol_payment_id` |
//! | `get_payment` | `GET /api/payments/{id}` | yes |
//! | `list_bank_members` | `GET /api/fps_bank_members` | yes |
//!
//! Every call has a bounded timeout and is never retried here; retrying a
//! non-idempotent call is the controller's decision.

mod client;
pub mod signature;

pub use client::KonsolClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{BankDetails, BankDetailsKind};
use thiserror::Error;

/// Gateway failure, carrying whatever the gateway sent back
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway unreachable: {0}")]
    Transport(String),

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// HTTP status, when the gateway answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body or transport message
    pub fn body(&self) -> String {
        match self {
            Self::Status { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }

    /// The gateway answered with an error, as opposed to not answering
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::InvalidResponse(_))
    }
}

/// Payee registration payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractorProfile {
    pub kind: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub phone: String,
}

impl ContractorProfile {
    /// Individual contractor from a display name such as "Ivan Petrov"
    ///
    /// The first word becomes the first name, the rest the last name.
    pub fn individual(display_name: &str, phone: impl Into<String>) -> Self {
        let mut words = display_name.split_whitespace();
        let first_name = words.next().unwrap_or_default().to_string();
        let rest = words.collect::<Vec<_>>().join(" ");
        Self {
            kind: "individual".to_string(),
            first_name,
            last_name: (!rest.is_empty()).then_some(rest),
            phone: phone.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractorCreated {
    pub id: String,
}

/// Line item of a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub title: String,
    pub amount: Decimal,
}

/// `POST /api/payments` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub contractor_id: String,
    pub services_list: Vec<ServiceItem>,
    pub bank_details_kind: BankDetailsKind,
    pub bank_details: BankDetails,
    pub purpose: String,
    pub amount: Decimal,
}

impl CreatePaymentRequest {
    pub fn new(
        contractor_id: impl Into<String>,
        amount: Decimal,
        purpose: impl Into<String>,
        bank_details: BankDetails,
    ) -> Self {
        let purpose = purpose.into();
        Self {
            contractor_id: contractor_id.into(),
            services_list: vec![ServiceItem {
                title: purpose.clone(),
                amount,
            }],
            bank_details_kind: bank_details.kind(),
            bank_details,
            purpose,
            amount,
        }
    }
}

/// Payment as the gateway reports it
///
/// Only `id` and `status` drive decisions; the rest is kept for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// FPS participant bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bic: Option<String>,
}

#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Register a payee, returning its contractor id
    async fn register_contractor(&self, profile: &ContractorProfile) -> Result<String, GatewayError>;

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError>;

    async fn get_payment(&self, konsol_id: &str) -> Result<GatewayPayment, GatewayError>;

    async fn list_bank_members(&self) -> Result<Vec<BankMember>, GatewayError>;
}
