//! Claim decision errors

use shared::error::{AppError, ErrorCode};
use shared::models::{ClaimInvariantError, ClaimStatus, PaymentMethod};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Why an approve/reject/bank id update did not happen
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Claim not found: {0}")]
    NotFound(String),

    #[error("Claim {claim_id} already decided as {status:?}")]
    AlreadyDecided { claim_id: String, status: ClaimStatus },

    #[error("Claim {0} is not awaiting review")]
    NotReady(String),

    #[error("Claim {claim_id} cannot be paid yet: {reason}")]
    MissingPrerequisite {
        claim_id: String,
        reason: Prerequisite,
    },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// What an approval was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    /// Phone payout without an administrator-supplied bank member id
    BankMemberId,
    /// Claim has no usable phone or card destination
    Destination(PaymentMethod),
    /// No claimant name to register the contractor under
    PayeeName,
}

impl std::fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BankMemberId => write!(f, "bank member id is not set"),
            Self::Destination(method) => write!(f, "no payout destination for method {method:?}"),
            Self::PayeeName => write!(f, "claimant name is not set"),
        }
    }
}

impl ClaimError {
    /// Map a rejected claim mutation onto the decision taxonomy
    pub(crate) fn from_invariant(claim_id: &str, err: ClaimInvariantError) -> Self {
        match err {
            ClaimInvariantError::AlreadyDecided(status) => Self::AlreadyDecided {
                claim_id: claim_id.to_string(),
                status,
            },
            ClaimInvariantError::NotAwaitingReview(_) => Self::NotReady(claim_id.to_string()),
            ClaimInvariantError::NotPhonePayout => Self::MissingPrerequisite {
                claim_id: claim_id.to_string(),
                reason: Prerequisite::Destination(PaymentMethod::Phone),
            },
            other => Self::Storage(other.into()),
        }
    }
}

impl From<ClaimError> for AppError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::NotFound(id) => AppError::claim_not_found(id),
            ClaimError::AlreadyDecided { claim_id, status } => AppError::with_message(
                ErrorCode::ClaimAlreadyDecided,
                format!("Claim {claim_id} already decided"),
            )
            .with_detail("claim_id", claim_id)
            .with_detail("claim_status", format!("{status:?}").to_lowercase()),
            ClaimError::NotReady(id) => AppError::new(ErrorCode::ClaimNotReady).with_detail("claim_id", id),
            ClaimError::MissingPrerequisite { claim_id, reason } => {
                let code = match reason {
                    Prerequisite::BankMemberId => ErrorCode::ClaimMissingBankMember,
                    Prerequisite::Destination(_) => ErrorCode::ClaimInvalidPayoutMethod,
                    Prerequisite::PayeeName => ErrorCode::ClaimMissingPayeeName,
                };
                AppError::new(code)
                    .with_detail("claim_id", claim_id)
                    .with_detail("reason", reason.to_string())
            }
            ClaimError::Gateway(e) => {
                let code = if e.is_rejection() {
                    ErrorCode::PaymentFailed
                } else {
                    ErrorCode::GatewayUnavailable
                };
                AppError::gateway(code, e.status(), e.body())
            }
            ClaimError::Storage(e) => {
                tracing::error!(error = %e, "Storage error during claim decision");
                e.into()
            }
        }
    }
}

pub type ClaimResult<T> = Result<T, ClaimError>;
