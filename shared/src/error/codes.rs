//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Claim and conversation errors
//! - 5xxx: Payment and gateway errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so admin tooling can match
/// on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 4xxx: Claim ====================
    /// Claim not found
    ClaimNotFound = 4001,
    /// Claim was already approved or rejected
    ClaimAlreadyDecided = 4002,
    /// Claim has not been submitted for review
    ClaimNotReady = 4003,
    /// Phone payout needs a bank member id first
    ClaimMissingBankMember = 4004,
    /// Claim has no usable payout destination
    ClaimInvalidPayoutMethod = 4005,
    /// Claimant never gave a name to register with the gateway
    ClaimMissingPayeeName = 4006,
    /// Code unknown or already used
    CodeNotFound = 4101,
    /// Reply does not match the current conversation step
    ConversationStepMismatch = 4102,
    /// Claimant is not subscribed to the channel
    NotSubscribed = 4103,

    // ==================== 5xxx: Payment ====================
    /// Gateway rejected the payment
    PaymentFailed = 5001,
    /// Payment not found
    PaymentNotFound = 5002,
    /// Gateway rejected the contractor registration
    ContractorRegistrationFailed = 5003,
    /// Gateway unreachable or timed out
    GatewayUnavailable = 5004,
    /// Webhook signature mismatch
    WebhookSignatureInvalid = 5005,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
    /// Network error
    NetworkError = 9101,
    /// Operation timed out
    TimeoutError = 9102,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Get the default English message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            // General
            Self::Success => "Operation completed successfully",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::InvalidRequest => "Invalid request",
            Self::InvalidFormat => "Invalid format",
            Self::RequiredField => "Required field missing",

            // Auth
            Self::NotAuthenticated => "Authentication required",
            Self::TokenInvalid => "Token is invalid",

            // Claim
            Self::ClaimNotFound => "Claim not found",
            Self::ClaimAlreadyDecided => "Claim has already been decided",
            Self::ClaimNotReady => "Claim is not awaiting review",
            Self::ClaimMissingBankMember => "Bank member id is required for phone payouts",
            Self::ClaimInvalidPayoutMethod => "Claim has no valid payout destination",
            Self::ClaimMissingPayeeName => "Claimant name is required for payouts",
            Self::CodeNotFound => "Code not found or already used",
            Self::ConversationStepMismatch => "Reply does not match the current step",
            Self::NotSubscribed => "Subscription to the channel is required",

            // Payment
            Self::PaymentFailed => "Payment failed",
            Self::PaymentNotFound => "Payment not found",
            Self::ContractorRegistrationFailed => "Contractor registration failed",
            Self::GatewayUnavailable => "Payment gateway unavailable",
            Self::WebhookSignatureInvalid => "Webhook signature is invalid",

            // System
            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
            Self::ConfigError => "Configuration error",
            Self::NetworkError => "Network error",
            Self::TimeoutError => "Operation timed out",
        }
    }
}

/// Error returned when converting an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Claim
            4001 => Ok(ErrorCode::ClaimNotFound),
            4002 => Ok(ErrorCode::ClaimAlreadyDecided),
            4003 => Ok(ErrorCode::ClaimNotReady),
            4004 => Ok(ErrorCode::ClaimMissingBankMember),
            4005 => Ok(ErrorCode::ClaimInvalidPayoutMethod),
            4006 => Ok(ErrorCode::ClaimMissingPayeeName),
            4101 => Ok(ErrorCode::CodeNotFound),
            4102 => Ok(ErrorCode::ConversationStepMismatch),
            4103 => Ok(ErrorCode::NotSubscribed),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::PaymentNotFound),
            5003 => Ok(ErrorCode::ContractorRegistrationFailed),
            5004 => Ok(ErrorCode::GatewayUnavailable),
            5005 => Ok(ErrorCode::WebhookSignatureInvalid),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConfigError),
            9101 => Ok(ErrorCode::NetworkError),
            9102 => Ok(ErrorCode::TimeoutError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::ClaimNotFound.code(), 4001);
        assert_eq!(ErrorCode::ClaimAlreadyDecided.code(), 4002);
        assert_eq!(ErrorCode::ClaimMissingBankMember.code(), 4004);
        assert_eq!(ErrorCode::CodeNotFound.code(), 4101);
        assert_eq!(ErrorCode::PaymentFailed.code(), 5001);
        assert_eq!(ErrorCode::GatewayUnavailable.code(), 5004);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
        assert_eq!(ErrorCode::TimeoutError.code(), 9102);
    }

    #[test]
    fn test_try_from_covers_every_variant() {
        let all = [
            ErrorCode::Success,
            ErrorCode::Unknown,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::AlreadyExists,
            ErrorCode::InvalidRequest,
            ErrorCode::InvalidFormat,
            ErrorCode::RequiredField,
            ErrorCode::NotAuthenticated,
            ErrorCode::TokenInvalid,
            ErrorCode::ClaimNotFound,
            ErrorCode::ClaimAlreadyDecided,
            ErrorCode::ClaimNotReady,
            ErrorCode::ClaimMissingBankMember,
            ErrorCode::ClaimInvalidPayoutMethod,
            ErrorCode::ClaimMissingPayeeName,
            ErrorCode::CodeNotFound,
            ErrorCode::ConversationStepMismatch,
            ErrorCode::NotSubscribed,
            ErrorCode::PaymentFailed,
            ErrorCode::PaymentNotFound,
            ErrorCode::ContractorRegistrationFailed,
            ErrorCode::GatewayUnavailable,
            ErrorCode::WebhookSignatureInvalid,
            ErrorCode::InternalError,
            ErrorCode::DatabaseError,
            ErrorCode::ConfigError,
            ErrorCode::NetworkError,
            ErrorCode::TimeoutError,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::ClaimAlreadyDecided).unwrap();
        assert_eq!(json, "4002");

        let code: ErrorCode = serde_json::from_str("5004").unwrap();
        assert_eq!(code, ErrorCode::GatewayUnavailable);

        let result: Result<ErrorCode, _> = serde_json::from_str("10000");
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorCode::Success), "0");
        assert_eq!(format!("{}", ErrorCode::ClaimNotFound), "4001");
        assert_eq!(
            format!("{}", InvalidErrorCode(999)),
            "invalid error code: 999"
        );
    }
}
