//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound | Self::ClaimNotFound | Self::PaymentNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists | Self::ClaimAlreadyDecided | Self::ClaimNotReady => {
                StatusCode::CONFLICT
            }

            // 422 Unprocessable Entity (claim exists but cannot be paid yet)
            Self::ClaimMissingBankMember
            | Self::ClaimInvalidPayoutMethod
            | Self::ClaimMissingPayeeName => StatusCode::UNPROCESSABLE_ENTITY,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenInvalid => StatusCode::UNAUTHORIZED,

            // 502 Bad Gateway (gateway answered with an error)
            Self::PaymentFailed | Self::ContractorRegistrationFailed => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::GatewayUnavailable | Self::NetworkError | Self::TimeoutError => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 500 Internal Server Error
            Self::Unknown | Self::InternalError | Self::DatabaseError | Self::ConfigError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(
            ErrorCode::ClaimNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::PaymentNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_decision_conflicts() {
        assert_eq!(
            ErrorCode::ClaimAlreadyDecided.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ErrorCode::ClaimNotReady.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::ClaimMissingBankMember.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ErrorCode::ClaimMissingPayeeName.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_gateway_statuses() {
        assert_eq!(
            ErrorCode::PaymentFailed.http_status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ErrorCode::GatewayUnavailable.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::TimeoutError.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_bad_request_default() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::WebhookSignatureInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorCode::CodeNotFound.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_system_statuses() {
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::NotAuthenticated.http_status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
