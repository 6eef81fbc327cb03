//! Unified error type for the ledger, the studio flows and the HTTP surface.

use crate::core::plan::Plan;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

/// Every failure the crate can surface.
///
/// A re-delivered payment confirmation is not an error; it is reported as
/// [`crate::core::entitlement::PaymentOutcome::AlreadyApplied`].
#[derive(Debug, Error)]
pub enum Error {
    /// No user session where one is required
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A keyed row does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Key used for the lookup
        key: String,
    },

    /// Balance is below the cost of the requested spend
    #[error("Insufficient credits: balance {current}, required {required}")]
    InsufficientCredits {
        /// Balance at the time of the check
        current: i64,
        /// Credits the operation needed
        required: i64,
    },

    /// Credit amounts must be positive for debits and non-negative for credits
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// The generation service returned no usable artifact
    #[error("Generation failed: {reason}")]
    GenerationFailed {
        /// Human-readable cause
        reason: String,
    },

    /// The caller's plan does not include the feature
    #[error("The {plan} plan does not include this feature")]
    UpgradeRequired {
        /// Plan the caller is currently on
        plan: Plan,
    },

    /// Webhook signature missing, malformed or wrong
    #[error("Invalid signature: {message}")]
    InvalidSignature {
        /// What was wrong with it
        message: String,
    },

    /// Request or event body could not be interpreted
    #[error("Invalid payload: {message}")]
    InvalidPayload {
        /// What was wrong with it
        message: String,
    },

    /// Checkout provider rejected a request
    #[error("Payment provider error: {message}")]
    Payment {
        /// Provider response or transport error
        message: String,
    },

    /// Configuration file or settings problem
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Backend read/write failure
    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[from] sea_orm::DbErr),

    /// I/O failure (server bind, config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required environment variable is missing
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for a [`Error::InvalidPayload`] with the given message.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidAmount { .. } | Self::InvalidPayload { .. } | Self::InvalidSignature { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::UpgradeRequired { .. } => StatusCode::FORBIDDEN,
            Self::GenerationFailed { .. } | Self::Payment { .. } => StatusCode::BAD_GATEWAY,
            // Anything else must come back as 5xx so webhook deliveries are retried
            Self::Config { .. } | Self::PersistenceFailed(_) | Self::Io(_) | Self::EnvVar(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(Error::NotAuthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::InsufficientCredits {
                current: 0,
                required: 2
            }
            .status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            Error::GenerationFailed {
                reason: "no image".to_string()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::PersistenceFailed(sea_orm::DbErr::Custom("down".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::UpgradeRequired { plan: Plan::Free }.status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_upgrade_required_message_names_plan() {
        let message = Error::UpgradeRequired { plan: Plan::Free }.to_string();
        assert_eq!(message, "The Free plan does not include this feature");
    }
}
