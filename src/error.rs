use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OssError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    #[serde(rename = "AUTH_1001")]
    InvalidAccount,
    #[serde(rename = "AUTH_1002")]
    AuthUnavailable,
    #[serde(rename = "AUTH_1003")]
    ChallengeExpired,
    #[serde(rename = "AUTH_1004")]
    SecretMismatch,

    // Authorization errors (2xxx)
    #[serde(rename = "AUTHZ_2001")]
    Unauthorized,
    #[serde(rename = "AUTHZ_2002")]
    QuotaExceeded,

    // Validation errors (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidInput,

    // Resource errors (4xxx)
    #[serde(rename = "RES_4001")]
    NoTelemetry,

    // External service errors (8xxx)
    #[serde(rename = "EXT_8003")]
    UnexpectedResponse,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9996")]
    StoreFailed,
    #[serde(rename = "INT_9998")]
    ConfigurationError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::InvalidAccount => 1001,
            ErrorCode::AuthUnavailable => 1002,
            ErrorCode::ChallengeExpired => 1003,
            ErrorCode::SecretMismatch => 1004,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::QuotaExceeded => 2002,

            ErrorCode::InvalidInput => 3001,

            ErrorCode::NoTelemetry => 4001,

            ErrorCode::UnexpectedResponse => 8003,

            ErrorCode::StoreFailed => 9996,
            ErrorCode::ConfigurationError => 9998,
        }
    }

    /// Get operator-facing message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAccount => "The account email is not recognized by the meter API",
            ErrorCode::AuthUnavailable => "The authentication service is currently unavailable",
            ErrorCode::ChallengeExpired => {
                "The authentication challenge expired. Start authentication again"
            }
            ErrorCode::SecretMismatch => "The secret from the email did not match",
            ErrorCode::Unauthorized => "The credential was rejected, expired or revoked",
            ErrorCode::QuotaExceeded => "The account already holds the maximum number of tokens",
            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::NoTelemetry => "No telemetry is available for the requested window",
            ErrorCode::UnexpectedResponse => "The meter API returned an unexpected response",
            ErrorCode::StoreFailed => "Failed to read or write stored credentials",
            ErrorCode::ConfigurationError => "Client configuration error",
        }
    }
}

#[derive(Debug, Error)]
pub enum OssError {
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Authentication unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Authentication challenge expired")]
    ChallengeExpired,

    #[error("Secret does not match the authentication challenge")]
    SecretMismatch,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Token quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation failed: {field}: {message}")]
    ValidationWithField { field: String, message: String },

    #[error("No telemetry for meter {0}")]
    NoTelemetry(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection failure, timeout or transient server failure.
    /// The authentication, token and directory stages translate it into
    /// their own error kinds.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl OssError {
    /// Create validation error for specific field
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        OssError::ValidationWithField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            OssError::InvalidAccount(_) => ErrorCode::InvalidAccount,
            OssError::AuthUnavailable(_) => ErrorCode::AuthUnavailable,
            OssError::ChallengeExpired => ErrorCode::ChallengeExpired,
            OssError::SecretMismatch => ErrorCode::SecretMismatch,
            OssError::Unauthorized(_) => ErrorCode::Unauthorized,
            OssError::QuotaExceeded(_) => ErrorCode::QuotaExceeded,
            OssError::Validation(_) | OssError::ValidationWithField { .. } => {
                ErrorCode::InvalidInput
            }
            OssError::NoTelemetry(_) => ErrorCode::NoTelemetry,
            OssError::UnexpectedResponse(_) | OssError::Transport(_) => {
                ErrorCode::UnexpectedResponse
            }
            OssError::Store(_) => ErrorCode::StoreFailed,
            OssError::Configuration(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Whether a repeated identical request may succeed.
    ///
    /// Only the meter listing acts on this; the authentication and token
    /// stages are never retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OssError::Transport(_))
    }

    /// Get field name for validation errors
    pub fn error_field(&self) -> Option<&str> {
        match self {
            OssError::ValidationWithField { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for OssError {
    fn from(errors: validator::ValidationErrors) -> Self {
        match errors.field_errors().into_iter().next() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                OssError::validation_field(field.to_string(), message)
            }
            None => OssError::Validation(errors.to_string()),
        }
    }
}
