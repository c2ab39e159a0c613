use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::error::{OssError, Result};

/// Transient identifier returned by step one of authentication.
///
/// Paired with the secret the vendor emails to the account owner; both are
/// needed to complete the challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    challenge_id: String,
    email: String,
    issued_at: DateTime<Utc>,
}

impl AuthChallenge {
    pub fn new(challenge_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            challenge_id: challenge_id.into(),
            email: email.into(),
            issued_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.challenge_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Short-lived bearer value produced by a completed challenge.
///
/// Deliberately not `Clone`: creating an API token consumes it.
pub struct SessionCredential(SecretString);

impl SessionCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub(crate) fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential([REDACTED])")
    }
}

/// Durable bearer credential created by the token provisioner.
///
/// The vendor returns the encoded value exactly once; callers must persist it.
#[derive(Clone)]
pub struct ApiToken {
    value: SecretString,
    label: String,
    expires_at: DateTime<Utc>,
}

impl ApiToken {
    pub fn new(value: impl Into<String>, label: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: SecretString::from(value.into()),
            label: label.into(),
            expires_at,
        }
    }

    /// The encoded token value. Never log the returned slice.
    pub fn expose_secret(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiToken")
            .field("value", &"[REDACTED]")
            .field("label", &self.label)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl PartialEq for ApiToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose_secret() == other.expose_secret()
            && self.label == other.label
            && self.expires_at == other.expires_at
    }
}

/// Parameters for a new API token, validated before any session is spent
#[derive(Debug, Clone, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    label: String,
    expires_at: DateTime<Utc>,
}

impl TokenRequest {
    pub fn new(label: impl Into<String>, expires_at: DateTime<Utc>) -> Result<Self> {
        let request = Self {
            label: label.into().trim().to_string(),
            expires_at,
        };
        request.validate()?;
        request.ensure_future()?;
        Ok(request)
    }

    /// Token request expiring `days` from now, `days` in `1..=MAX_VALIDITY_DAYS`
    pub fn valid_for_days(label: impl Into<String>, days: i64) -> Result<Self> {
        let max_days = crate::constants::token::MAX_VALIDITY_DAYS;
        if !(1..=max_days).contains(&days) {
            return Err(OssError::validation_field(
                "expires_at",
                format!("validity must be between 1 and {} days, got {}", max_days, days),
            ));
        }

        let expires_at = chrono::Duration::try_days(days)
            .and_then(|offset| Utc::now().checked_add_signed(offset))
            .ok_or_else(|| {
                OssError::validation_field("expires_at", format!("{} days is out of range", days))
            })?;
        Self::new(label, expires_at)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Expiry must lie strictly in the future at the time of the check
    pub fn ensure_future(&self) -> Result<()> {
        if self.expires_at <= Utc::now() {
            return Err(OssError::validation_field(
                "expires_at",
                format!("must be in the future, got {}", self.expires_at.to_rfc3339()),
            ));
        }
        Ok(())
    }
}

/// Configuration surface handed to the consuming application
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfiguration {
    pub token: String,
    #[serde(rename = "meterNumber")]
    pub meter_number: String,
}

impl StoredConfiguration {
    pub fn new(token: &ApiToken, meter: &crate::models::MeterIdentifier) -> Self {
        Self {
            token: token.expose_secret().to_string(),
            meter_number: meter.as_str().to_string(),
        }
    }
}

impl fmt::Debug for StoredConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredConfiguration")
            .field("token", &"[REDACTED]")
            .field("meter_number", &self.meter_number)
            .finish()
    }
}
