use anyhow::{anyhow, Result};
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub mod retry;
pub use retry::RetryConfig;

use crate::constants;

#[derive(Debug, Clone)]
pub struct Config {
    /// Vendor API base URL
    pub base_url: Url,
    /// Account email used by `provision` when none is given on the command line
    pub account_email: Option<String>,
    pub request_timeout_secs: u64,
    pub token_label: String,
    pub token_validity_days: i64,
    /// Meter to select when the account has several
    pub preferred_meter: Option<String>,
    pub credentials_path: PathBuf,
    pub max_secret_attempts: u32,
    pub poll_interval_secs: u64,
    pub log_level: String,
    pub retry: RetryConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Missing optional values fall back to defaults; invalid ones are logged
    /// and replaced by the default. Only an unusable base URL is fatal.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("OSS_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| constants::api::DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&raw_url)?;

        let mut config = Config {
            base_url,
            account_email: lookup("OSS_ACCOUNT_EMAIL").filter(|v| !v.trim().is_empty()),
            request_timeout_secs: constants::http::REQUEST_TIMEOUT_SECS,
            token_label: constants::token::DEFAULT_LABEL.to_string(),
            token_validity_days: constants::token::DEFAULT_VALIDITY_DAYS,
            preferred_meter: lookup("OSS_METER_NUMBER").filter(|v| !v.trim().is_empty()),
            credentials_path: lookup("OSS_CREDENTIALS_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(constants::store::DEFAULT_CREDENTIALS_PATH)),
            max_secret_attempts: constants::auth::DEFAULT_MAX_SECRET_ATTEMPTS,
            poll_interval_secs: constants::telemetry::DEFAULT_POLL_INTERVAL_SECS,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            retry: RetryConfig::from_lookup(&lookup),
        };

        if let Some(val) = lookup("OSS_REQUEST_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs >= 1 => {
                    config.request_timeout_secs = secs;
                    info!("Using custom request timeout: {}s", secs);
                }
                Ok(_) => warn!("Invalid request timeout: {}, must be >= 1, using default", val),
                Err(_) => warn!("Failed to parse request timeout: {}, using default", val),
            }
        }

        if let Some(val) = lookup("OSS_TOKEN_LABEL") {
            if val.trim().is_empty() {
                warn!("Empty token label configured, using default");
            } else {
                config.token_label = val;
            }
        }

        if let Some(val) = lookup("OSS_TOKEN_VALIDITY_DAYS") {
            match val.parse::<i64>() {
                Ok(days) if (1..=constants::token::MAX_VALIDITY_DAYS).contains(&days) => {
                    config.token_validity_days = days;
                    info!("Using custom token validity: {} days", days);
                }
                Ok(_) => warn!(
                    "Invalid token validity: {}, must be between 1 and {}, using default",
                    val,
                    constants::token::MAX_VALIDITY_DAYS
                ),
                Err(_) => warn!("Failed to parse token validity: {}, using default", val),
            }
        }

        if let Some(val) = lookup("OSS_MAX_SECRET_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(attempts) if attempts >= 1 => config.max_secret_attempts = attempts,
                Ok(_) => warn!("Invalid secret attempts: {}, must be >= 1, using default", val),
                Err(_) => warn!("Failed to parse secret attempts: {}, using default", val),
            }
        }

        if let Some(val) = lookup("OSS_POLL_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs >= constants::telemetry::MIN_POLL_INTERVAL_SECS => {
                    config.poll_interval_secs = secs;
                    info!("Using custom poll interval: {}s", secs);
                }
                Ok(_) => warn!(
                    "Invalid poll interval: {}, must be >= {}, using default",
                    val,
                    constants::telemetry::MIN_POLL_INTERVAL_SECS
                ),
                Err(_) => warn!("Failed to parse poll interval: {}, using default", val),
            }
        }

        Ok(config)
    }

    /// Defaults pointed at `base_url`, mainly for tests and embedding
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let base_url = base_url.to_string();
        Self::from_lookup(move |key| match key {
            "OSS_API_URL" => Some(base_url.clone()),
            _ => None,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| anyhow!("OSS_API_URL is not a valid URL ({}): {}", raw, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("OSS_API_URL must use http or https, got {}", url.scheme()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
