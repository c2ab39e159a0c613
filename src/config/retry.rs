use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::retry;

/// Backoff settings for the idempotent meter listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one (default: 3)
    pub max_attempts: u32,

    /// Delay in milliseconds before the second attempt (default: 500)
    pub initial_delay_ms: u64,

    /// Exponential backoff multiplier (default: 2.0)
    pub backoff_multiplier: f64,

    /// Upper bound in milliseconds for any single delay (default: 10000)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry::DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: retry::DEFAULT_INITIAL_DELAY_MS,
            backoff_multiplier: retry::DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: retry::DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Load overrides through `lookup`, keeping defaults for missing or invalid values
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("OSS_RETRY_MAX_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(attempts) if attempts >= 1 => {
                    config.max_attempts = attempts;
                    info!("Using custom list-meters attempts: {}", attempts);
                }
                Ok(_) => warn!("Invalid retry attempts: {}, must be >= 1, using default", val),
                Err(_) => warn!("Failed to parse retry attempts: {}, using default", val),
            }
        }

        if let Some(val) = lookup("OSS_RETRY_INITIAL_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(delay) => config.initial_delay_ms = delay,
                Err(_) => warn!("Failed to parse initial retry delay: {}, using default", val),
            }
        }

        if let Some(val) = lookup("OSS_RETRY_BACKOFF_MULTIPLIER") {
            match val.parse::<f64>() {
                Ok(multiplier) if multiplier >= 1.0 => config.backoff_multiplier = multiplier,
                Ok(_) => warn!(
                    "Invalid retry backoff multiplier: {}, must be >= 1.0, using default",
                    val
                ),
                Err(_) => warn!("Failed to parse retry backoff multiplier: {}, using default", val),
            }
        }

        if let Some(val) = lookup("OSS_RETRY_MAX_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(delay) if delay >= config.initial_delay_ms => config.max_delay_ms = delay,
                Ok(_) => warn!(
                    "Invalid max retry delay: {}, must be >= initial delay, using default",
                    val
                ),
                Err(_) => warn!("Failed to parse max retry delay: {}, using default", val),
            }
        }

        if config.max_delay_ms < config.initial_delay_ms {
            warn!("Max retry delay below initial delay, clamping to initial delay");
            config.max_delay_ms = config.initial_delay_ms;
        }

        config
    }

    /// Delay before the given attempt (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 2);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}
