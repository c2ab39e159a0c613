//! Client constants and default configuration values.
//!
//! This module centralizes the vendor paths and the defaults used when the
//! corresponding environment variables are not set.

/// Vendor API constants
pub mod api {
    /// Default base URL of the OSS meter API
    pub const DEFAULT_BASE_URL: &str = "https://api.services.oss.no/api/";

    /// Step one of the email challenge
    pub const AUTH_START: [&str; 2] = ["auth", "start"];

    /// Step two of the email challenge
    pub const AUTH_COMPLETE: [&str; 2] = ["auth", "complete"];

    /// Long-lived API token creation
    pub const TOKENS: [&str; 1] = ["tokens"];

    /// Meter directory for the authenticated account
    pub const METERS: [&str; 1] = ["meters"];

    /// Telemetry prefix, followed by `{meter}/{start}/{end}/{resolution}`
    pub const TELEMETRY: &str = "telemetry";

    /// Correlation header attached to every request
    pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
}

/// Token provisioning constants
pub mod token {
    /// Label used when the operator does not pick one
    pub const DEFAULT_LABEL: &str = "HomeAssistant";

    /// Default token lifetime in days
    pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

    /// Longest lifetime accepted from configuration
    pub const MAX_VALIDITY_DAYS: i64 = 3650;
}

/// Authentication constants
pub mod auth {
    /// Prompts for the emailed secret before giving up on a challenge
    pub const DEFAULT_MAX_SECRET_ATTEMPTS: u32 = 3;
}

/// Retry constants (list meters only)
pub mod retry {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
}

/// Telemetry constants
pub mod telemetry {
    /// Resolution segment of the telemetry path, in minutes
    pub const RESOLUTION_MINUTES: u32 = 1;

    /// Timestamp format used in telemetry path segments
    pub const PATH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    /// Default poll interval in seconds
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

    /// Minimum poll interval in seconds
    pub const MIN_POLL_INTERVAL_SECS: u64 = 10;
}

/// HTTP constants
pub mod http {
    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// Credential store constants
pub mod store {
    /// Default path of the file credential store
    pub const DEFAULT_CREDENTIALS_PATH: &str = "oss_credentials.json";
}
