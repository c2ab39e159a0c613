// Data models and DTOs
// Credentials, meter directory entries and telemetry readings

pub mod credentials;
pub mod meter;
pub mod telemetry;

pub use credentials::{ApiToken, AuthChallenge, SessionCredential, StoredConfiguration, TokenRequest};
pub use meter::MeterIdentifier;
pub use telemetry::{Measurement, Phase, PowerUnit, Statistic, TelemetryReading};
