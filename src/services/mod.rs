// Vendor API clients
// Authentication, token provisioning, meter directory and telemetry

pub mod meter_directory;
pub mod negotiator;
pub mod provisioner;
pub mod telemetry;
pub mod vendor_client;

pub use meter_directory::MeterDirectoryClient;
pub use negotiator::CredentialNegotiator;
pub use provisioner::TokenProvisioner;
pub use telemetry::{TelemetryClient, TelemetryWatcher};
pub use vendor_client::VendorClient;
