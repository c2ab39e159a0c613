//! Automated credential provisioning for the OSS HAN meter API.
//!
//! Replaces the manual API-explorer procedure with typed calls:
//! [`CredentialNegotiator`] runs the email challenge, [`TokenProvisioner`]
//! turns the session into a durable API token, [`MeterDirectoryClient`]
//! lists the account's meters, and a [`CredentialStore`] keeps the token and
//! chosen meter for the consuming application. [`ProvisioningFlow`] chains
//! the stages.

pub mod config;
pub mod constants;
pub mod error;
pub mod flow;
pub mod models;
pub mod services;
pub mod startup;
pub mod store;

pub use config::Config;
pub use error::{ErrorCode, OssError};
pub use flow::{FlowError, ProvisioningFlow, ProvisioningOutcome, SecretPrompt, Stage};
pub use models::{ApiToken, AuthChallenge, MeterIdentifier, SessionCredential, StoredConfiguration, TokenRequest};
pub use services::{CredentialNegotiator, MeterDirectoryClient, TelemetryClient, TelemetryWatcher, TokenProvisioner, VendorClient};
pub use store::{CredentialStore, FileCredentialStore, InMemoryCredentialStore};
