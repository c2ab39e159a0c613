//! Persistence for the durable token and the selected meter.
//!
//! The consuming application owns the storage; this crate only needs
//! `save` and `load`.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ApiToken, MeterIdentifier};

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::InMemoryCredentialStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist the token and meter, replacing anything stored before
    async fn save(&self, token: &ApiToken, meter: &MeterIdentifier) -> Result<()>;

    /// Previously saved credentials, if any
    async fn load(&self) -> Result<Option<(ApiToken, MeterIdentifier)>>;
}
