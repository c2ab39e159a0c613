use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::CredentialStore;
use crate::error::Result;
use crate::models::{ApiToken, MeterIdentifier};

/// Process-local store, for tests and for embedding applications that
/// persist the credentials themselves.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<RwLock<Option<(ApiToken, MeterIdentifier)>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn save(&self, token: &ApiToken, meter: &MeterIdentifier) -> Result<()> {
        *self.inner.write().await = Some((token.clone(), meter.clone()));
        Ok(())
    }

    async fn load(&self) -> Result<Option<(ApiToken, MeterIdentifier)>> {
        Ok(self.inner.read().await.clone())
    }
}
