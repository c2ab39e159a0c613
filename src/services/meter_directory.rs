use reqwest::StatusCode;
use tracing::{debug, info, instrument, warn};

use crate::config::RetryConfig;
use crate::constants;
use crate::error::{OssError, Result};
use crate::models::meter::MeterEntry;
use crate::models::{ApiToken, MeterIdentifier};
use crate::services::vendor_client::{is_transient_status, VendorClient};

/// Lists the meters registered on the token's account.
///
/// The listing is an idempotent read, so transient failures are retried
/// according to the configured policy. Rejected credentials are not.
#[derive(Clone, Debug)]
pub struct MeterDirectoryClient {
    vendor: VendorClient,
    retry: RetryConfig,
}

impl MeterDirectoryClient {
    pub fn new(vendor: VendorClient, retry: RetryConfig) -> Self {
        Self { vendor, retry }
    }

    /// Meter identifiers for the account, in vendor order.
    ///
    /// An account without meters yields an empty vector, not an error.
    #[instrument(skip(self, token))]
    pub async fn list_meters(&self, token: &ApiToken) -> Result<Vec<MeterIdentifier>> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.fetch_meters(token).await {
                Ok(meters) => {
                    info!(count = meters.len(), "Listed meters");
                    return Ok(meters);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_before(attempt + 1);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Meter listing failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(OssError::Transport(msg)) => {
                    return Err(OssError::Unauthorized(format!(
                        "meter listing failed after {} attempts: {}",
                        attempt, msg
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_meters(&self, token: &ApiToken) -> Result<Vec<MeterIdentifier>> {
        let url = self.vendor.endpoint(&constants::api::METERS)?;
        let response = self
            .vendor
            .send(self.vendor.get(url).bearer_auth(token.expose_secret()))
            .await?;

        let status = response.status();
        if status.is_success() {
            let entries: Vec<MeterEntry> = VendorClient::decode(response).await?;
            let total = entries.len();
            let meters: Vec<MeterIdentifier> = entries
                .into_iter()
                .filter_map(|entry| {
                    if let Some(name) = &entry.name {
                        debug!(name = %name, "Meter entry");
                    }
                    entry.meter_number.into_identifier()
                })
                .collect();
            if meters.len() != total {
                warn!(
                    skipped = total - meters.len(),
                    "Ignored meter entries without a meter number"
                );
            }
            return Ok(meters);
        }

        let detail = VendorClient::describe_failure(response).await;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(OssError::Unauthorized(detail))
            }
            s if is_transient_status(s) => Err(OssError::Transport(detail)),
            _ => Err(OssError::UnexpectedResponse(detail)),
        }
    }
}
