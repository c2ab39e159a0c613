//! Linear provisioning flow: negotiator, provisioner, directory, store.
//!
//! Each stage consumes the previous stage's output. Any failure aborts the
//! remaining stages and reports which stage failed, so the operator knows
//! where to restart. The flow is not resumable mid-stage.

use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::OssError;
use crate::models::{ApiToken, AuthChallenge, MeterIdentifier, StoredConfiguration, TokenRequest};
use crate::services::{CredentialNegotiator, MeterDirectoryClient, TokenProvisioner, VendorClient};
use crate::store::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PrepareTokenRequest,
    StartAuthentication,
    CompleteAuthentication,
    CreateToken,
    ListMeters,
    SelectMeter,
    SaveCredentials,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::PrepareTokenRequest => "prepare token request",
            Stage::StartAuthentication => "start authentication",
            Stage::CompleteAuthentication => "complete authentication",
            Stage::CreateToken => "create token",
            Stage::ListMeters => "list meters",
            Stage::SelectMeter => "select meter",
            Stage::SaveCredentials => "save credentials",
        };
        f.write_str(name)
    }
}

/// A failed stage and the error it surfaced, unchanged
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct FlowError {
    pub stage: Stage,
    #[source]
    pub source: OssError,
    /// Token created before the failure; it cannot be fetched again
    pub unsaved_token: Option<ApiToken>,
}

impl FlowError {
    fn at(stage: Stage, source: OssError) -> Self {
        Self {
            stage,
            source,
            unsaved_token: None,
        }
    }

    fn with_token(stage: Stage, source: OssError, token: ApiToken) -> Self {
        Self {
            stage,
            source,
            unsaved_token: Some(token),
        }
    }
}

/// Supplies the secret the vendor emailed to the account owner
#[async_trait]
pub trait SecretPrompt: Send + Sync {
    /// `attempt` starts at 1 and grows after each rejected secret
    async fn emailed_secret(&self, challenge: &AuthChallenge, attempt: u32) -> Result<SecretString, OssError>;
}

/// Result of a completed flow
#[derive(Debug)]
pub struct ProvisioningOutcome {
    pub token: ApiToken,
    pub meters: Vec<MeterIdentifier>,
    /// `None` when the account has no meters; nothing was saved then
    pub selected: Option<MeterIdentifier>,
}

impl ProvisioningOutcome {
    /// The two values the consuming application is configured with
    pub fn configuration(&self) -> Option<StoredConfiguration> {
        self.selected
            .as_ref()
            .map(|meter| StoredConfiguration::new(&self.token, meter))
    }
}

pub struct ProvisioningFlow {
    negotiator: CredentialNegotiator,
    provisioner: TokenProvisioner,
    directory: MeterDirectoryClient,
    store: Arc<dyn CredentialStore>,
    token_label: String,
    token_validity_days: i64,
    preferred_meter: Option<MeterIdentifier>,
    max_secret_attempts: u32,
}

impl ProvisioningFlow {
    pub fn new(
        negotiator: CredentialNegotiator,
        provisioner: TokenProvisioner,
        directory: MeterDirectoryClient,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            negotiator,
            provisioner,
            directory,
            store,
            token_label: crate::constants::token::DEFAULT_LABEL.to_string(),
            token_validity_days: crate::constants::token::DEFAULT_VALIDITY_DAYS,
            preferred_meter: None,
            max_secret_attempts: crate::constants::auth::DEFAULT_MAX_SECRET_ATTEMPTS,
        }
    }

    /// Wire every stage from configuration
    pub fn from_config(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, OssError> {
        let vendor = VendorClient::from_config(config)?;
        let flow = Self::new(
            CredentialNegotiator::new(vendor.clone()),
            TokenProvisioner::new(vendor.clone()),
            MeterDirectoryClient::new(vendor, config.retry.clone()),
            store,
        )
        .with_token_label(config.token_label.clone())
        .with_token_validity_days(config.token_validity_days)
        .with_max_secret_attempts(config.max_secret_attempts);

        Ok(match &config.preferred_meter {
            Some(meter) => flow.with_preferred_meter(MeterIdentifier::new(meter.clone())),
            None => flow,
        })
    }

    pub fn with_token_label(mut self, label: impl Into<String>) -> Self {
        self.token_label = label.into();
        self
    }

    pub fn with_token_validity_days(mut self, days: i64) -> Self {
        self.token_validity_days = days;
        self
    }

    pub fn with_preferred_meter(mut self, meter: MeterIdentifier) -> Self {
        self.preferred_meter = Some(meter);
        self
    }

    pub fn with_max_secret_attempts(mut self, attempts: u32) -> Self {
        self.max_secret_attempts = attempts.max(1);
        self
    }

    /// Run every stage for `account_email`
    pub async fn run(
        &self,
        account_email: &str,
        prompt: &dyn SecretPrompt,
    ) -> Result<ProvisioningOutcome, FlowError> {
        // Validated up front so a bad label never wastes an emailed challenge
        let request = TokenRequest::valid_for_days(&self.token_label, self.token_validity_days)
            .map_err(|e| fail(Stage::PrepareTokenRequest, e))?;

        info!(stage = %Stage::StartAuthentication, "Starting provisioning");
        let challenge = self
            .negotiator
            .start_authentication(account_email)
            .await
            .map_err(|e| fail(Stage::StartAuthentication, e))?;

        let session = self.complete_with_prompt(&challenge, prompt).await?;

        info!(stage = %Stage::CreateToken, "Creating API token");
        let token = self
            .provisioner
            .create_token_with(session, &request)
            .await
            .map_err(|e| fail(Stage::CreateToken, e))?;

        info!(stage = %Stage::ListMeters, "Listing meters");
        let meters = match self.directory.list_meters(&token).await {
            Ok(meters) => meters,
            Err(e) => {
                error!(stage = %Stage::ListMeters, "Stage failed: {}", e);
                return Err(FlowError::with_token(Stage::ListMeters, e, token));
            }
        };

        let selected = match self.select_meter(&meters) {
            Ok(selected) => selected,
            Err(e) => {
                error!(stage = %Stage::SelectMeter, "Stage failed: {}", e);
                return Err(FlowError::with_token(Stage::SelectMeter, e, token));
            }
        };

        let Some(meter) = selected else {
            warn!("Account has no meters, token was not saved");
            return Ok(ProvisioningOutcome {
                token,
                meters,
                selected: None,
            });
        };

        if let Err(e) = self.store.save(&token, &meter).await {
            error!(stage = %Stage::SaveCredentials, "Stage failed: {}", e);
            return Err(FlowError::with_token(Stage::SaveCredentials, e, token));
        }

        info!(meter = %meter, "Provisioning complete");
        Ok(ProvisioningOutcome {
            token,
            meters,
            selected: Some(meter),
        })
    }

    /// Prompt for the emailed secret, re-prompting on mismatch against the
    /// same challenge. Expiry and any other error abort immediately.
    async fn complete_with_prompt(
        &self,
        challenge: &AuthChallenge,
        prompt: &dyn SecretPrompt,
    ) -> Result<crate::models::SessionCredential, FlowError> {
        let mut attempt = 1;
        loop {
            let secret = prompt
                .emailed_secret(challenge, attempt)
                .await
                .map_err(|e| fail(Stage::CompleteAuthentication, e))?;

            match self.negotiator.complete_authentication(challenge, &secret).await {
                Ok(session) => return Ok(session),
                Err(OssError::SecretMismatch) if attempt < self.max_secret_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_secret_attempts,
                        "Secret rejected, asking again"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(fail(Stage::CompleteAuthentication, e)),
            }
        }
    }

    fn select_meter(&self, meters: &[MeterIdentifier]) -> Result<Option<MeterIdentifier>, OssError> {
        match &self.preferred_meter {
            Some(preferred) if meters.contains(preferred) => Ok(Some(preferred.clone())),
            Some(preferred) if !meters.is_empty() => Err(OssError::validation_field(
                "meter_number",
                format!(
                    "meter {} is not registered on this account (found: {})",
                    preferred,
                    meters
                        .iter()
                        .map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
            _ => Ok(meters.first().cloned()),
        }
    }
}

fn fail(stage: Stage, source: OssError) -> FlowError {
    error!(stage = %stage, "Stage failed: {}", source);
    FlowError::at(stage, source)
}
