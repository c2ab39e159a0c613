use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::constants;
use crate::error::{OssError, Result};
use crate::models::{AuthChallenge, SessionCredential};
use crate::services::vendor_client::{is_transient_status, VendorClient};

#[derive(Debug, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
struct StartAuthenticationRequest {
    #[validate(email)]
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartAuthenticationResponse {
    challenge_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteAuthenticationRequest<'a> {
    challenge_id: &'a str,
    secret: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteAuthenticationResponse {
    access_token: String,
}

/// Two-step email challenge against the vendor's auth endpoint.
///
/// Neither step is retried here: a repeated start may invalidate the
/// previous challenge on the vendor side.
#[derive(Clone, Debug)]
pub struct CredentialNegotiator {
    vendor: VendorClient,
}

impl CredentialNegotiator {
    pub fn new(vendor: VendorClient) -> Self {
        Self { vendor }
    }

    /// Ask the vendor to email a secret to `account_email`
    #[instrument(skip(self))]
    pub async fn start_authentication(&self, account_email: &str) -> Result<AuthChallenge> {
        let request = StartAuthenticationRequest {
            email: account_email.trim().to_string(),
        };
        if request.validate().is_err() {
            return Err(OssError::InvalidAccount(format!(
                "{} is not a valid email address",
                request.email
            )));
        }

        let url = self.vendor.endpoint(&constants::api::AUTH_START)?;
        let response = self
            .vendor
            .send(self.vendor.post(url).json(&request))
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if status.is_success() {
            let body: StartAuthenticationResponse =
                VendorClient::decode(response).await.map_err(unavailable)?;
            if body.challenge_id.trim().is_empty() {
                return Err(OssError::UnexpectedResponse(
                    "Authentication start returned an empty challenge id".to_string(),
                ));
            }

            info!(challenge = %body.challenge_id, "Authentication challenge issued, secret sent by email");
            return Ok(AuthChallenge::new(body.challenge_id, request.email));
        }

        let detail = VendorClient::describe_failure(response).await;
        match status {
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                warn!(status = %status, "Account rejected by authentication start");
                Err(OssError::InvalidAccount(detail))
            }
            s if is_transient_status(s) => Err(OssError::AuthUnavailable(detail)),
            _ => Err(OssError::UnexpectedResponse(detail)),
        }
    }

    /// Exchange the challenge and the emailed secret for a session credential
    #[instrument(skip(self, challenge, secret), fields(challenge = %challenge.id()))]
    pub async fn complete_authentication(
        &self,
        challenge: &AuthChallenge,
        secret: &SecretString,
    ) -> Result<SessionCredential> {
        let secret = secret.expose_secret().trim();
        if secret.is_empty() {
            return Err(OssError::SecretMismatch);
        }

        let url = self.vendor.endpoint(&constants::api::AUTH_COMPLETE)?;
        let body = CompleteAuthenticationRequest {
            challenge_id: challenge.id(),
            secret,
        };
        let response = self
            .vendor
            .send(self.vendor.post(url).json(&body))
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if status.is_success() {
            let body: CompleteAuthenticationResponse =
                VendorClient::decode(response).await.map_err(unavailable)?;
            if body.access_token.trim().is_empty() {
                return Err(OssError::UnexpectedResponse(
                    "Authentication complete returned an empty access token".to_string(),
                ));
            }

            info!("Authentication completed, session credential issued");
            return Ok(SessionCredential::new(body.access_token));
        }

        let detail = VendorClient::describe_failure(response).await;
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(status = %status, "Emailed secret rejected");
                Err(OssError::SecretMismatch)
            }
            StatusCode::NOT_FOUND | StatusCode::REQUEST_TIMEOUT | StatusCode::GONE => {
                warn!(status = %status, "Authentication challenge no longer valid");
                Err(OssError::ChallengeExpired)
            }
            s if is_transient_status(s) => Err(OssError::AuthUnavailable(detail)),
            _ => Err(OssError::UnexpectedResponse(detail)),
        }
    }
}

/// Transport failures during authentication mean the endpoint is unavailable
fn unavailable(err: OssError) -> OssError {
    match err {
        OssError::Transport(msg) => OssError::AuthUnavailable(msg),
        other => other,
    }
}
