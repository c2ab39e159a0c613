use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::constants;
use crate::error::{OssError, Result};
use crate::models::{ApiToken, SessionCredential, TokenRequest};
use crate::services::vendor_client::VendorClient;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenRequest<'a> {
    label: &'a str,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenResponse {
    token: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// Creates long-lived API tokens from an authenticated session
#[derive(Clone, Debug)]
pub struct TokenProvisioner {
    vendor: VendorClient,
}

impl TokenProvisioner {
    pub fn new(vendor: VendorClient) -> Self {
        Self { vendor }
    }

    /// Validate `label`/`expires_at`, then create the token.
    ///
    /// Validation happens before any request is sent.
    pub async fn create_token(
        &self,
        session: SessionCredential,
        label: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ApiToken> {
        let request = TokenRequest::new(label, expires_at)?;
        self.create_token_with(session, &request).await
    }

    /// Create a token from an already validated request.
    ///
    /// The session credential is consumed: it is never used again after the
    /// exchange, whatever the outcome.
    #[instrument(skip(self, session, request), fields(label = %request.label()))]
    pub async fn create_token_with(
        &self,
        session: SessionCredential,
        request: &TokenRequest,
    ) -> Result<ApiToken> {
        request.ensure_future()?;

        let url = self.vendor.endpoint(&constants::api::TOKENS)?;
        let body = CreateTokenRequest {
            label: request.label(),
            expires_at: request.expires_at(),
        };
        let response = self
            .vendor
            .send(
                self.vendor
                    .post(url)
                    .bearer_auth(session.expose_secret())
                    .json(&body),
            )
            .await
            .map_err(session_spent)?;
        drop(session);

        let status = response.status();
        if status.is_success() {
            let body: CreateTokenResponse = VendorClient::decode(response).await.map_err(|e| {
                error!("Token was created but the response could not be read: {}", e);
                session_spent(e)
            })?;
            if body.token.trim().is_empty() {
                return Err(OssError::UnexpectedResponse(
                    "Token creation returned an empty token".to_string(),
                ));
            }

            let token = ApiToken::new(
                body.token,
                body.label.unwrap_or_else(|| request.label().to_string()),
                body.expires_at.unwrap_or_else(|| request.expires_at()),
            );
            info!(
                expires_at = %token.expires_at().to_rfc3339(),
                "API token created, persist it now: it cannot be retrieved again"
            );
            return Ok(token);
        }

        let detail = VendorClient::describe_failure(response).await;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(status = %status, "Session credential rejected");
                Err(OssError::Unauthorized(detail))
            }
            StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS => {
                warn!(status = %status, "Token quota reached");
                Err(OssError::QuotaExceeded(detail))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(OssError::Validation(format!("Token request rejected: {}", detail)))
            }
            _ => Err(OssError::UnexpectedResponse(detail)),
        }
    }
}

/// A transport failure after the session was sent leaves it unusable
fn session_spent(err: OssError) -> OssError {
    match err {
        OssError::Transport(msg) => OssError::Unauthorized(format!(
            "token request did not complete, session may be spent: {}",
            msg
        )),
        other => other,
    }
}
