// Outbound HTTP client for the separate auth collaborator. Token
// issuance/guest creation stays out of scope; this adapter only verifies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::errors::AuthError;
use crate::domain::ports::{AuthVerifier, VerifiedIdentity};

#[derive(Debug, Serialize)]
struct VerifyTokenRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyTokenResponse {
    player_id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl AuthVerifier for AuthClient {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let url = format!("{}/auth/verify-token", self.base_url);
        let response = self
            .http
            .post(url)
            .json(&VerifyTokenRequest { token })
            .send()
            .await
            .map_err(|_| AuthError::UpstreamUnavailable)?;

        if response.status().is_success() {
            let body = response
                .json::<VerifyTokenResponse>()
                .await
                .map_err(|_| AuthError::UpstreamUnavailable)?;
            return Ok(VerifiedIdentity {
                player_id: body.player_id,
                username: body.username,
            });
        }

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response
                .json::<ErrorBody>()
                .await
                .map_err(|_| AuthError::UpstreamUnavailable)?;
            if body.message == "session expired" {
                return Err(AuthError::SessionExpired);
            }
            return Err(AuthError::InvalidToken);
        }

        Err(AuthError::UpstreamUnavailable)
    }
}
