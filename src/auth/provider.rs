//! Identity provider contract and its GoTrue-over-HTTP implementation.
//!
//! The provider is the hosted auth backend. It issues and rotates token
//! pairs and is the only party that verifies token signatures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::{
    config::Config,
    models::{Identity, TokenGrant},
};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("identity provider failed ({0})")]
    Unavailable(StatusCode),
    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
}

impl ProviderError {
    /// The provider answered and refused; as opposed to not answering at all.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProviderError::Rejected { .. })
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user owning `access_token`. The provider validates the token.
    async fn get_user(&self, access_token: &str) -> Result<Identity, ProviderError>;

    /// Trade a refresh token for a new token pair. Refresh tokens are single-use.
    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;

    /// Complete a PKCE login.
    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<TokenGrant, ProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;
}

// ── GoTrue ───────────────────────────────────────────────────

pub struct GoTrueProvider {
    http:     Client,
    base_url: String,
    api_key:  String,
}

/// Error bodies come in two shapes depending on the endpoint.
#[derive(Deserialize, Default)]
struct ErrorBody {
    error_description: Option<String>,
    msg:               Option<String>,
    error:             Option<String>,
}

impl GoTrueProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key:  impl Into<String>,
        timeout:  Duration,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key:  api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Self::new(&config.supabase_url, &config.supabase_anon_key, config.provider_timeout)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.api_key)
    }

    fn token_endpoint(&self, grant_type: &str) -> String {
        format!("{}/auth/v1/token?grant_type={grant_type}", self.base_url)
    }

    async fn send(builder: RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // Only a 4xx is the provider saying no; anything else is an outage.
        if !status.is_client_error() {
            return Err(ProviderError::Unavailable(status));
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .error_description
            .or(body.msg)
            .or(body.error)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_owned());
        Err(ProviderError::Rejected { status, message })
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn get_user(&self, access_token: &str) -> Result<Identity, ProviderError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let builder = self
            .request(self.http.get(url))
            .header(AUTHORIZATION, format!("Bearer {access_token}"));
        Ok(Self::send(builder).await?.json().await?)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        let builder = self
            .request(self.http.post(self.token_endpoint("refresh_token")))
            .json(&json!({ "refresh_token": refresh_token }));
        Ok(Self::send(builder).await?.json().await?)
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<TokenGrant, ProviderError> {
        let builder = self
            .request(self.http.post(self.token_endpoint("pkce")))
            .json(&json!({ "auth_code": auth_code, "code_verifier": code_verifier }));
        Ok(Self::send(builder).await?.json().await?)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let builder = self
            .request(self.http.post(url))
            .header(AUTHORIZATION, format!("Bearer {access_token}"));
        Self::send(builder).await?;
        Ok(())
    }
}
