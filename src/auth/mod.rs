//! Caller identity from bearer credentials

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolves a bearer token to the id of the user it belongs to
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<String>;
}

/// Create an identity provider based on configuration
pub fn create_identity_provider(config: &AuthConfig) -> Result<Arc<dyn IdentityProvider>> {
    match config.mode.as_str() {
        "static" => Ok(Arc::new(StaticTokenProvider::new(config.tokens.clone()))),
        "http" => {
            let url = config.identity_url.as_deref().ok_or_else(|| {
                Error::Config("auth.identity_url is required for http auth".to_string())
            })?;
            Ok(Arc::new(HttpIdentityProvider::new(url)?))
        }
        other => Err(Error::Config(format!("Unknown auth mode: {}", other))),
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Fixed token table from configuration
pub struct StaticTokenProvider {
    tokens: HashMap<String, String>,
}

impl StaticTokenProvider {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn resolve(&self, token: &str) -> Result<String> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Unknown token".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    id: String,
}

/// Identity endpoint that answers `GET` with `{"id": ...}` for a valid bearer token
pub struct HttpIdentityProvider {
    client: Client,
    url: String,
}

impl HttpIdentityProvider {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Identity endpoint: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized("Token rejected".to_string()));
        }
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "Identity endpoint returned {}",
                status
            )));
        }

        let identity: IdentityResponse = response
            .json()
            .await
            .map_err(|e| Error::Unauthorized(format!("Malformed identity response: {}", e)))?;

        if identity.id.is_empty() {
            return Err(Error::Unauthorized("Empty user id".to_string()));
        }

        debug!(user_id = %identity.id, "Resolved caller identity");
        Ok(identity.id)
    }
}
