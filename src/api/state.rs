//! Shared state and caller identity for the HTTP API

use crate::auth::{bearer_token, IdentityProvider};
use crate::commands::PipelineContext;
use crate::error::Error;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

/// Shared application state for axum handlers
#[derive(Clone)]
pub struct AppState {
    /// Collaborators for every pipeline operation
    pub pipeline: PipelineContext,

    /// Resolves bearer tokens to user ids
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(pipeline: PipelineContext, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { pipeline, identity }
    }
}

/// Authenticated caller, resolved from `Authorization: Bearer <token>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("Missing bearer token".to_string()))?;

        let token = bearer_token(header)
            .ok_or_else(|| Error::Unauthorized("Malformed authorization header".to_string()))?;

        let user_id = state.identity.resolve(token).await?;
        Ok(Caller(user_id))
    }
}
