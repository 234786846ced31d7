//! Custom error types for clauserag

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for clauserag operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document missing storage_path: {0}")]
    MissingSource(String),

    #[error("Document is busy: {0}")]
    Conflict(String),

    #[error("Could not extract text from file. Ensure it is text-based.")]
    EmptyDocumentText,

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Vector delete failed: {0}")]
    VectorDeleteFailed(String),

    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector index '{0}' was not ready in time")]
    IndexProvisioningTimeout(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Convert qdrant errors
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::Qdrant(err.to_string())
    }
}

/// Result type alias for clauserag
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_)
            | Error::MissingSource(_)
            | Error::EmptyDocumentText
            | Error::Storage(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::EmbeddingUnavailable(_)
            | Error::UpstreamUnavailable(_)
            | Error::Qdrant(_)
            | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::IndexProvisioningTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::VectorDeleteFailed(_)
            | Error::DimensionMismatch { .. }
            | Error::Config(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::UrlParse(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable tag used in logs and JSON bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::MissingSource(_) => "missing_source",
            Error::Conflict(_) => "conflict",
            Error::EmptyDocumentText => "empty_document_text",
            Error::EmbeddingUnavailable(_) => "embedding_unavailable",
            Error::UpstreamUnavailable(_) | Error::Qdrant(_) | Error::Http(_) => {
                "upstream_unavailable"
            }
            Error::VectorDeleteFailed(_) => "vector_delete_failed",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::IndexProvisioningTimeout(_) => "index_provisioning_timeout",
            Error::Storage(_) => "storage",
            _ => "server",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
