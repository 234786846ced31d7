//! HTTP request handlers

use crate::api::state::{AppState, Caller};
use crate::commands::{
    cmd_delete, cmd_ingest, cmd_list_documents, cmd_query, cmd_reindex, cmd_verify_document,
    DeleteOutcome, IndexOutcome, IngestRequest, VerifyReport,
};
use crate::error::{Error, Result};
use crate::meta::DocumentSummary;
use crate::synth::Answer;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReindexRequest {
    #[serde(default)]
    pub document_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub delete_file: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| Error::BadRequest(e.body_text()))
}

/// Server status and version
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    payload: std::result::Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IndexOutcome>> {
    let request = body(payload)?;
    let outcome = cmd_ingest(&state.pipeline, &user_id, request).await?;
    Ok(Json(outcome))
}

pub async fn reindex_handler(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    payload: std::result::Result<Json<ReindexRequest>, JsonRejection>,
) -> Result<Json<IndexOutcome>> {
    let request = body(payload)?;
    let outcome = cmd_reindex(&state.pipeline, &user_id, &request.document_id).await?;
    Ok(Json(outcome))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    payload: std::result::Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<DeleteOutcome>> {
    let request = body(payload)?;
    let outcome = cmd_delete(
        &state.pipeline,
        &user_id,
        &request.document_id,
        request.delete_file,
    )
    .await?;
    Ok(Json(outcome))
}

/// Answer object only; fallback answers are returned with 200 like structured ones
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Answer>> {
    let request = body(payload)?;
    let result = cmd_query(&state.pipeline, &user_id, &request.query).await?;
    Ok(Json(result.synthesis.into_answer()))
}

pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
) -> Result<Json<Vec<DocumentSummary>>> {
    let documents = cmd_list_documents(&state.pipeline, &user_id).await?;
    Ok(Json(documents))
}

pub async fn verify_document_handler(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(document_id): Path<String>,
) -> Result<Json<VerifyReport>> {
    let report = cmd_verify_document(&state.pipeline, &user_id, &document_id).await?;
    Ok(Json(report))
}
