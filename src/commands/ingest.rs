//! Ingest command implementation

use super::{prepare_document, IndexOutcome, PipelineContext, PreparedDocument};
use crate::error::{Error, Result};
use crate::extract::resolve_mime_type;
use crate::meta::{ChunkRow, Document, DocumentStatus};
use crate::store::{IndexItem, VectorMetadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A previously uploaded file to index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub storage_path: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Store a local file under the caller's prefix; returns its storage path
pub async fn upload_file(
    ctx: &PipelineContext,
    user_id: &str,
    filename: &str,
    bytes: &[u8],
) -> Result<String> {
    if filename.trim().is_empty() {
        return Err(Error::BadRequest("Missing filename".to_string()));
    }

    let storage_path = format!("{}/{}/{}", user_id, Uuid::new_v4(), filename);
    ctx.objects.put(&storage_path, bytes).await?;
    debug!(user_id, %storage_path, size = bytes.len(), "Uploaded file");
    Ok(storage_path)
}

/// Storage paths live under `{user_id}/`; anything else belongs to someone else
pub fn owns_storage_path(user_id: &str, storage_path: &str) -> bool {
    let mut segments = storage_path.split('/');
    segments.next() == Some(user_id)
        && !user_id.is_empty()
        && segments.clone().next().is_some()
        && segments.all(|s| !s.is_empty() && s != "." && s != "..")
}

/// Index a newly uploaded document for `user_id`
pub async fn cmd_ingest(
    ctx: &PipelineContext,
    user_id: &str,
    request: IngestRequest,
) -> Result<IndexOutcome> {
    if request.storage_path.trim().is_empty() {
        return Err(Error::BadRequest("Missing storage_path".to_string()));
    }
    if request.filename.trim().is_empty() {
        return Err(Error::BadRequest("Missing filename".to_string()));
    }

    if !owns_storage_path(user_id, &request.storage_path) {
        return Err(Error::Forbidden(request.storage_path));
    }

    info!(user_id, storage_path = %request.storage_path, "Ingesting document");

    let mime_type = resolve_mime_type(request.mime_type.as_deref(), &request.filename);
    let bytes = ctx.objects.get(&request.storage_path).await?;
    let prepared = prepare_document(ctx, &bytes, &mime_type).await?;

    let mut doc = Document::new(user_id, &request.filename);
    doc.mime_type = Some(prepared.extracted.mime_type.clone());
    doc.size_bytes = prepared.extracted.size_bytes as i64;
    doc.storage_path = Some(request.storage_path.clone());
    doc.checksum = Some(prepared.extracted.checksum.clone());
    doc.embedding_model = Some(ctx.embedder.model_name().to_string());
    ctx.db.insert_document(&doc).await?;

    let result: Result<usize> = async {
        let holder = ctx.acquire_lease(&doc.id).await?;
        let stored = store_document(ctx, &doc, prepared).await;
        ctx.release_lease(&doc.id, &holder).await;
        stored
    }
    .await;

    match result {
        Ok(chunk_count) => {
            info!(
                document_id = %doc.id,
                user_id,
                chunk_count,
                "Document indexed"
            );
            Ok(IndexOutcome {
                document_id: doc.id,
                chunk_count,
                embedding_model: ctx.embedder.model_name().to_string(),
            })
        }
        Err(e) => {
            warn!(document_id = %doc.id, error = %e, "Ingestion failed after document was created");
            if let Err(status_err) = ctx
                .db
                .update_document_status(&doc.id, DocumentStatus::Failed)
                .await
            {
                warn!(document_id = %doc.id, error = %status_err, "Failed to mark document as failed");
            }
            Err(e)
        }
    }
}

/// Upsert one vector per chunk and write the chunk rows
async fn store_document(
    ctx: &PipelineContext,
    doc: &Document,
    prepared: PreparedDocument,
) -> Result<usize> {
    let (items, rows) = build_chunk_records(doc, &prepared);
    let chunk_count = rows.len();

    ctx.index.upsert(&prepared.handle, &doc.user_id, items).await?;
    ctx.db.insert_chunks(&rows).await?;
    ctx.db
        .update_document_status(&doc.id, DocumentStatus::Indexed)
        .await?;

    Ok(chunk_count)
}

/// Index items and chunk rows for a prepared document
pub(crate) fn build_chunk_records(
    doc: &Document,
    prepared: &PreparedDocument,
) -> (Vec<IndexItem>, Vec<ChunkRow>) {
    prepared
        .chunks
        .iter()
        .zip(&prepared.vectors)
        .map(|(chunk, vector)| {
            let row = ChunkRow::new(
                &doc.id,
                &doc.user_id,
                chunk.index,
                chunk.content.clone(),
                chunk.tokens(),
                &doc.filename,
            );
            let item = IndexItem {
                id: row.vector_id.clone(),
                vector: vector.clone(),
                metadata: VectorMetadata::for_chunk(
                    &doc.user_id,
                    &doc.id,
                    &doc.filename,
                    chunk.index,
                ),
            };
            (item, row)
        })
        .unzip()
}

/// Print an ingest or reindex outcome to console
pub fn print_index_outcome(action: &str, outcome: &IndexOutcome) {
    println!("✓ {} document {}", action, outcome.document_id);
    println!("  Chunks: {}", outcome.chunk_count);
    println!("  Embedding model: {}", outcome.embedding_model);
}
