//! Reindex command implementation

use super::ingest::build_chunk_records;
use super::{prepare_document, IndexOutcome, PipelineContext};
use crate::error::{Error, Result};
use crate::extract::resolve_mime_type;
use crate::meta::{Document, DocumentStatus};
use crate::store::VectorFilter;
use tracing::{info, warn};

/// Re-derive and replace every chunk and vector of an existing document
///
/// Old vectors are deleted before the new set is upserted, so the document
/// is briefly unsearchable but never holds stale duplicates.
pub async fn cmd_reindex(
    ctx: &PipelineContext,
    user_id: &str,
    document_id: &str,
) -> Result<IndexOutcome> {
    if document_id.trim().is_empty() {
        return Err(Error::BadRequest("Missing document_id".to_string()));
    }

    let doc = ctx.owned_document(user_id, document_id).await?;
    let storage_path = doc
        .storage_path
        .clone()
        .ok_or_else(|| Error::MissingSource(document_id.to_string()))?;

    info!(document_id, user_id, "Reindexing document");

    let holder = ctx.acquire_lease(document_id).await?;
    let result = reindex_document(ctx, &doc, &storage_path).await;
    ctx.release_lease(document_id, &holder).await;

    let chunk_count = result?;
    info!(document_id, user_id, chunk_count, "Document reindexed");

    Ok(IndexOutcome {
        document_id: doc.id,
        chunk_count,
        embedding_model: ctx.embedder.model_name().to_string(),
    })
}

async fn reindex_document(ctx: &PipelineContext, doc: &Document, storage_path: &str) -> Result<usize> {
    let mime_type = resolve_mime_type(doc.mime_type.as_deref(), &doc.filename);
    let bytes = ctx.objects.get(storage_path).await?;
    let prepared = prepare_document(ctx, &bytes, &mime_type).await?;

    ctx.index
        .delete_by_filter(&prepared.handle, &doc.user_id, &VectorFilter::document(&doc.id))
        .await?;

    // From here on the old vectors are gone; a failure leaves the document unsearchable
    let swap = async {
        let (items, rows) = build_chunk_records(doc, &prepared);
        ctx.index.upsert(&prepared.handle, &doc.user_id, items).await?;
        ctx.db.replace_chunks(&doc.id, &rows).await?;
        ctx.db
            .update_document_index(
                &doc.id,
                ctx.embedder.model_name(),
                prepared.extracted.size_bytes as i64,
                &prepared.extracted.checksum,
            )
            .await?;
        Ok::<usize, Error>(rows.len())
    };

    match swap.await {
        Ok(count) => Ok(count),
        Err(e) => {
            warn!(document_id = %doc.id, error = %e, "Reindex failed after old vectors were removed");
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
