//! Delete command implementation

use super::PipelineContext;
use crate::error::{Error, Result};
use crate::meta::Document;
use crate::store::VectorFilter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of deleting a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub ok: bool,
    pub chunks_deleted: u64,
    pub file_deleted: bool,
}

/// Remove a document's vectors, chunk rows, document row and optionally its file
///
/// Metadata is left untouched when the vectors cannot be removed.
pub async fn cmd_delete(
    ctx: &PipelineContext,
    user_id: &str,
    document_id: &str,
    delete_file: bool,
) -> Result<DeleteOutcome> {
    if document_id.trim().is_empty() {
        return Err(Error::BadRequest("Missing document_id".to_string()));
    }

    let doc = ctx.owned_document(user_id, document_id).await?;
    info!(document_id, user_id, delete_file, "Deleting document");

    let holder = ctx.acquire_lease(document_id).await?;
    let result = delete_document(ctx, &doc, delete_file).await;
    ctx.release_lease(document_id, &holder).await;

    let outcome = result?;
    info!(
        document_id,
        user_id,
        chunks_deleted = outcome.chunks_deleted,
        file_deleted = outcome.file_deleted,
        "Document deleted"
    );
    Ok(outcome)
}

async fn delete_document(ctx: &PipelineContext, doc: &Document, delete_file: bool) -> Result<DeleteOutcome> {
    let index_name = &ctx.config.vector.index_name;
    let handle = ctx
        .index
        .open_index(index_name)
        .await
        .map_err(|e| Error::VectorDeleteFailed(e.to_string()))?;

    // No index means no vectors were ever written
    if let Some(handle) = handle {
        ctx.index
            .delete_by_filter(&handle, &doc.user_id, &VectorFilter::document(&doc.id))
            .await
            .map_err(|e| Error::VectorDeleteFailed(e.to_string()))?;
    }

    let chunks_deleted = ctx.db.delete_chunks(&doc.id).await?;
    ctx.db.delete_document(&doc.id).await?;

    let mut file_deleted = false;
    if delete_file {
        match doc.storage_path.as_deref() {
            Some(path) => match ctx.objects.delete(path).await {
                Ok(()) => file_deleted = true,
                Err(e) => warn!(document_id = %doc.id, error = %e, "Failed to remove stored file"),
            },
            None => warn!(document_id = %doc.id, "No stored file to remove"),
        }
    }

    Ok(DeleteOutcome {
        ok: true,
        chunks_deleted,
        file_deleted,
    })
}

/// Print a delete outcome to console
pub fn print_delete_outcome(document_id: &str, outcome: &DeleteOutcome) {
    println!("✓ Deleted document {}", document_id);
    println!("  Chunks removed: {}", outcome.chunks_deleted);
    if outcome.file_deleted {
        println!("  Stored file removed");
    }
}
