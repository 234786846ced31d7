//! Document listing and consistency checks

use super::PipelineContext;
use crate::error::Result;
use crate::meta::DocumentSummary;
use crate::store::VectorFilter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// List the caller's documents, newest first
pub async fn cmd_list_documents(ctx: &PipelineContext, user_id: &str) -> Result<Vec<DocumentSummary>> {
    info!(user_id, "Listing documents");
    ctx.db.list_documents(user_id).await
}

/// Chunk rows versus live vectors for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub document_id: String,
    pub status: String,
    pub chunk_rows: u64,
    pub vectors: u64,
    /// Chunk indices are exactly `0..chunk_rows`
    pub dense_indices: bool,
    pub consistent: bool,
}

/// Compare a document's chunk rows with the vectors in its owner's namespace
pub async fn cmd_verify_document(
    ctx: &PipelineContext,
    user_id: &str,
    document_id: &str,
) -> Result<VerifyReport> {
    let doc = ctx.owned_document(user_id, document_id).await?;
    let chunks = ctx.db.get_chunks(&doc.id).await?;

    let vectors = match ctx.index.open_index(&ctx.config.vector.index_name).await? {
        Some(handle) => {
            ctx.index
                .count(&handle, &doc.user_id, &VectorFilter::document(&doc.id))
                .await?
        }
        None => 0,
    };

    let chunk_rows = chunks.len() as u64;
    let dense_indices = chunks
        .iter()
        .enumerate()
        .all(|(i, c)| c.chunk_index == i as i64);
    let consistent = dense_indices && chunk_rows == vectors;

    if !consistent {
        warn!(
            document_id,
            chunk_rows, vectors, dense_indices, "Document index is inconsistent"
        );
    }

    Ok(VerifyReport {
        document_id: doc.id,
        status: doc.status,
        chunk_rows,
        vectors,
        dense_indices,
        consistent,
    })
}

/// Print a document list to console
pub fn print_documents(documents: &[DocumentSummary]) {
    println!("\n📄 Documents\n");

    if documents.is_empty() {
        println!("No documents. Use 'clauserag ingest' to add one.");
        return;
    }

    for summary in documents {
        let doc = &summary.document;
        println!("• {} [{}]", doc.filename, doc.status);
        println!("  ID: {}", doc.id);
        println!(
            "  Chunks: {}  Size: {} bytes  Model: {}",
            summary.chunk_count,
            doc.size_bytes,
            doc.embedding_model.as_deref().unwrap_or("-")
        );
        println!("  Created: {}", doc.created_at);
    }
}

/// Print a verification report to console
pub fn print_verify_report(report: &VerifyReport) {
    let mark = if report.consistent { "✓" } else { "✗" };
    println!("{} Document {} [{}]", mark, report.document_id, report.status);
    println!("  Chunk rows: {}", report.chunk_rows);
    println!("  Vectors: {}", report.vectors);
    if !report.dense_indices {
        println!("  Chunk indices have gaps; run 'clauserag reindex {}'", report.document_id);
    } else if !report.consistent {
        println!("  Counts differ; run 'clauserag reindex {}'", report.document_id);
    }
}
