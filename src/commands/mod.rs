//! Pipeline operations shared by the CLI and the HTTP API

pub mod delete;
pub mod documents;
pub mod ingest;
pub mod init;
pub mod query;
pub mod reindex;
pub mod status;

pub use delete::*;
pub use documents::*;
pub use ingest::*;
pub use init::*;
pub use query::*;
pub use reindex::*;
pub use status::*;

use crate::chunk::{chunk_text, TextChunk};
use crate::config::Config;
use crate::embed::{create_embedder, embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::extract::{extract_text, ExtractedText};
use crate::meta::{Document, MetaDb};
use crate::storage::{LocalObjectStore, ObjectStore};
use crate::store::{create_vector_index, IndexHandle, VectorIndex};
use crate::synth::{create_synthesizer, Synthesizer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Everything a pipeline operation talks to
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub db: MetaDb,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub objects: Arc<dyn ObjectStore>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl PipelineContext {
    /// Build every collaborator from configuration
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = MetaDb::new(&config.paths.db_file).await?;
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        let index = create_vector_index(&config.vector)?;
        let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(config.storage_root()));
        let synthesizer = create_synthesizer(&config.synthesis)?;

        Ok(Self {
            config: Arc::new(config),
            db,
            embedder,
            index,
            objects,
            synthesizer,
        })
    }

    /// Take the per-document lease; returns the holder token to release with
    pub(crate) async fn acquire_lease(&self, document_id: &str) -> Result<String> {
        let holder = Uuid::new_v4().to_string();
        let ttl = Duration::from_secs(self.config.lease.ttl_secs);
        self.db.acquire_lease(document_id, &holder, ttl).await?;
        Ok(holder)
    }

    /// Release a lease; failures only delay the next operation until expiry
    pub(crate) async fn release_lease(&self, document_id: &str, holder: &str) {
        if let Err(e) = self.db.release_lease(document_id, holder).await {
            warn!(document_id, error = %e, "Failed to release document lease");
        }
    }

    /// Load a document the caller owns
    pub(crate) async fn owned_document(&self, user_id: &str, document_id: &str) -> Result<Document> {
        let doc = self
            .db
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(document_id.to_string()))?;

        if doc.user_id != user_id {
            return Err(Error::Forbidden(document_id.to_string()));
        }

        Ok(doc)
    }
}

/// Result of ingesting or reindexing a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub document_id: String,
    pub chunk_count: usize,
    pub embedding_model: String,
}

/// Text, chunks and vectors derived from one source file
pub(crate) struct PreparedDocument {
    pub extracted: ExtractedText,
    pub chunks: Vec<TextChunk>,
    pub vectors: Vec<Vec<f32>>,
    pub handle: IndexHandle,
}

/// Extract, chunk, embed and make sure the index exists at the embedding dimension
pub(crate) async fn prepare_document(
    ctx: &PipelineContext,
    bytes: &[u8],
    mime_type: &str,
) -> Result<PreparedDocument> {
    let extracted = extract_text(bytes, mime_type)?;
    let chunks = chunk_text(&extracted.text, &ctx.config.chunk)?;
    debug!(chunk_count = chunks.len(), "Chunked document text");

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = embed_in_batches(
        ctx.embedder.as_ref(),
        texts,
        ctx.config.embedding.batch_size,
    )
    .await?;

    let dimension = vectors
        .first()
        .map(Vec::len)
        .ok_or_else(|| Error::EmbeddingUnavailable("No embeddings returned".to_string()))?;

    let handle = ctx
        .index
        .ensure_index(&ctx.config.vector.index_name, dimension)
        .await?;

    Ok(PreparedDocument {
        extracted,
        chunks,
        vectors,
        handle,
    })
}
