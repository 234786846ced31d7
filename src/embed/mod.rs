//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - HTTP embedding backend
//! - All-or-nothing batch processing

mod http_backend;

pub use http_backend::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the model name recorded on indexed documents
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let embedder = HttpEmbedder::new(config)?;
    Ok(Box::new(embedder))
}

/// Embed every text, splitting into requests of `batch_size`
///
/// Any failed batch, missing vector, empty vector or ragged dimension fails
/// the whole call, so callers never see a partially embedded document.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let expected = texts.len();
    let mut all_embeddings = Vec::with_capacity(expected);

    for chunk in texts.chunks(batch_size.max(1)) {
        let batch_texts: Vec<String> = chunk.to_vec();
        let batch_len = batch_texts.len();
        let embeddings = embedder.embed(batch_texts).await?;
        if embeddings.len() != batch_len {
            return Err(Error::EmbeddingUnavailable(format!(
                "Model '{}' returned {} vectors for {} inputs",
                embedder.model_name(),
                embeddings.len(),
                batch_len
            )));
        }
        all_embeddings.extend(embeddings);
    }

    check_uniform_dimension(&all_embeddings)?;
    Ok(all_embeddings)
}

/// Embed a single text (a query)
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embed_in_batches(embedder, vec![text.to_string()], 1)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::EmbeddingUnavailable("No embedding returned".to_string()))
}

fn check_uniform_dimension(embeddings: &[Vec<f32>]) -> Result<()> {
    let Some(first) = embeddings.first() else {
        return Ok(());
    };

    if first.is_empty() {
        return Err(Error::EmbeddingUnavailable(
            "Model returned an empty vector".to_string(),
        ));
    }

    if let Some(odd) = embeddings.iter().find(|v| v.len() != first.len()) {
        return Err(Error::EmbeddingUnavailable(format!(
            "Model returned vectors of mixed dimension ({} and {})",
            first.len(),
            odd.len()
        )));
    }

    Ok(())
}
