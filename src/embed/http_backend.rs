use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::embedding_backend::EmbeddingBackendClient;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

pub struct HttpEmbedder {
    client: EmbeddingBackendClient,
    model_id: String,
    dimension: Option<usize>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = EmbeddingBackendClient::new(
            &config.backend_url,
            config.api_key(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            client,
            model_id: config.model.clone(),
            dimension: config.dimension,
        })
    }

    fn validate_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        let Some(expected) = self.dimension else {
            return Ok(());
        };
        if let Some(mismatch) = embeddings.iter().find(|vec| vec.len() != expected) {
            return Err(Error::DimensionMismatch {
                expected,
                actual: mismatch.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.client.embed_text(&self.model_id, texts).await?;
        self.validate_dimensions(&embeddings)?;
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
