use crate::error::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest<'a> {
    model: &'a str,
    inputs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Embeddings { embeddings: Vec<EmbeddingValue> },
    Vectors { vectors: Vec<Vec<f32>> },
    Data { data: Vec<EmbeddingData> },
}

/// Either a bare vector or a `{"values": [...]}` object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingValue {
    Plain(Vec<f32>),
    Values { values: Vec<f32> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingValue {
    fn into_vec(self) -> Vec<f32> {
        match self {
            EmbeddingValue::Plain(v) => v,
            EmbeddingValue::Values { values } => values,
        }
    }
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Embeddings { embeddings } => {
                embeddings.into_iter().map(EmbeddingValue::into_vec).collect()
            }
            EmbeddingResponse::Vectors { vectors } => vectors,
            EmbeddingResponse::Data { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

/// Thin client for the embedding model endpoint. No retries: a failed call
/// is reported to the caller as-is.
pub struct EmbeddingBackendClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl EmbeddingBackendClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid embedding backend URL: {}", e)))
    }

    pub async fn embed_text(&self, model: &str, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/v1/embed/text")?;
        let request = EmbedTextRequest { model, inputs };

        let mut builder = self.client.post(url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("Malformed response: {}", e)))?;

        Ok(parsed.into_embeddings())
    }
}
