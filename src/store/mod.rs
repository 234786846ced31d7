//! Vector index gateway
//!
//! This module wraps the vector service and provides:
//! - Index provisioning with bounded readiness polling
//! - Namespaced upsert / similarity query / delete-by-filter
//! - An in-memory index for local runs and tests

mod memory;
mod payload;

pub use memory::*;
pub use payload::*;

use crate::config::VectorConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    CollectionStatus, Condition, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance, FieldType, Filter,
    GetCollectionInfoResponse, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A ready index and the dimension it was created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    pub name: String,
    pub dimension: usize,
}

impl IndexHandle {
    /// Reject a vector whose length differs from the index dimension
    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Point counts for an index
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub name: String,
    pub dimension: usize,
    pub points_count: u64,
    pub status: String,
}

/// Operations the pipeline needs from a vector service
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the index if absent and wait until it is ready
    async fn ensure_index(&self, name: &str, dimension: usize) -> Result<IndexHandle>;

    /// Handle for an existing index, `None` if it was never created
    async fn open_index(&self, name: &str) -> Result<Option<IndexHandle>>;

    /// Insert or overwrite items by id within a namespace
    async fn upsert(&self, handle: &IndexHandle, namespace: &str, items: Vec<IndexItem>)
        -> Result<()>;

    /// Up to `top_k` nearest items in a namespace, best first
    async fn query(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>>;

    /// Remove every item in a namespace matching the filter
    async fn delete_by_filter(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        filter: &VectorFilter,
    ) -> Result<()>;

    /// Number of items in a namespace matching the filter
    async fn count(&self, handle: &IndexHandle, namespace: &str, filter: &VectorFilter)
        -> Result<u64>;

    /// Index statistics, `None` if the index does not exist
    async fn stats(&self, name: &str) -> Result<Option<IndexStats>>;
}

/// Create a vector index based on configuration
pub fn create_vector_index(config: &VectorConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        "qdrant" => Ok(Arc::new(QdrantStore::new(config)?)),
        other => Err(Error::Config(format!("Unknown vector backend: {}", other))),
    }
}

/// Point id derived from the vector id, stable across reindexing
pub fn point_uuid(vector_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, vector_id.as_bytes())
}

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    provision_attempts: u32,
    provision_interval: Duration,
}

impl QdrantStore {
    /// Connect to Qdrant using config
    pub fn new(config: &VectorConfig) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", config.url);

        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key())
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            provision_attempts: config.provision_attempts,
            provision_interval: Duration::from_millis(config.provision_interval_ms),
        })
    }

    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>> {
        let info = self.client.collection_info(name).await?;
        Ok(extract_vector_size(&info))
    }

    async fn wait_until_ready(&self, name: &str) -> Result<()> {
        for attempt in 1..=self.provision_attempts {
            let info = self.client.collection_info(name).await?;
            let status = info.result.map(|r| r.status());
            if status == Some(CollectionStatus::Green) {
                debug!(index = name, attempt, "Index ready");
                return Ok(());
            }

            debug!(index = name, attempt, ?status, "Index not ready yet");
            tokio::time::sleep(self.provision_interval).await;
        }

        Err(Error::IndexProvisioningTimeout(name.to_string()))
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn ensure_index(&self, name: &str, dimension: usize) -> Result<IndexHandle> {
        if let Some(handle) = self.open_index(name).await? {
            if handle.dimension != dimension {
                return Err(Error::DimensionMismatch {
                    expected: handle.dimension,
                    actual: dimension,
                });
            }
            return Ok(handle);
        }

        info!(index = name, dimension, "Creating vector index");

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await?;

        for field in [NAMESPACE_KEY, VectorMetadata::DOCUMENT_ID] {
            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(name, field, FieldType::Keyword)
                        .wait(true),
                )
                .await?;
        }

        self.wait_until_ready(name).await?;
        info!(index = name, "Vector index created");

        Ok(IndexHandle {
            name: name.to_string(),
            dimension,
        })
    }

    async fn open_index(&self, name: &str) -> Result<Option<IndexHandle>> {
        if !self.client.collection_exists(name).await? {
            return Ok(None);
        }

        let dimension = self.collection_dimension(name).await?.ok_or_else(|| {
            Error::Qdrant(format!(
                "Collection '{}' uses named vectors, which are not supported",
                name
            ))
        })?;

        Ok(Some(IndexHandle {
            name: name.to_string(),
            dimension,
        }))
    }

    async fn upsert(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        items: Vec<IndexItem>,
    ) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        for item in &items {
            handle.check_dimension(&item.vector)?;
        }

        debug!(
            index = %handle.name,
            namespace,
            count = items.len(),
            "Upserting vectors"
        );

        let points: Vec<PointStruct> = items
            .into_iter()
            .map(|item| {
                let payload = item.metadata.to_qdrant_payload(namespace, &item.id);
                PointStruct::new(point_uuid(&item.id).to_string(), item.vector, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&handle.name, points).wait(true))
            .await?;

        Ok(())
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>> {
        handle.check_dimension(&vector)?;

        let request = SearchPointsBuilder::new(&handle.name, vector, top_k as u64)
            .filter(namespace_filter(namespace, &VectorFilter::default()))
            .with_payload(true);

        let response = self.client.search_points(request).await?;

        let matches = response
            .result
            .into_iter()
            .map(|p| {
                let mut payload: Map<String, Value> = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect();
                payload.remove(NAMESPACE_KEY);
                let id = match payload.remove(VECTOR_ID_KEY) {
                    Some(Value::String(id)) => id,
                    _ => String::new(),
                };

                IndexMatch {
                    id,
                    score: p.score,
                    metadata: VectorMetadata::from(payload),
                }
            })
            .collect();

        Ok(matches)
    }

    async fn delete_by_filter(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        filter: &VectorFilter,
    ) -> Result<()> {
        debug!(index = %handle.name, namespace, ?filter, "Deleting vectors by filter");

        self.client
            .delete_points(
                DeletePointsBuilder::new(&handle.name)
                    .points(namespace_filter(namespace, filter))
                    .wait(true),
            )
            .await?;

        Ok(())
    }

    async fn count(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        filter: &VectorFilter,
    ) -> Result<u64> {
        let response = self
            .client
            .count(
                CountPointsBuilder::new(&handle.name)
                    .filter(namespace_filter(namespace, filter))
                    .exact(true),
            )
            .await?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn stats(&self, name: &str) -> Result<Option<IndexStats>> {
        if !self.client.collection_exists(name).await? {
            return Ok(None);
        }

        let info = self.client.collection_info(name).await?;
        let dimension = extract_vector_size(&info).unwrap_or(0);
        let Some(result) = info.result else {
            warn!(index = name, "Collection info returned no result");
            return Ok(None);
        };

        Ok(Some(IndexStats {
            name: name.to_string(),
            dimension,
            points_count: result.points_count.unwrap_or(0),
            status: format!("{:?}", result.status()),
        }))
    }
}

/// Namespace condition plus every filter condition
fn namespace_filter(namespace: &str, filter: &VectorFilter) -> Filter {
    let mut conditions = vec![Condition::matches(NAMESPACE_KEY, namespace.to_string())];
    conditions.extend(
        filter
            .conditions()
            .iter()
            .map(|(key, value)| Condition::matches(key.as_str(), value.clone())),
    );
    Filter::must(conditions)
}

fn extract_vector_size(info: &GetCollectionInfoResponse) -> Option<usize> {
    let result = info.result.as_ref()?;
    let config = result.config.as_ref()?;
    let params = config.params.as_ref()?;
    let vectors_config = params.vectors_config.as_ref()?;

    match vectors_config.config.as_ref()? {
        qdrant_client::qdrant::vectors_config::Config::Params(params) => {
            Some(params.size as usize)
        }
        qdrant_client::qdrant::vectors_config::Config::ParamsMap(_) => None,
    }
}
