//! In-process vector index with brute-force cosine search

use super::{IndexHandle, IndexItem, IndexMatch, IndexStats, VectorFilter, VectorIndex};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryCollection {
    dimension: usize,
    // (namespace, id) -> item
    points: HashMap<(String, String), IndexItem>,
}

/// Vector index held in memory
#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    calls: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn missing(name: &str) -> Error {
    Error::UpstreamUnavailable(format!("Vector index '{}' does not exist", name))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_index(&self, name: &str, dimension: usize) -> Result<IndexHandle> {
        self.record_call();
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| MemoryCollection {
                dimension,
                points: HashMap::new(),
            });

        if collection.dimension != dimension {
            return Err(Error::DimensionMismatch {
                expected: collection.dimension,
                actual: dimension,
            });
        }

        Ok(IndexHandle {
            name: name.to_string(),
            dimension,
        })
    }

    async fn open_index(&self, name: &str) -> Result<Option<IndexHandle>> {
        self.record_call();
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| IndexHandle {
            name: name.to_string(),
            dimension: c.dimension,
        }))
    }

    async fn upsert(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        items: Vec<IndexItem>,
    ) -> Result<()> {
        self.record_call();
        for item in &items {
            handle.check_dimension(&item.vector)?;
        }

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&handle.name)
            .ok_or_else(|| missing(&handle.name))?;

        for item in items {
            collection
                .points
                .insert((namespace.to_string(), item.id.clone()), item);
        }
        Ok(())
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>> {
        self.record_call();
        handle.check_dimension(&vector)?;

        let collections = self.collections.read().await;
        let collection = collections
            .get(&handle.name)
            .ok_or_else(|| missing(&handle.name))?;

        let mut matches: Vec<IndexMatch> = collection
            .points
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, item)| IndexMatch {
                id: item.id.clone(),
                score: cosine_similarity(&vector, &item.vector),
                metadata: item.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_by_filter(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        filter: &VectorFilter,
    ) -> Result<()> {
        self.record_call();
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&handle.name)
            .ok_or_else(|| missing(&handle.name))?;

        collection
            .points
            .retain(|(ns, _), item| !(ns == namespace && filter.matches(&item.metadata)));
        Ok(())
    }

    async fn count(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        filter: &VectorFilter,
    ) -> Result<u64> {
        self.record_call();
        let collections = self.collections.read().await;
        let collection = collections
            .get(&handle.name)
            .ok_or_else(|| missing(&handle.name))?;

        let count = collection
            .points
            .iter()
            .filter(|((ns, _), item)| ns == namespace && filter.matches(&item.metadata))
            .count();
        Ok(count as u64)
    }

    async fn stats(&self, name: &str) -> Result<Option<IndexStats>> {
        self.record_call();
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| IndexStats {
            name: name.to_string(),
            dimension: c.dimension,
            points_count: c.points.len() as u64,
            status: "Green".to_string(),
        }))
    }
}
