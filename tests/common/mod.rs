// Shared fixtures for integration tests

use async_trait::async_trait;
use clauserag::commands::{cmd_ingest, upload_file, IndexOutcome, IngestRequest, PipelineContext};
use clauserag::config::Config;
use clauserag::embed::Embedder;
use clauserag::error::{Error, Result};
use clauserag::meta::MetaDb;
use clauserag::storage::{LocalObjectStore, ObjectStore};
use clauserag::store::{
    IndexHandle, IndexItem, IndexMatch, IndexStats, MemoryIndex, VectorFilter, VectorIndex,
};
use clauserag::synth::Synthesizer;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const DIMENSION: usize = 16;

/// Deterministic embedder: character histogram folded into `DIMENSION` buckets
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; DIMENSION];
                for c in text.chars() {
                    v[c as usize % DIMENSION] += 1.0;
                }
                v[0] += 1.0;
                v
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "hash-test"
    }
}

/// Embedder that always fails
#[allow(dead_code)]
pub struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    async fn embed(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Err(Error::EmbeddingUnavailable("connection refused".to_string()))
    }

    fn model_name(&self) -> &str {
        "down"
    }
}

/// Synthesizer returning a fixed reply and recording prompts
pub struct ScriptedSynthesizer {
    reply: Mutex<String>,
    calls: AtomicUsize,
    last_user: Mutex<String>,
}

#[allow(dead_code)]
impl ScriptedSynthesizer {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Mutex::new(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_user: Mutex::new(String::new()),
        }
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_user(&self) -> String {
        self.last_user.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user.lock().unwrap() = user.to_string();
        Ok(self.reply.lock().unwrap().clone())
    }
}

pub const COVERED_REPLY: &str = r#"{"answer":"Yes, water damage is covered.","covered":true,"conditions":["Report within 30 days"],"rationale":"Clause 1"}"#;

/// Memory index whose writes can be switched to fail
pub struct FaultyIndex {
    inner: Arc<MemoryIndex>,
    fail_upsert: AtomicBool,
    fail_delete: AtomicBool,
}

#[allow(dead_code)]
impl FaultyIndex {
    pub fn new(inner: Arc<MemoryIndex>) -> Self {
        Self {
            inner,
            fail_upsert: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_upserts(&self) {
        self.fail_upsert.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }
}

fn vector_service_down() -> Error {
    Error::UpstreamUnavailable("vector service unreachable".to_string())
}

#[async_trait]
impl VectorIndex for FaultyIndex {
    async fn ensure_index(&self, name: &str, dimension: usize) -> Result<IndexHandle> {
        self.inner.ensure_index(name, dimension).await
    }

    async fn open_index(&self, name: &str) -> Result<Option<IndexHandle>> {
        self.inner.open_index(name).await
    }

    async fn upsert(&self, handle: &IndexHandle, namespace: &str, items: Vec<IndexItem>) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(vector_service_down());
        }
        self.inner.upsert(handle, namespace, items).await
    }

    async fn query(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>> {
        self.inner.query(handle, namespace, vector, top_k).await
    }

    async fn delete_by_filter(
        &self,
        handle: &IndexHandle,
        namespace: &str,
        filter: &VectorFilter,
    ) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(vector_service_down());
        }
        self.inner.delete_by_filter(handle, namespace, filter).await
    }

    async fn count(&self, handle: &IndexHandle, namespace: &str, filter: &VectorFilter) -> Result<u64> {
        self.inner.count(handle, namespace, filter).await
    }

    async fn stats(&self, name: &str) -> Result<Option<IndexStats>> {
        self.inner.stats(name).await
    }
}

/// A pipeline wired to in-memory and temp-dir collaborators
pub struct TestPipeline {
    pub ctx: PipelineContext,
    pub index: Arc<MemoryIndex>,
    pub synth: Arc<ScriptedSynthesizer>,
    pub objects: Arc<LocalObjectStore>,
    _tmp: TempDir,
}

#[allow(dead_code)]
impl TestPipeline {
    pub async fn new() -> Self {
        Self::with_embedder(Arc::new(HashEmbedder)).await
    }

    pub async fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.vector.backend = "memory".to_string();

        let db = MetaDb::new(&config.paths.db_file).await.unwrap();
        let index = Arc::new(MemoryIndex::new());
        let synth = Arc::new(ScriptedSynthesizer::new(COVERED_REPLY));
        let objects = Arc::new(LocalObjectStore::new(config.storage_root()));

        let ctx = PipelineContext {
            config: Arc::new(config),
            db,
            embedder,
            index: index.clone() as Arc<dyn VectorIndex>,
            objects: objects.clone() as Arc<dyn ObjectStore>,
            synthesizer: synth.clone() as Arc<dyn Synthesizer>,
        };

        Self {
            ctx,
            index,
            synth,
            objects,
            _tmp: tmp,
        }
    }

    /// Route vector calls through a switchable failing wrapper
    pub fn with_faulty_index(&mut self) -> Arc<FaultyIndex> {
        let faulty = Arc::new(FaultyIndex::new(self.index.clone()));
        self.ctx.index = faulty.clone() as Arc<dyn VectorIndex>;
        faulty
    }

    /// Run a statement against the metadata database from a separate connection
    pub async fn execute_sql(&self, sql: &str) {
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&self.ctx.config.paths.db_file);
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query(sql).execute(&pool).await.unwrap();
        pool.close().await;
    }

    /// Upload `text` as `filename` for `user_id` and index it
    pub async fn ingest_text(&self, user_id: &str, filename: &str, text: &str) -> IndexOutcome {
        let storage_path = upload_file(&self.ctx, user_id, filename, text.as_bytes())
            .await
            .unwrap();
        cmd_ingest(
            &self.ctx,
            user_id,
            IngestRequest {
                storage_path,
                filename: filename.to_string(),
                mime_type: None,
            },
        )
        .await
        .unwrap()
    }

    /// Live vectors for a document in its owner's namespace
    pub async fn vector_count(&self, user_id: &str, document_id: &str) -> u64 {
        let Some(handle) = self
            .index
            .open_index(&self.ctx.config.vector.index_name)
            .await
            .unwrap()
        else {
            return 0;
        };
        self.index
            .count(
                &handle,
                user_id,
                &VectorFilter::document(document_id),
            )
            .await
            .unwrap()
    }
}

/// Words separated by spaces, exactly `len` characters long
#[allow(dead_code)]
pub fn policy_text(len: usize) -> String {
    let base = "The insurer covers sudden water damage to the insured dwelling. ";
    let mut text: String = base.chars().cycle().take(len - 1).collect();
    text.push('x');
    text
}
