//! Metadata storage using SQLite
//!
//! This module handles all relational state for the pipeline:
//! - Documents (uploaded files and their index status)
//! - Document chunks (clause text keyed by vector id)
//! - Query logs (append-only audit trail)
//! - Document leases (per-document advisory locks)

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Indexed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Indexed => write!(f, "indexed"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DocumentStatus::Pending),
            "indexed" => Ok(DocumentStatus::Indexed),
            "failed" => Ok(DocumentStatus::Failed),
            _ => Err(Error::Other(format!("Unknown document status: {}", s))),
        }
    }
}

/// An uploaded document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub storage_path: Option<String>,
    pub checksum: Option<String>,
    pub embedding_model: Option<String>,
    pub status: String,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn new(user_id: &str, filename: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            filename: filename.to_string(),
            mime_type: None,
            size_bytes: 0,
            storage_path: None,
            checksum: None,
            embedding_model: None,
            status: DocumentStatus::Pending.to_string(),
            source: "upload".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn get_status(&self) -> Result<DocumentStatus> {
        self.status.parse()
    }
}

/// A stored chunk of document text
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub tokens: i64,
    pub vector_id: String,
    pub metadata_json: Option<String>,
    pub created_at: String,
}

impl ChunkRow {
    pub fn new(
        document_id: &str,
        user_id: &str,
        chunk_index: usize,
        content: String,
        tokens: usize,
        filename: &str,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("filename".to_string(), Value::from(filename));

        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            chunk_index: chunk_index as i64,
            content,
            tokens: tokens as i64,
            vector_id: crate::chunk::vector_id(document_id, chunk_index),
            metadata_json: Some(Value::Object(metadata).to_string()),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Denormalized display metadata
    pub fn metadata(&self) -> Map<String, Value> {
        self.metadata_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default()
    }

    pub fn filename(&self) -> Option<String> {
        self.metadata()
            .get("filename")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// A query audit record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueryLog {
    pub id: String,
    pub user_id: String,
    pub query_text: String,
    pub answer_json: String,
    pub matched_clauses_json: String,
    pub match_count: i64,
    pub duration_ms: i64,
    pub created_at: String,
}

impl QueryLog {
    pub fn new<A: Serialize, M: Serialize>(
        user_id: &str,
        query_text: &str,
        answer: &A,
        matched_clauses: &M,
        match_count: usize,
        duration_ms: u64,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            query_text: query_text.to_string(),
            answer_json: serde_json::to_string(answer)?,
            matched_clauses_json: serde_json::to_string(matched_clauses)?,
            match_count: match_count as i64,
            duration_ms: duration_ms as i64,
            created_at: Utc::now().to_rfc3339(),
        })
    }
}

/// A document with its chunk count
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DocumentSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub document: Document,
    pub chunk_count: i64,
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the metadata database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Connect and create the schema if it is missing
    pub async fn new(db_path: &Path) -> Result<Self> {
        let db = Self::open(db_path).await?;

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    async fn open(db_path: &Path) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='documents'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Document Operations =====

    /// Insert a new document
    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, user_id, filename, mime_type, size_bytes, storage_path, checksum, embedding_model, status, source, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.user_id)
        .bind(&doc.filename)
        .bind(&doc.mime_type)
        .bind(doc.size_bytes)
        .bind(&doc.storage_path)
        .bind(&doc.checksum)
        .bind(&doc.embedding_model)
        .bind(&doc.status)
        .bind(&doc.source)
        .bind(&doc.created_at)
        .bind(&doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get document by ID
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// List a user's documents with chunk counts, newest first
    pub async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentSummary>> {
        let docs = sqlx::query_as::<_, DocumentSummary>(
            r#"
            SELECT d.*, (SELECT COUNT(*) FROM document_chunks c WHERE c.document_id = d.id) AS chunk_count
            FROM documents d
            WHERE d.user_id = ?
            ORDER BY d.created_at DESC, d.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    /// Set a document's lifecycle status
    pub async fn update_document_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the outcome of a reindex
    pub async fn update_document_index(
        &self,
        id: &str,
        embedding_model: &str,
        size_bytes: i64,
        checksum: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents SET
                embedding_model = ?,
                size_bytes = ?,
                checksum = ?,
                status = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(embedding_model)
        .bind(size_bytes)
        .bind(checksum)
        .bind(DocumentStatus::Indexed.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a document row (chunks must be removed first)
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Chunk Operations =====

    /// Insert chunk rows in one transaction
    pub async fn insert_chunks(&self, chunks: &[ChunkRow]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            insert_chunk(&mut tx, chunk).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Replace every chunk row of a document in one transaction
    pub async fn replace_chunks(&self, document_id: &str, chunks: &[ChunkRow]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        for chunk in chunks {
            insert_chunk(&mut tx, chunk).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Delete every chunk row of a document
    pub async fn delete_chunks(&self, document_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Get chunks for a document
    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRow>> {
        let chunks = sqlx::query_as::<_, ChunkRow>(
            "SELECT * FROM document_chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Count chunk rows for a document
    pub async fn count_chunks(&self, document_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE document_id = ?")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Resolve vector ids to a user's chunk rows; unknown ids are skipped
    pub async fn get_chunks_by_vector_ids(
        &self,
        user_id: &str,
        vector_ids: &[String],
    ) -> Result<Vec<ChunkRow>> {
        if vector_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vector_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT * FROM document_chunks WHERE user_id = ? AND vector_id IN ({})",
            placeholders
        );

        let mut query_builder = sqlx::query_as::<_, ChunkRow>(&query).bind(user_id);
        for id in vector_ids {
            query_builder = query_builder.bind(id);
        }
        let chunks = query_builder.fetch_all(&self.pool).await?;
        Ok(chunks)
    }

    // ===== Query Log Operations =====

    /// Append a query log entry
    pub async fn insert_query_log(&self, log: &QueryLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO query_logs (id, user_id, query_text, answer_json, matched_clauses_json, match_count, duration_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.user_id)
        .bind(&log.query_text)
        .bind(&log.answer_json)
        .bind(&log.matched_clauses_json)
        .bind(log.match_count)
        .bind(log.duration_ms)
        .bind(&log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent query logs for a user
    pub async fn list_query_logs(&self, user_id: &str, limit: i64) -> Result<Vec<QueryLog>> {
        let logs = sqlx::query_as::<_, QueryLog>(
            "SELECT * FROM query_logs WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    // ===== Lease Operations =====

    /// Take the document lease, or fail with `Conflict` while another holder's lease is live
    ///
    /// The same holder may renew its own lease; an expired lease is taken over.
    pub async fn acquire_lease(&self, document_id: &str, holder: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let expires_at = now + ttl.as_millis() as i64;

        let result = sqlx::query(
            r#"
            INSERT INTO document_leases (document_id, holder, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                holder = excluded.holder,
                expires_at = excluded.expires_at
            WHERE document_leases.expires_at <= ? OR document_leases.holder = excluded.holder
            "#,
        )
        .bind(document_id)
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(document_id.to_string()));
        }

        debug!(document_id, holder, "Lease acquired");
        Ok(())
    }

    /// Release a lease held by `holder`
    pub async fn release_lease(&self, document_id: &str, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM document_leases WHERE document_id = ? AND holder = ?")
            .bind(document_id)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        debug!(document_id, holder, "Lease released");
        Ok(())
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let document_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&self.pool)
            .await?;

        let query_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM query_logs")
            .fetch_one(&self.pool)
            .await?;

        Ok(GlobalStats {
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            query_count: query_count as usize,
        })
    }
}

async fn insert_chunk(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, chunk: &ChunkRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO document_chunks (id, document_id, user_id, chunk_index, content, tokens, vector_id, metadata_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&chunk.id)
    .bind(&chunk.document_id)
    .bind(&chunk.user_id)
    .bind(chunk.chunk_index)
    .bind(&chunk.content)
    .bind(chunk.tokens)
    .bind(&chunk.vector_id)
    .bind(&chunk.metadata_json)
    .bind(&chunk.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub query_count: usize,
}
