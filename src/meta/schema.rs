//! SQLite schema definition

/// SQL schema for the metadata database
pub const SCHEMA_SQL: &str = r#"
-- Documents: uploaded files owned by one user
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    mime_type TEXT,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    storage_path TEXT,
    checksum TEXT,
    embedding_model TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    source TEXT NOT NULL DEFAULT 'upload',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Document chunks: one row per indexed vector
CREATE TABLE IF NOT EXISTS document_chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    tokens INTEGER NOT NULL,
    vector_id TEXT NOT NULL,
    metadata_json TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(document_id, chunk_index)
);

-- Query logs: append-only audit trail
CREATE TABLE IF NOT EXISTS query_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    query_text TEXT NOT NULL,
    answer_json TEXT NOT NULL,
    matched_clauses_json TEXT NOT NULL,
    match_count INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- Document leases: one mutating operation per document at a time
CREATE TABLE IF NOT EXISTS document_leases (
    document_id TEXT PRIMARY KEY,
    holder TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id);
CREATE INDEX IF NOT EXISTS idx_chunks_document ON document_chunks(document_id);
CREATE INDEX IF NOT EXISTS idx_chunks_vector ON document_chunks(vector_id);
CREATE INDEX IF NOT EXISTS idx_query_logs_user ON query_logs(user_id);
"#;
