//! Default values for configuration

/// Default HTTP bind address
pub fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

/// Default vector backend
pub fn default_vector_backend() -> String {
    "qdrant".to_string()
}

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("CLAUSERAG_QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Shared index holding every owner's clauses
pub fn default_index_name() -> String {
    "policy-clauses".to_string()
}

/// Readiness polls before giving up on a freshly created index
pub fn default_provision_attempts() -> u32 {
    10
}

/// Delay between readiness polls (3 seconds)
pub fn default_provision_interval_ms() -> u64 {
    3000
}

/// Default embedding backend URL
pub fn default_embedding_backend_url() -> String {
    std::env::var("CLAUSERAG_EMBEDDING_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

/// Default environment variable name for the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "CLAUSERAG_EMBEDDING_API_KEY".to_string()
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    64
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default synthesis backend URL (OpenAI-compatible)
pub fn default_synthesis_backend_url() -> String {
    std::env::var("CLAUSERAG_SYNTHESIS_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
}

/// Default synthesis model
pub fn default_synthesis_model() -> String {
    "gemini-1.5-flash".to_string()
}

/// Default environment variable name for the synthesis API key
pub fn default_synthesis_api_key_env() -> String {
    "CLAUSERAG_SYNTHESIS_API_KEY".to_string()
}

/// Default sampling temperature
pub fn default_synthesis_temperature() -> f32 {
    0.0
}

/// Default synthesis request timeout in seconds
pub fn default_synthesis_timeout() -> u64 {
    60
}

/// Default characters per chunk
pub fn default_chunk_size() -> usize {
    1000
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    100
}

/// Default number of clauses retrieved per question
pub fn default_query_top_k() -> usize {
    8
}

/// Default auth mode
pub fn default_auth_mode() -> String {
    "static".to_string()
}

/// Default lease lifetime in seconds
pub fn default_lease_ttl() -> u64 {
    300
}
