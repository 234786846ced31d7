//! Configuration management for clauserag
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Vector index configuration
    #[serde(default)]
    pub vector: VectorConfig,

    /// Embedding endpoint configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Answer synthesis endpoint configuration
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Caller identity configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-document lease configuration
    #[serde(default)]
    pub lease: LeaseConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// "qdrant" or "memory"
    #[serde(default = "default_vector_backend")]
    pub backend: String,

    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub api_key_env: String,

    /// Logical index (collection) name
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Readiness polls after creating the index
    #[serde(default = "default_provision_attempts")]
    pub provision_attempts: u32,

    /// Delay between readiness polls
    #[serde(default = "default_provision_interval_ms")]
    pub provision_interval_ms: u64,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding backend
    #[serde(default = "default_embedding_backend_url")]
    pub backend_url: String,

    /// Model name/identifier, recorded on every document
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding a bearer key for the backend
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Expected dimension; learned from the first response when unset
    #[serde(default)]
    pub dimension: Option<usize>,

    /// Texts per request
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Answer synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Base URL of an OpenAI-compatible chat completions backend
    #[serde(default = "default_synthesis_backend_url")]
    pub backend_url: String,

    /// Model name
    #[serde(default = "default_synthesis_model")]
    pub model: String,

    /// Environment variable holding a bearer key for the backend
    #[serde(default = "default_synthesis_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature
    #[serde(default = "default_synthesis_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Characters per chunk
    #[serde(default = "default_chunk_size")]
    pub size: usize,

    /// Overlap characters between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Number of clauses retrieved per question
    #[serde(default = "default_query_top_k")]
    pub top_k: usize,
}

/// Object storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the filesystem object store (defaults to `<base>/objects`)
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Caller identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// "static" (token table below) or "http" (identity endpoint)
    #[serde(default = "default_auth_mode")]
    pub mode: String,

    /// Bearer token -> user id
    #[serde(default)]
    pub tokens: HashMap<String, String>,

    /// Endpoint returning `{"id": ...}` for a bearer token (http mode)
    #[serde(default)]
    pub identity_url: Option<String>,
}

/// Per-document lease configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Lease lifetime; an expired lease may be taken over
    #[serde(default = "default_lease_ttl")]
    pub ttl_secs: u64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for clauserag data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            vector: VectorConfig::default(),
            embedding: EmbeddingConfig::default(),
            synthesis: SynthesisConfig::default(),
            chunk: ChunkConfig::default(),
            query: QueryConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            lease: LeaseConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            url: default_qdrant_url(),
            api_key_env: default_qdrant_api_key_env(),
            index_name: default_index_name(),
            provision_attempts: default_provision_attempts(),
            provision_interval_ms: default_provision_interval_ms(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend_url: default_embedding_backend_url(),
            model: default_embedding_model(),
            api_key_env: default_embedding_api_key_env(),
            dimension: None,
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            backend_url: default_synthesis_backend_url(),
            model: default_synthesis_model(),
            api_key_env: default_synthesis_api_key_env(),
            temperature: default_synthesis_temperature(),
            timeout_secs: default_synthesis_timeout(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_query_top_k(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: default_auth_mode(),
            tokens: HashMap::new(),
            identity_url: None,
        }
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lease_ttl(),
        }
    }
}

impl EmbeddingConfig {
    /// Bearer key read from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        read_env_key(&self.api_key_env)
    }
}

impl SynthesisConfig {
    /// Bearer key read from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        read_env_key(&self.api_key_env)
    }
}

impl VectorConfig {
    /// Qdrant API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        read_env_key(&self.api_key_env)
    }
}

fn read_env_key(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Get the default base directory for clauserag (~/.clauserag)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".clauserag")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("metadata.db"),
            base_dir: base,
        };
    }

    /// Root directory of the filesystem object store
    pub fn storage_root(&self) -> PathBuf {
        self.storage
            .root
            .clone()
            .unwrap_or_else(|| self.paths.base_dir.join("objects"))
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("metadata.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.size == 0 {
            return Err(Error::Config("chunk.size must be positive".to_string()));
        }

        if self.chunk.overlap >= self.chunk.size {
            return Err(Error::Config(
                "chunk.overlap must be < chunk.size".to_string(),
            ));
        }

        if self.query.top_k == 0 {
            return Err(Error::Config("query.top_k must be positive".to_string()));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }

        if self.vector.provision_attempts == 0 {
            return Err(Error::Config(
                "vector.provision_attempts must be positive".to_string(),
            ));
        }

        if !matches!(self.vector.backend.as_str(), "qdrant" | "memory") {
            return Err(Error::Config(format!(
                "Unsupported vector backend '{}'; expected 'qdrant' or 'memory'",
                self.vector.backend
            )));
        }

        match self.auth.mode.as_str() {
            "static" => {}
            "http" => {
                if self.auth.identity_url.is_none() {
                    return Err(Error::Config(
                        "auth.identity_url is required when auth.mode = \"http\"".to_string(),
                    ));
                }
            }
            other => {
                return Err(Error::Config(format!(
                    "Unsupported auth mode '{}'; expected 'static' or 'http'",
                    other
                )))
            }
        }

        if self.lease.ttl_secs == 0 {
            return Err(Error::Config("lease.ttl_secs must be positive".to_string()));
        }

        Ok(())
    }
}
