//! Configuration management for docqa
//!
//! Loads `config.toml`, applies `DOCQA_SECTION__KEY` environment overrides and
//! validates the result before any component is built from it.

use crate::chunking::ChunkingPolicy;
use crate::error::{DocQaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
///
/// `index_file` and `metadata_file` are resolved relative to `data_dir`
/// unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub index_file: PathBuf,
    pub metadata_file: PathBuf,
    pub uploads_dir: PathBuf,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Policy used by the upload path
    pub upload_policy: ChunkingPolicy,
    /// Policy used by directory ingestion
    pub batch_policy: ChunkingPolicy,
    /// Token window size
    pub chunk_size: usize,
    /// Tokens shared by adjacent windows
    pub overlap: usize,
    /// Windows with fewer tokens are discarded
    pub min_tokens: usize,
    /// Sentences with fewer characters are discarded
    pub min_sentence_chars: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Coarse candidates fetched from the vector index
    pub top_k: usize,
    /// Results returned after reranking
    pub top_n: usize,
    /// Snippet length in characters
    pub snippet_chars: usize,
    pub reranker_model: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocQaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocQaError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DocQaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DOCQA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("DOCQA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    pub(crate) fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => self.storage.data_dir = PathBuf::from(value),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_env(path, value)?,
            "CHUNKING__CHUNK_SIZE" => self.chunking.chunk_size = parse_env(path, value)?,
            "CHUNKING__OVERLAP" => self.chunking.overlap = parse_env(path, value)?,
            "CHUNKING__MIN_TOKENS" => self.chunking.min_tokens = parse_env(path, value)?,
            "CHUNKING__UPLOAD_POLICY" => self.chunking.upload_policy = parse_env(path, value)?,
            "CHUNKING__BATCH_POLICY" => self.chunking.batch_policy = parse_env(path, value)?,
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_env(path, value)?,
            "RETRIEVAL__TOP_N" => self.retrieval.top_n = parse_env(path, value)?,
            "RETRIEVAL__RERANKER_MODEL" => self.retrieval.reranker_model = value.to_string(),
            "SERVER__BIND" => self.server.bind = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Absolute path of the vector index file
    pub fn index_path(&self) -> PathBuf {
        resolve(&self.storage.data_dir, &self.storage.index_file)
    }

    /// Absolute path of the metadata file
    pub fn metadata_path(&self) -> PathBuf {
        resolve(&self.storage.data_dir, &self.storage.metadata_file)
    }

    /// Absolute path of the directory receiving uploaded documents
    pub fn uploads_path(&self) -> PathBuf {
        resolve(&self.storage.data_dir, &self.storage.uploads_dir)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DocQaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("docqa").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.docqa"),
                index_file: PathBuf::from("index/vectors.idx"),
                metadata_file: PathBuf::from("index/metadata.json"),
                uploads_dir: PathBuf::from("uploads"),
            },
            chunking: ChunkingConfig {
                upload_policy: ChunkingPolicy::TokenWindow,
                batch_policy: ChunkingPolicy::Sentence,
                chunk_size: 256,
                overlap: 50,
                min_tokens: 20,
                min_sentence_chars: 40,
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
            },
            retrieval: RetrievalConfig {
                top_k: 10,
                top_n: 3,
                snippet_chars: 300,
                reranker_model: "BAAI/bge-reranker-base".to_string(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:8000".to_string(),
                max_upload_bytes: 64 * 1024 * 1024,
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| DocQaError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    let base = expand_tilde(base);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix("~/")) {
        Some(stripped) => match dirs::home_dir() {
            Some(home) => home.join(stripped),
            None => path.to_path_buf(),
        },
        None => path.to_path_buf(),
    }
}
