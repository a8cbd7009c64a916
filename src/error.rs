use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::VectorIndexError;
use crate::retrieval::RerankError;

/// Main error type for docqa
#[derive(Error, Debug)]
pub enum DocQaError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Upload is not a supported document type
    #[error("Unsupported input type: {name}: {reason}")]
    UnsupportedInputType { name: String, reason: String },

    /// Document produced no chunks
    #[error("No extractable text in {document}")]
    EmptyExtraction { document: String },

    /// Query against an index with no vectors
    #[error("No documents indexed yet")]
    IndexEmpty,

    /// Positional lookup past the end of the metadata store
    #[error("Metadata position {index} out of range (length {len})")]
    OutOfRange { index: usize, len: usize },

    /// Vector index and metadata store disagree
    #[error("Index consistency violation: {0}")]
    ConsistencyViolation(String),

    /// Durable write failed; in-memory state was rolled back
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Ingestion refused until on-disk state is reconciled
    #[error("Ingestion blocked: {0}")]
    IngestionBlocked(String),

    /// Vector dimension differs from the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Malformed chunk record
    #[error("Invalid chunk record: {0}")]
    InvalidRecord(String),

    /// Malformed query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Text extraction backend failure
    #[error("Extraction failed for {document}: {message}")]
    Extraction { document: String, message: String },

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Reranker errors
    #[error("Rerank error: {0}")]
    Rerank(#[from] RerankError),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<VectorIndexError> for DocQaError {
    fn from(err: VectorIndexError) -> Self {
        match err {
            VectorIndexError::Empty => DocQaError::IndexEmpty,
            VectorIndexError::InvalidDimension { expected, actual } => {
                DocQaError::DimensionMismatch { expected, actual }
            }
            VectorIndexError::Corrupt(message) => {
                DocQaError::ConsistencyViolation(format!("corrupt index file: {}", message))
            }
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for docqa operations
pub type Result<T> = std::result::Result<T, DocQaError>;
