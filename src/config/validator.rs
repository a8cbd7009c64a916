use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{DocQaError, Result, ValidationError};
use std::net::SocketAddr;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_server(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocQaError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        let storage = &config.storage;
        if storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        if storage.index_file.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.index_file",
                "Index file path cannot be empty",
            ));
        }

        if storage.metadata_file.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.metadata_file",
                "Metadata file path cannot be empty",
            ));
        }

        if storage.index_file == storage.metadata_file {
            errors.push(ValidationError::new(
                "storage.metadata_file",
                "Index and metadata must be stored in different files",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;
        if chunking.chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        // The window must advance on every step.
        if chunking.overlap >= chunking.chunk_size {
            errors.push(ValidationError::new(
                "chunking.overlap",
                format!(
                    "Overlap ({}) must be smaller than chunk size ({})",
                    chunking.overlap, chunking.chunk_size
                ),
            ));
        }

        if chunking.min_tokens > chunking.chunk_size {
            errors.push(ValidationError::new(
                "chunking.min_tokens",
                format!(
                    "Minimum tokens ({}) cannot exceed chunk size ({})",
                    chunking.min_tokens, chunking.chunk_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;
        if retrieval.top_n == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_n",
                "top_n must be greater than 0",
            ));
        }

        if retrieval.top_k < retrieval.top_n {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                format!(
                    "top_k ({}) must be at least top_n ({})",
                    retrieval.top_k, retrieval.top_n
                ),
            ));
        }

        if retrieval.snippet_chars == 0 {
            errors.push(ValidationError::new(
                "retrieval.snippet_chars",
                "Snippet length must be greater than 0",
            ));
        }

        if retrieval.reranker_model.is_empty() {
            errors.push(ValidationError::new(
                "retrieval.reranker_model",
                "Reranker model name cannot be empty",
            ));
        }
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.server.bind.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "server.bind",
                format!("Invalid bind address: {}", config.server.bind),
            ));
        }

        if config.server.max_upload_bytes == 0 {
            errors.push(ValidationError::new(
                "server.max_upload_bytes",
                "Upload limit must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.chunk_size;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::default();
        config.retrieval.top_n = 0;
        config.embedding.batch_size = 0;
        config.server.bind = "not an address".to_string();

        match ConfigValidator::validate(&config) {
            Err(DocQaError::ConfigValidation { errors }) => {
                let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
                assert!(paths.contains(&"retrieval.top_n"));
                assert!(paths.contains(&"embedding.batch_size"));
                assert!(paths.contains(&"server.bind"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_top_k_below_top_n() {
        let mut config = Config::default();
        config.retrieval.top_k = 2;
        config.retrieval.top_n = 3;
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
