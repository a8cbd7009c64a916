//! Cross-encoder reranking using FastEmbed

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Scores (query, candidate) pairs; higher means more relevant
///
/// The scale is model-specific and unrelated to cosine similarity.
pub trait Reranker: Send + Sync {
    /// One score per candidate, aligned with `candidates`
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, RerankError>;

    fn model_name(&self) -> &str;
}

/// Cross-encoder reranker for improving result precision
pub struct FastEmbedReranker {
    model: Arc<TextRerank>,
    model_name: String,
}

impl FastEmbedReranker {
    /// Create a new reranker with specified model
    ///
    /// # Arguments
    /// * `model_name` - Model name (e.g., "BAAI/bge-reranker-base")
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let model = match model_name {
            "BAAI/bge-reranker-base" | "bge-reranker-base" => RerankerModel::BGERerankerBase,
            "BAAI/bge-reranker-v2-m3" | "bge-reranker-v2-m3" => RerankerModel::BGERerankerV2M3,
            "jinaai/jina-reranker-v1-turbo-en" => RerankerModel::JINARerankerV1TurboEn,
            _ => {
                return Err(RerankError::InitializationError(format!(
                    "Unsupported reranker model: {}. Supported: BAAI/bge-reranker-base, BAAI/bge-reranker-v2-m3, jinaai/jina-reranker-v1-turbo-en",
                    model_name
                )));
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(model).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }

    /// Create reranker with default model
    pub fn with_default_model() -> Result<Self, RerankError> {
        Self::new("BAAI/bge-reranker-base")
    }
}

impl Reranker for FastEmbedReranker {
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, RerankError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let documents: Vec<&str> = candidates.iter().map(|s| s.as_str()).collect();

        // Results come back sorted by score; put them back in input order.
        let results = self
            .model
            .rerank(query, documents, false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        let mut scores: Vec<Option<f32>> = vec![None; candidates.len()];
        for result in results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                RerankError::RerankingError(format!(
                    "Reranker returned index {} for {} candidates",
                    result.index,
                    candidates.len()
                ))
            })?;
            *slot = Some(result.score);
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| {
                score.ok_or_else(|| {
                    RerankError::RerankingError(format!("No score for candidate {}", i))
                })
            })
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
