//! Two-stage retrieval: dense search, then cross-encoder reranking

use super::result::{round_latency, snippet, QueryOutcome, QueryResults, RetrievedChunk};
use super::{RerankError, Reranker};
use crate::config::RetrievalConfig;
use crate::embedding::BatchEmbedder;
use crate::error::{DocQaError, Result};
use crate::index::{Candidate, KnowledgeIndex};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// Answers questions against the shared knowledge index
///
/// Model calls run on the blocking pool and never while the index lock is
/// held. The read lock covers only the coarse search and metadata lookup.
#[derive(Clone)]
pub struct Searcher {
    embedder: BatchEmbedder,
    reranker: Arc<dyn Reranker>,
    index: Arc<RwLock<KnowledgeIndex>>,
    config: RetrievalConfig,
}

impl Searcher {
    pub fn new(
        embedder: BatchEmbedder,
        reranker: Arc<dyn Reranker>,
        index: Arc<RwLock<KnowledgeIndex>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            reranker,
            index,
            config,
        }
    }

    pub async fn search(&self, question: &str) -> Result<QueryOutcome> {
        let start = Instant::now();

        if question.trim().is_empty() {
            return Err(DocQaError::InvalidQuery(
                "Question cannot be empty".to_string(),
            ));
        }

        if self.index.read().await.is_empty() {
            return Ok(QueryOutcome::NoDocuments);
        }

        let query_vector = self.embedder.embed_query(question).await?;
        let embedded_at = start.elapsed();

        let candidates = {
            let index = self.index.read().await;
            match index.search(&query_vector, self.config.top_k) {
                Ok(candidates) => candidates,
                Err(DocQaError::IndexEmpty) => return Ok(QueryOutcome::NoDocuments),
                Err(e) => return Err(e),
            }
        };
        let searched_at = start.elapsed();

        let ranked = self.rerank(question, candidates).await?;
        let reranked_at = start.elapsed();

        let results: Vec<RetrievedChunk> = ranked
            .into_iter()
            .take(self.config.top_n)
            .map(|(score, candidate)| RetrievedChunk {
                snippet: snippet(&candidate.record.text, self.config.snippet_chars),
                document: candidate.record.document,
                page_number: candidate.record.page_number,
                score,
                similarity: candidate.similarity,
            })
            .collect();

        debug!(
            embed_ms = embedded_at.as_millis() as u64,
            search_ms = (searched_at - embedded_at).as_millis() as u64,
            rerank_ms = (reranked_at - searched_at).as_millis() as u64,
            results = results.len(),
            "Query answered"
        );

        Ok(QueryOutcome::Answered(QueryResults {
            question: question.to_string(),
            latency_seconds: round_latency(start.elapsed().as_secs_f64()),
            results,
        }))
    }

    /// Candidates paired with rerank scores, best first
    ///
    /// Equal scores keep their coarse order.
    async fn rerank(
        &self,
        question: &str,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<(f32, Candidate)>> {
        let reranker = self.reranker.clone();
        let query = question.to_string();
        let texts: Vec<String> = candidates.iter().map(|c| c.record.text.clone()).collect();

        let scores = tokio::task::spawn_blocking(move || reranker.score(&query, &texts))
            .await
            .map_err(|e| RerankError::RerankingError(format!("Rerank task failed: {}", e)))??;

        if scores.len() != candidates.len() {
            return Err(RerankError::RerankingError(format!(
                "Expected {} scores, got {}",
                candidates.len(),
                scores.len()
            ))
            .into());
        }

        let mut ranked: Vec<(f32, Candidate)> = scores.into_iter().zip(candidates).collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(ranked)
    }
}
