/// Batched, normalized embedding off the async runtime
use super::{l2_normalize, EmbeddingError, EmbeddingProvider};
use std::sync::Arc;
use tracing::debug;

/// Runs embedding calls on the blocking thread pool
///
/// Every returned vector is L2-normalized, so inner product against the
/// index equals cosine similarity.
#[derive(Clone)]
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl BatchEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed all `texts` in order, `batch_size` at a time
    pub async fn embed_documents(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.provider.clone();
        let batch_size = self.batch_size;
        let expected = texts.len();

        let embeddings = tokio::task::spawn_blocking(move || {
            let start = std::time::Instant::now();
            let mut out = Vec::with_capacity(texts.len());
            for batch in texts.chunks(batch_size) {
                let vectors = provider.embed_batch(batch)?;
                if vectors.len() != batch.len() {
                    return Err(EmbeddingError::GenerationError(format!(
                        "Embedding count mismatch: expected {}, got {}",
                        batch.len(),
                        vectors.len()
                    )));
                }
                out.extend(vectors);
            }
            debug!(
                texts = out.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Embedded document batch"
            );
            Ok(out)
        })
        .await
        .map_err(|e| EmbeddingError::GenerationError(format!("Embedding task failed: {}", e)))??;

        if embeddings.len() != expected {
            return Err(EmbeddingError::GenerationError(format!(
                "Embedding count mismatch: expected {}, got {}",
                expected,
                embeddings.len()
            )));
        }

        self.normalized(embeddings)
    }

    /// Embed a single query
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let provider = self.provider.clone();
        let text = text.to_string();

        let embedding = tokio::task::spawn_blocking(move || provider.embed(&text))
            .await
            .map_err(|e| {
                EmbeddingError::GenerationError(format!("Embedding task failed: {}", e))
            })??;

        let mut normalized = self.normalized(vec![embedding])?;
        normalized
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))
    }

    fn normalized(&self, mut vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let dimension = self.provider.dimension();
        for vector in vectors.iter_mut() {
            if vector.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            l2_normalize(vector);
        }
        Ok(vectors)
    }
}
