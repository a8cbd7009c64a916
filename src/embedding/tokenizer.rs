use super::EmbeddingError;
use crate::chunking::TextTokenizer;
use tokenizers::Tokenizer;

/// The embedding model's tokenizer, used for token-window chunking
///
/// fastembed configures truncation to the model's context length and batch
/// padding; both are removed so whole pages tokenize losslessly.
#[derive(Clone)]
pub struct ModelTokenizer {
    inner: Tokenizer,
}

impl ModelTokenizer {
    pub fn from_model_tokenizer(mut tokenizer: Tokenizer) -> Self {
        tokenizer.with_padding(None);
        if let Err(e) = tokenizer.with_truncation(None) {
            tracing::warn!("Failed to disable tokenizer truncation: {}", e);
        }
        Self { inner: tokenizer }
    }
}

impl TextTokenizer for ModelTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, EmbeddingError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| EmbeddingError::TokenizationError(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, EmbeddingError> {
        self.inner
            .decode(ids, true)
            .map_err(|e| EmbeddingError::TokenizationError(e.to_string()))
    }
}
