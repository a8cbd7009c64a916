use super::TextTokenizer;
use crate::embedding::EmbeddingError;
use std::sync::Arc;

/// Overlapping fixed-size token windows
#[derive(Clone)]
pub struct TokenWindowChunker {
    tokenizer: Arc<dyn TextTokenizer>,
    chunk_size: usize,
    overlap: usize,
    min_tokens: usize,
}

impl TokenWindowChunker {
    /// `overlap` is clamped below `chunk_size` so the window always advances.
    pub fn new(
        tokenizer: Arc<dyn TextTokenizer>,
        chunk_size: usize,
        overlap: usize,
        min_tokens: usize,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            tokenizer,
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            min_tokens,
        }
    }

    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Tokenize `text` once and return a lazy iterator over its windows
    ///
    /// Each item decodes one window. Calling `windows` again (or cloning the
    /// iterator before it is consumed) restarts the sequence.
    pub fn windows(&self, text: &str) -> Result<TokenWindows<'_>, EmbeddingError> {
        let tokens = self.tokenizer.encode(text)?;
        Ok(TokenWindows {
            chunker: self,
            tokens: tokens.into(),
            start: 0,
        })
    }
}

/// Iterator over the decoded windows of one text
#[derive(Clone)]
pub struct TokenWindows<'a> {
    chunker: &'a TokenWindowChunker,
    tokens: Arc<[u32]>,
    start: usize,
}

impl TokenWindows<'_> {
    /// Number of tokens in the underlying text
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

impl Iterator for TokenWindows<'_> {
    type Item = Result<String, EmbeddingError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.start < self.tokens.len() {
            let end = (self.start + self.chunker.chunk_size).min(self.tokens.len());
            let window = &self.tokens[self.start..end];
            self.start += self.chunker.step();

            if window.len() < self.chunker.min_tokens {
                continue;
            }

            match self.chunker.tokenizer.decode(window) {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => return Some(Ok(text)),
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
