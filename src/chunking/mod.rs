//! Page text chunking
//!
//! Two interchangeable policies turn the text of one page into chunk texts:
//! - token windows over the embedding model's tokenizer (upload path)
//! - sentence segments with artifact filtering (directory ingestion)

mod sentence;
mod token_window;

pub use sentence::SentenceChunker;
pub use token_window::{TokenWindowChunker, TokenWindows};

use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Tokenizer used by the token-window policy
///
/// Implementations must not add or emit special tokens: a decoded window is
/// stored verbatim as chunk text.
pub trait TextTokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>, EmbeddingError>;

    fn decode(&self, ids: &[u32]) -> Result<String, EmbeddingError>;
}

/// Selectable chunking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkingPolicy {
    TokenWindow,
    Sentence,
}

impl fmt::Display for ChunkingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkingPolicy::TokenWindow => write!(f, "token-window"),
            ChunkingPolicy::Sentence => write!(f, "sentence"),
        }
    }
}

impl FromStr for ChunkingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token-window" | "token_window" | "tokens" => Ok(ChunkingPolicy::TokenWindow),
            "sentence" | "sentences" => Ok(ChunkingPolicy::Sentence),
            other => Err(format!(
                "Unknown chunking policy: {} (expected token-window or sentence)",
                other
            )),
        }
    }
}

/// A configured chunking strategy
#[derive(Clone)]
pub enum Chunker {
    TokenWindow(TokenWindowChunker),
    Sentence(SentenceChunker),
}

impl Chunker {
    /// Build the chunker for `policy` from configuration
    pub fn from_config(
        policy: ChunkingPolicy,
        config: &ChunkingConfig,
        tokenizer: Arc<dyn TextTokenizer>,
    ) -> Self {
        match policy {
            ChunkingPolicy::TokenWindow => Chunker::TokenWindow(TokenWindowChunker::new(
                tokenizer,
                config.chunk_size,
                config.overlap,
                config.min_tokens,
            )),
            ChunkingPolicy::Sentence => {
                Chunker::Sentence(SentenceChunker::new(config.min_sentence_chars))
            }
        }
    }

    pub fn policy(&self) -> ChunkingPolicy {
        match self {
            Chunker::TokenWindow(_) => ChunkingPolicy::TokenWindow,
            Chunker::Sentence(_) => ChunkingPolicy::Sentence,
        }
    }

    /// Split one page of text into chunk texts
    ///
    /// Blank input yields no chunks.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, EmbeddingError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match self {
            Chunker::TokenWindow(chunker) => chunker.windows(text)?.collect(),
            Chunker::Sentence(chunker) => Ok(chunker.chunk(text)),
        }
    }
}
