//! Ranked query results

use serde::{Deserialize, Serialize};

/// One reranked chunk as shown to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Source document name
    pub document: String,

    /// 1-based page number
    pub page_number: u32,

    /// Reranker relevance score; determines the order
    pub score: f32,

    /// Cosine similarity from the coarse search, on its own scale
    pub similarity: f32,

    /// Leading characters of the chunk text
    pub snippet: String,
}

/// A successful query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResults {
    pub question: String,
    pub latency_seconds: f64,
    pub results: Vec<RetrievedChunk>,
}

/// Result of the query flow
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Nothing has been indexed yet
    NoDocuments,
    Answered(QueryResults),
}

/// First `max_chars` characters of `text`
///
/// Cuts on character boundaries; the stored text is never modified.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Seconds rounded to four decimal places
pub fn round_latency(seconds: f64) -> f64 {
    (seconds * 10_000.0).round() / 10_000.0
}
