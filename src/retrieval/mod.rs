//! Query-time retrieval
//!
//! Dense nearest-neighbor search over the knowledge index shortlists
//! candidates; a cross-encoder reranks them and the best few are returned.

mod reranker;
mod result;
mod searcher;

pub use reranker::{FastEmbedReranker, RerankError, Reranker};
pub use result::{round_latency, snippet, QueryOutcome, QueryResults, RetrievedChunk};
pub use searcher::Searcher;
