/// Embedding generation
///
/// - EmbeddingProvider trait for abstraction over model backends
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - ModelTokenizer exposing the model's own tokenizer to the chunker
/// - BatchEmbedder running normalized batch encodes off the async runtime
mod batch;
mod normalize;
mod provider;
mod tokenizer;

pub use batch::BatchEmbedder;
pub use normalize::{is_unit_length, l2_normalize, NORM_TOLERANCE};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use tokenizer::ModelTokenizer;
