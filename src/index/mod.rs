//! Vector index, chunk metadata and the combined owner that keeps them aligned

pub mod metadata;
pub mod store;
pub mod vector_index;

pub use metadata::{ChunkRecord, MetadataStore};
pub use store::{Candidate, DocumentSummary, IndexedChunk, KnowledgeIndex};
pub use vector_index::{Neighbor, VectorIndex, VectorIndexError};
