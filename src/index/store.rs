//! The single owner of the vector index and its metadata
//!
//! Position `i` in the vector index and position `i` in the metadata store
//! describe the same chunk. Every mutation goes through [`KnowledgeIndex::extend`]
//! or [`KnowledgeIndex::replace`], which either apply vectors, metadata and the
//! durable save together or leave all three as they were.

use super::{ChunkRecord, MetadataStore, VectorIndex};
use crate::error::{DocQaError, Result};
use crate::storage::IndexPersistence;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

/// A chunk ready to be indexed: its record and normalized embedding
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub record: ChunkRecord,
    pub vector: Vec<f32>,
}

/// Coarse search hit with its metadata
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Rank in the coarse search, 0 is best
    pub coarse_rank: usize,
    /// Cosine similarity to the query
    pub similarity: f32,
    pub record: ChunkRecord,
}

/// Chunks indexed per document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document: String,
    pub chunks: usize,
    pub pages: usize,
}

pub struct KnowledgeIndex {
    vectors: VectorIndex,
    metadata: MetadataStore,
    persistence: Box<dyn IndexPersistence>,
    needs_reconcile: bool,
}

impl KnowledgeIndex {
    /// Load persisted state, or start empty when nothing was saved yet
    pub fn open(persistence: Box<dyn IndexPersistence>, dimension: usize) -> Result<Self> {
        let (vectors, metadata) = match persistence.load()? {
            Some((vectors, metadata)) => {
                if vectors.dimension() != dimension && !vectors.is_empty() {
                    return Err(DocQaError::ConsistencyViolation(format!(
                        "index dimension {} does not match embedding dimension {}",
                        vectors.dimension(),
                        dimension
                    )));
                }
                if vectors.len() != metadata.len() {
                    error!(
                        vectors = vectors.len(),
                        records = metadata.len(),
                        "Persisted index and metadata disagree"
                    );
                    return Err(DocQaError::ConsistencyViolation(format!(
                        "{} vectors but {} metadata records",
                        vectors.len(),
                        metadata.len()
                    )));
                }
                if vectors.is_empty() {
                    (VectorIndex::new(dimension), metadata)
                } else {
                    (vectors, metadata)
                }
            }
            None => {
                info!("No persisted index found, starting empty");
                (VectorIndex::new(dimension), MetadataStore::new())
            }
        };

        info!(
            vectors = vectors.len(),
            dimension = dimension,
            "Knowledge index ready"
        );

        Ok(Self {
            vectors,
            metadata,
            persistence,
            needs_reconcile: false,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    /// True after a save left the files on disk in disagreement
    pub fn needs_reconcile(&self) -> bool {
        self.needs_reconcile
    }

    /// Append a batch and persist it, all or nothing
    ///
    /// Returns the new total vector count.
    pub fn extend(&mut self, batch: Vec<IndexedChunk>) -> Result<usize> {
        self.ensure_writable()?;
        self.check_alignment()?;

        if batch.is_empty() {
            return Ok(self.len());
        }

        let previous = self.len();
        let (records, vectors): (Vec<ChunkRecord>, Vec<Vec<f32>>) = batch
            .into_iter()
            .map(|chunk| (chunk.record, chunk.vector))
            .unzip();

        self.vectors.add(&vectors)?;

        if let Err(e) = self.metadata.append(records) {
            warn!("Metadata append failed, rolling back vectors: {}", e);
            self.vectors.truncate(previous);
            return Err(e);
        }

        if let Err(e) = self.persistence.save(&self.vectors, &self.metadata) {
            self.vectors.truncate(previous);
            self.metadata.truncate(previous);
            return Err(self.persist_failed(e));
        }

        debug!(
            added = self.len() - previous,
            total_vectors = self.len(),
            "Extended knowledge index"
        );
        Ok(self.len())
    }

    /// Replace the whole index with `batch`, all or nothing
    pub fn replace(&mut self, batch: Vec<IndexedChunk>) -> Result<usize> {
        self.ensure_writable()?;

        let mut vectors = VectorIndex::new(self.dimension());
        let mut metadata = MetadataStore::new();
        let (records, embeddings): (Vec<ChunkRecord>, Vec<Vec<f32>>) = batch
            .into_iter()
            .map(|chunk| (chunk.record, chunk.vector))
            .unzip();
        vectors.add(&embeddings)?;
        metadata.append(records)?;

        if let Err(e) = self.persistence.save(&vectors, &metadata) {
            return Err(self.persist_failed(e));
        }

        self.vectors = vectors;
        self.metadata = metadata;
        info!(total_vectors = self.len(), "Rebuilt knowledge index");
        Ok(self.len())
    }

    /// Top-`k` candidates for a normalized query vector
    ///
    /// Fails with `IndexEmpty` when nothing is indexed.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>> {
        self.check_alignment()?;

        self.vectors
            .search(query, k)?
            .into_iter()
            .enumerate()
            .map(|(coarse_rank, neighbor)| {
                let record = self.record(neighbor.position)?;
                Ok(Candidate {
                    coarse_rank,
                    similarity: neighbor.score,
                    record: record.clone(),
                })
            })
            .collect()
    }

    /// Metadata for the vector at `position`
    pub fn record(&self, position: usize) -> Result<&ChunkRecord> {
        self.metadata.get(position).inspect_err(|e| {
            error!("Positional lookup failed, index and metadata diverged: {}", e);
        })
    }

    /// Per-document chunk and page counts, sorted by document name
    pub fn documents(&self) -> Vec<DocumentSummary> {
        let mut by_document: BTreeMap<&str, (usize, BTreeSet<u32>)> = BTreeMap::new();
        for record in self.metadata.iter() {
            let entry = by_document.entry(record.document.as_str()).or_default();
            entry.0 += 1;
            entry.1.insert(record.page_number);
        }

        by_document
            .into_iter()
            .map(|(document, (chunks, pages))| DocumentSummary {
                document: document.to_string(),
                chunks,
                pages: pages.len(),
            })
            .collect()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.needs_reconcile {
            return Err(DocQaError::IngestionBlocked(
                "index files on disk are inconsistent; restart to reload them".to_string(),
            ));
        }
        Ok(())
    }

    fn check_alignment(&self) -> Result<()> {
        if self.vectors.len() != self.metadata.len() {
            error!(
                vectors = self.vectors.len(),
                records = self.metadata.len(),
                "Index and metadata lengths diverged"
            );
            return Err(DocQaError::ConsistencyViolation(format!(
                "{} vectors but {} metadata records",
                self.vectors.len(),
                self.metadata.len()
            )));
        }
        Ok(())
    }

    fn persist_failed(&mut self, err: DocQaError) -> DocQaError {
        if matches!(err, DocQaError::ConsistencyViolation(_)) {
            error!("Index files may disagree, refusing further ingestion: {}", err);
            self.needs_reconcile = true;
            return err;
        }

        warn!("Persist failed, in-memory index rolled back: {}", err);
        match err {
            DocQaError::PersistenceFailure(_) => err,
            other => DocQaError::PersistenceFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_normalize;
    use std::sync::{Arc, Mutex};

    /// Keeps the last saved pair in memory; can be told to fail
    #[derive(Default, Clone)]
    struct MemoryPersistence {
        saved: Arc<Mutex<Option<(VectorIndex, MetadataStore)>>>,
        fail_with: Arc<Mutex<Option<fn() -> DocQaError>>>,
    }

    impl IndexPersistence for MemoryPersistence {
        fn load(&self) -> Result<Option<(VectorIndex, MetadataStore)>> {
            Ok(self.saved.lock().unwrap().clone())
        }

        fn save(&self, vectors: &VectorIndex, metadata: &MetadataStore) -> Result<()> {
            if let Some(make_err) = *self.fail_with.lock().unwrap() {
                return Err(make_err());
            }
            *self.saved.lock().unwrap() = Some((vectors.clone(), metadata.clone()));
            Ok(())
        }
    }

    fn chunk(document: &str, page: u32, values: &[f32]) -> IndexedChunk {
        let mut vector = values.to_vec();
        l2_normalize(&mut vector);
        IndexedChunk {
            record: ChunkRecord::new(document, page, format!("{} page {}", document, page)),
            vector,
        }
    }

    fn open(persistence: &MemoryPersistence) -> KnowledgeIndex {
        KnowledgeIndex::open(Box::new(persistence.clone()), 2).unwrap()
    }

    #[test]
    fn test_empty_on_first_run() {
        let index = open(&MemoryPersistence::default());
        assert!(index.is_empty());
        assert!(matches!(
            index.search(&[1.0, 0.0], 10),
            Err(DocQaError::IndexEmpty)
        ));
    }

    #[test]
    fn test_extend_keeps_positions_aligned() {
        let persistence = MemoryPersistence::default();
        let mut index = open(&persistence);

        let total = index
            .extend(vec![chunk("A.pdf", 1, &[1.0, 0.0]), chunk("A.pdf", 2, &[0.0, 1.0])])
            .unwrap();
        assert_eq!(total, 2);

        let hits = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].record.page_number, 2);
        assert_eq!(hits[0].coarse_rank, 0);

        let reopened = open(&persistence);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.record(1).unwrap().page_number, 2);
    }

    #[test]
    fn test_metadata_failure_rolls_back_vectors() {
        let persistence = MemoryPersistence::default();
        let mut index = open(&persistence);
        index.extend(vec![chunk("A.pdf", 1, &[1.0, 0.0])]).unwrap();

        let mut bad = chunk("B.pdf", 1, &[0.0, 1.0]);
        bad.record.page_number = 0;
        let result = index.extend(vec![chunk("B.pdf", 2, &[1.0, 1.0]), bad]);

        assert!(matches!(result, Err(DocQaError::InvalidRecord(_))));
        assert_eq!(index.len(), 1);
        assert_eq!(index.documents().len(), 1);
    }

    #[test]
    fn test_persist_failure_rolls_back_both() {
        let persistence = MemoryPersistence::default();
        let mut index = open(&persistence);
        index.extend(vec![chunk("A.pdf", 1, &[1.0, 0.0])]).unwrap();

        *persistence.fail_with.lock().unwrap() =
            Some(|| DocQaError::PersistenceFailure("disk full".to_string()));
        let result = index.extend(vec![chunk("B.pdf", 1, &[0.0, 1.0])]);

        assert!(matches!(result, Err(DocQaError::PersistenceFailure(_))));
        assert_eq!(index.len(), 1);
        assert!(!index.needs_reconcile());

        // Still writable once the disk recovers.
        *persistence.fail_with.lock().unwrap() = None;
        assert_eq!(index.extend(vec![chunk("B.pdf", 1, &[0.0, 1.0])]).unwrap(), 2);
    }

    #[test]
    fn test_diverged_disk_blocks_ingestion() {
        let persistence = MemoryPersistence::default();
        let mut index = open(&persistence);

        *persistence.fail_with.lock().unwrap() =
            Some(|| DocQaError::ConsistencyViolation("restore failed".to_string()));
        assert!(index.extend(vec![chunk("A.pdf", 1, &[1.0, 0.0])]).is_err());
        assert!(index.needs_reconcile());
        assert!(index.is_empty());

        *persistence.fail_with.lock().unwrap() = None;
        assert!(matches!(
            index.extend(vec![chunk("A.pdf", 1, &[1.0, 0.0])]),
            Err(DocQaError::IngestionBlocked(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_changes_nothing() {
        let persistence = MemoryPersistence::default();
        let mut index = open(&persistence);

        let result = index.extend(vec![IndexedChunk {
            record: ChunkRecord::new("A.pdf", 1, "three dims"),
            vector: vec![1.0, 0.0, 0.0],
        }]);
        assert!(matches!(result, Err(DocQaError::DimensionMismatch { .. })));
        assert!(index.is_empty());
        assert!(persistence.saved.lock().unwrap().is_none());
    }

    #[test]
    fn test_replace_swaps_membership() {
        let persistence = MemoryPersistence::default();
        let mut index = open(&persistence);
        index
            .extend(vec![chunk("old.pdf", 1, &[1.0, 0.0]), chunk("old.pdf", 2, &[0.0, 1.0])])
            .unwrap();

        let total = index.replace(vec![chunk("new.pdf", 1, &[1.0, 1.0])]).unwrap();
        assert_eq!(total, 1);
        assert_eq!(index.documents()[0].document, "new.pdf");
    }

    #[test]
    fn test_mismatched_persisted_counts_rejected() {
        let persistence = MemoryPersistence::default();
        let mut vectors = VectorIndex::new(2);
        vectors.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let mut metadata = MetadataStore::new();
        metadata
            .append(vec![ChunkRecord::new("A.pdf", 1, "only one")])
            .unwrap();
        *persistence.saved.lock().unwrap() = Some((vectors, metadata));

        assert!(matches!(
            KnowledgeIndex::open(Box::new(persistence), 2),
            Err(DocQaError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn test_documents_summary() {
        let persistence = MemoryPersistence::default();
        let mut index = open(&persistence);
        index
            .extend(vec![
                chunk("B.pdf", 1, &[1.0, 0.0]),
                chunk("A.pdf", 3, &[0.0, 1.0]),
                chunk("B.pdf", 1, &[1.0, 1.0]),
                chunk("B.pdf", 2, &[1.0, 0.5]),
            ])
            .unwrap();

        let docs = index.documents();
        assert_eq!(
            docs,
            vec![
                DocumentSummary {
                    document: "A.pdf".to_string(),
                    chunks: 1,
                    pages: 1
                },
                DocumentSummary {
                    document: "B.pdf".to_string(),
                    chunks: 3,
                    pages: 2
                },
            ]
        );
    }
}
