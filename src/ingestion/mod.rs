//! Document ingestion: validate, extract, chunk, embed, commit
//!
//! Everything slow happens before the index write lock is taken. The lock is
//! held only for [`KnowledgeIndex::extend`] (or `replace` on a rebuild),
//! which applies vectors, metadata and the durable save as one unit.

use crate::chunking::Chunker;
use crate::embedding::BatchEmbedder;
use crate::error::{DocQaError, Result};
use crate::extract::{validate_document, DocumentExtractor};
use crate::index::{ChunkRecord, IndexedChunk, KnowledgeIndex};
use crate::storage::StorageManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Result of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed {
        document: String,
        chunks_added: usize,
        total_vectors: usize,
    },
    /// The document produced no chunks; nothing was added
    NoExtractableText { document: String },
}

/// Per-file results of a directory ingestion
#[derive(Debug, Default)]
pub struct DirectoryReport {
    pub indexed: Vec<(String, usize)>,
    pub empty: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub total_vectors: usize,
}

impl DirectoryReport {
    pub fn chunks_added(&self) -> usize {
        self.indexed.iter().map(|(_, n)| n).sum()
    }
}

#[derive(Clone)]
pub struct Ingestor {
    embedder: BatchEmbedder,
    extractor: Arc<dyn DocumentExtractor>,
    index: Arc<RwLock<KnowledgeIndex>>,
}

impl Ingestor {
    pub fn new(
        embedder: BatchEmbedder,
        extractor: Arc<dyn DocumentExtractor>,
        index: Arc<RwLock<KnowledgeIndex>>,
    ) -> Self {
        Self {
            embedder,
            extractor,
            index,
        }
    }

    /// Ingest one uploaded document
    ///
    /// The file is saved under the uploads directory before extraction.
    pub async fn ingest_upload(
        &self,
        file_name: &str,
        data: Vec<u8>,
        chunker: &Chunker,
        storage: &StorageManager,
    ) -> Result<IngestOutcome> {
        let document = document_name(file_name)?;
        validate_document(&document, &data)?;

        let saved = storage.save_upload(&document, &data)?;
        debug!("Saved upload to {}", saved.display());

        self.ingest_bytes(&document, data, chunker).await
    }

    /// Ingest a validated document already in memory
    pub async fn ingest_bytes(
        &self,
        document: &str,
        data: Vec<u8>,
        chunker: &Chunker,
    ) -> Result<IngestOutcome> {
        let start = Instant::now();

        let batch = self.prepare(document, data, chunker).await?;
        if batch.is_empty() {
            info!(document, "No extractable text");
            return Ok(IngestOutcome::NoExtractableText {
                document: document.to_string(),
            });
        }

        let chunks_added = batch.len();
        let total_vectors = self.index.write().await.extend(batch)?;

        info!(
            document,
            chunks = chunks_added,
            total_vectors,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Indexed document"
        );

        Ok(IngestOutcome::Indexed {
            document: document.to_string(),
            chunks_added,
            total_vectors,
        })
    }

    /// Ingest every `.pdf` file in `dir`, in file name order
    ///
    /// With `rebuild`, the index is replaced by exactly these documents in a
    /// single commit. Otherwise each document is appended on its own.
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        chunker: &Chunker,
        rebuild: bool,
    ) -> Result<DirectoryReport> {
        let files = pdf_files(dir)?;
        info!(
            files = files.len(),
            policy = %chunker.policy(),
            rebuild,
            "Ingesting directory {}",
            dir.display()
        );

        let mut report = DirectoryReport::default();
        let mut rebuilt: Vec<IndexedChunk> = Vec::new();

        for path in files {
            let document = document_name(&path.to_string_lossy())?;
            let data = std::fs::read(&path).map_err(|e| DocQaError::Io {
                source: e,
                context: format!("Failed to read document: {}", path.display()),
            })?;

            if let Err(e) = validate_document(&document, &data) {
                warn!("Skipping {}: {}", document, e);
                report.failed.push((document, e.to_string()));
                continue;
            }

            let batch = match self.prepare(&document, data, chunker).await {
                Ok(batch) => batch,
                Err(e @ DocQaError::Extraction { .. }) => {
                    warn!("Skipping {}: {}", document, e);
                    report.failed.push((document, e.to_string()));
                    continue;
                }
                Err(e) => return Err(e),
            };

            if batch.is_empty() {
                report.empty.push(document);
                continue;
            }

            let added = batch.len();
            if rebuild {
                rebuilt.extend(batch);
            } else {
                report.total_vectors = self.index.write().await.extend(batch)?;
            }
            info!(document = %document, chunks = added, "Prepared document");
            report.indexed.push((document, added));
        }

        if rebuild {
            report.total_vectors = self.index.write().await.replace(rebuilt)?;
        } else {
            report.total_vectors = self.index.read().await.len();
        }

        Ok(report)
    }

    /// Extract, chunk and embed a document without touching the index
    async fn prepare(
        &self,
        document: &str,
        data: Vec<u8>,
        chunker: &Chunker,
    ) -> Result<Vec<IndexedChunk>> {
        let extractor = self.extractor.clone();
        let chunker = chunker.clone();
        let name = document.to_string();

        let records = tokio::task::spawn_blocking(move || -> Result<Vec<ChunkRecord>> {
            let mut records = Vec::new();
            for page in extractor.extract(&name, &data)? {
                let text = page.text.trim();
                if text.is_empty() {
                    debug!(page = page.page_number, "Skipping blank page");
                    continue;
                }
                for chunk in chunker.chunk(text)? {
                    records.push(ChunkRecord::new(name.as_str(), page.page_number, chunk));
                }
            }
            Ok(records)
        })
        .await
        .map_err(|e| {
            if e.is_panic() {
                // Malformed PDFs can panic inside the parser.
                DocQaError::Extraction {
                    document: document.to_string(),
                    message: format!("extractor panicked: {}", panic_message(e.into_panic())),
                }
            } else {
                DocQaError::Other(anyhow::anyhow!("Extraction task failed: {}", e))
            }
        })??;

        if records.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed_documents(texts).await?;

        if vectors.len() != records.len() {
            return Err(DocQaError::ConsistencyViolation(format!(
                "{} embeddings for {} chunks",
                vectors.len(),
                records.len()
            )));
        }

        Ok(records
            .into_iter()
            .zip(vectors)
            .map(|(record, vector)| IndexedChunk { record, vector })
            .collect())
    }
}

/// Final path component of an uploaded file name
pub fn document_name(file_name: &str) -> Result<String> {
    Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| DocQaError::UnsupportedInputType {
            name: file_name.to_string(),
            reason: "missing file name".to_string(),
        })
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}

/// `.pdf` files directly inside `dir`, sorted by name
fn pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| DocQaError::Io {
        source: e,
        context: format!("Failed to read directory: {}", dir.display()),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| DocQaError::Io {
                source: e,
                context: format!("Failed to read directory entry in {}", dir.display()),
            })?
            .path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if path.is_file() && is_pdf {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_name_strips_directories() {
        assert_eq!(document_name("uploads/2024/A.pdf").unwrap(), "A.pdf");
        assert_eq!(document_name("A.pdf").unwrap(), "A.pdf");
        assert!(document_name("").is_err());
        assert!(document_name("..").is_err());
    }

    #[test]
    fn test_pdf_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let files = pdf_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }
}
