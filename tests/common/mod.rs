//! Deterministic stand-ins for the model and PDF backends
#![allow(dead_code)]

use docqa::chunking::TextTokenizer;
use docqa::config::Config;
use docqa::embedding::{EmbeddingError, EmbeddingProvider};
use docqa::error::{DocQaError, Result};
use docqa::extract::{DocumentExtractor, PageText};
use docqa::index::{MetadataStore, VectorIndex};
use docqa::retrieval::{RerankError, Reranker};
use docqa::service::{DocumentService, ServiceBackends};
use docqa::storage::{IndexPersistence, StorageManager};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const DIMENSION: usize = 64;

/// Lowercased alphanumeric words
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whitespace tokenizer with a growing vocabulary
#[derive(Default)]
pub struct WordTokenizer {
    vocab: Mutex<Vec<String>>,
}

impl TextTokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> std::result::Result<Vec<u32>, EmbeddingError> {
        let mut vocab = self.vocab.lock().unwrap();
        Ok(text
            .split_whitespace()
            .map(|word| match vocab.iter().position(|w| w == word) {
                Some(id) => id as u32,
                None => {
                    vocab.push(word.to_string());
                    (vocab.len() - 1) as u32
                }
            })
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> std::result::Result<String, EmbeddingError> {
        let vocab = self.vocab.lock().unwrap();
        Ok(ids
            .iter()
            .map(|&id| vocab[id as usize].as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// Bag-of-words counts hashed into `DIMENSION` buckets
///
/// Vectors are deliberately not normalized; the embedder must do it.
pub struct HashEmbedder;

impl HashEmbedder {
    fn bucket(word: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % (DIMENSION as u64 - 1)) as usize
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0; DIMENSION];
        for word in words(text) {
            vector[Self::bucket(&word)] += 3.0;
        }
        // Keeps blank text off the zero vector.
        vector[DIMENSION - 1] = 0.5;
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

/// Scores a candidate by how many distinct query words it contains
pub struct OverlapReranker;

impl Reranker for OverlapReranker {
    fn score(
        &self,
        query: &str,
        candidates: &[String],
    ) -> std::result::Result<Vec<f32>, RerankError> {
        let query: HashSet<String> = words(query).into_iter().collect();
        Ok(candidates
            .iter()
            .map(|text| {
                let text: HashSet<String> = words(text).into_iter().collect();
                query.intersection(&text).count() as f32
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "word-overlap"
    }
}

/// Reads documents built by [`fake_pdf`]
///
/// Pages follow the header line, separated by form feeds. A body starting
/// with `BROKEN` fails extraction and one starting with `PANIC` panics, the
/// way a parser bug in a real extractor would.
pub struct FakePdfExtractor;

impl DocumentExtractor for FakePdfExtractor {
    fn extract(&self, document: &str, data: &[u8]) -> Result<Vec<PageText>> {
        let content = String::from_utf8_lossy(data);
        let body = content.split_once('\n').map(|(_, body)| body).unwrap_or("");

        if body.starts_with("PANIC") {
            panic!("malformed cross-reference table");
        }

        if body.starts_with("BROKEN") {
            return Err(DocQaError::Extraction {
                document: document.to_string(),
                message: "unreadable content stream".to_string(),
            });
        }

        Ok(body
            .split('\x0c')
            .enumerate()
            .map(|(i, text)| PageText {
                page_number: i as u32 + 1,
                text: text.to_string(),
            })
            .collect())
    }
}

/// A document [`FakePdfExtractor`] understands
pub fn fake_pdf(pages: &[&str]) -> Vec<u8> {
    format!("%PDF-1.4\n{}", pages.join("\x0c")).into_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Succeed,
    /// Save fails with the previous files intact
    Fail,
    /// Save fails leaving the files out of step
    Diverge,
}

/// In-memory persistence whose saves can be made to fail
#[derive(Clone)]
pub struct SwitchPersistence {
    mode: Arc<Mutex<SaveMode>>,
    saves: Arc<Mutex<usize>>,
}

impl SwitchPersistence {
    pub fn new() -> Self {
        Self {
            mode: Arc::new(Mutex::new(SaveMode::Succeed)),
            saves: Arc::new(Mutex::new(0)),
        }
    }

    pub fn set_mode(&self, mode: SaveMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl IndexPersistence for SwitchPersistence {
    fn load(&self) -> Result<Option<(VectorIndex, MetadataStore)>> {
        Ok(None)
    }

    fn save(&self, _vectors: &VectorIndex, _metadata: &MetadataStore) -> Result<()> {
        match *self.mode.lock().unwrap() {
            SaveMode::Succeed => {
                *self.saves.lock().unwrap() += 1;
                Ok(())
            }
            SaveMode::Fail => Err(DocQaError::PersistenceFailure(
                "disk full".to_string(),
            )),
            SaveMode::Diverge => Err(DocQaError::ConsistencyViolation(
                "metadata rename failed after index swap".to_string(),
            )),
        }
    }
}

/// Small windows and short sentences so a few words make a chunk
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.chunking.chunk_size = 8;
    config.chunking.overlap = 2;
    config.chunking.min_tokens = 3;
    config.chunking.min_sentence_chars = 10;
    config.retrieval.top_k = 10;
    config.retrieval.top_n = 3;
    config.retrieval.snippet_chars = 40;
    config
}

pub fn test_backends() -> ServiceBackends {
    ServiceBackends {
        embedder: Arc::new(HashEmbedder),
        tokenizer: Arc::new(WordTokenizer::default()),
        reranker: Arc::new(OverlapReranker),
        extractor: Arc::new(FakePdfExtractor),
    }
}

/// Service persisting to files under `dir`
pub fn open_service(dir: &TempDir) -> DocumentService {
    DocumentService::open(test_config(dir), test_backends()).unwrap()
}

/// Service whose saves are controlled by the returned switch
pub fn switched_service(dir: &TempDir) -> (DocumentService, SwitchPersistence) {
    let config = test_config(dir);
    let storage = StorageManager::new(&config).unwrap();
    let persistence = SwitchPersistence::new();
    let service = DocumentService::with_persistence(
        config,
        test_backends(),
        storage,
        Box::new(persistence.clone()),
    )
    .unwrap();
    (service, persistence)
}
