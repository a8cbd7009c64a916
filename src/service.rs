//! Process-wide document service
//!
//! One [`KnowledgeIndex`] behind a tokio `RwLock` is shared by every request.
//! Queries take the read lock only for the coarse search; ingestion takes the
//! write lock only for the final extend-and-persist step.

use crate::chunking::{Chunker, ChunkingPolicy, TextTokenizer};
use crate::config::Config;
use crate::embedding::{BatchEmbedder, EmbeddingProvider, FastEmbedProvider};
use crate::error::Result;
use crate::extract::{DocumentExtractor, PdfExtractor};
use crate::index::{DocumentSummary, KnowledgeIndex};
use crate::ingestion::{DirectoryReport, IngestOutcome, Ingestor};
use crate::retrieval::{FastEmbedReranker, QueryOutcome, QueryResults, Reranker, Searcher};
use crate::storage::{IndexPersistence, StorageManager, StorageStats};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub const NO_DOCUMENTS_MESSAGE: &str = "No documents indexed yet.";
pub const NO_TEXT_MESSAGE: &str = "No extractable text found.";

/// Model and extraction backends the service runs on
#[derive(Clone)]
pub struct ServiceBackends {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub tokenizer: Arc<dyn TextTokenizer>,
    pub reranker: Arc<dyn Reranker>,
    pub extractor: Arc<dyn DocumentExtractor>,
}

impl ServiceBackends {
    /// fastembed models named in `config` plus PDF extraction
    ///
    /// Downloads the models on first use.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = FastEmbedProvider::new(&config.embedding.model)?;
        let tokenizer = provider.tokenizer();
        let reranker = FastEmbedReranker::new(&config.retrieval.reranker_model)?;

        Ok(Self {
            embedder: Arc::new(provider),
            tokenizer: Arc::new(tokenizer),
            reranker: Arc::new(reranker),
            extractor: Arc::new(PdfExtractor),
        })
    }
}

/// Response to `POST /upload`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Indexed {
        message: String,
        chunks_added: usize,
        total_vectors: usize,
    },
    NoText {
        message: String,
    },
}

impl From<IngestOutcome> for UploadResponse {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Indexed {
                document,
                chunks_added,
                total_vectors,
            } => UploadResponse::Indexed {
                message: format!("{} uploaded and indexed successfully.", document),
                chunks_added,
                total_vectors,
            },
            IngestOutcome::NoExtractableText { .. } => UploadResponse::NoText {
                message: NO_TEXT_MESSAGE.to_string(),
            },
        }
    }
}

/// Response to `POST /query`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Results(QueryResults),
    NoDocuments { message: String },
}

impl From<QueryOutcome> for QueryResponse {
    fn from(outcome: QueryOutcome) -> Self {
        match outcome {
            QueryOutcome::Answered(results) => QueryResponse::Results(results),
            QueryOutcome::NoDocuments => QueryResponse::NoDocuments {
                message: NO_DOCUMENTS_MESSAGE.to_string(),
            },
        }
    }
}

/// Snapshot for `GET /stats` and `docqa stats`
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_vectors: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub reranker_model: String,
    pub needs_reconcile: bool,
    pub documents: Vec<DocumentSummary>,
    pub storage: StorageStats,
}

#[derive(Clone)]
pub struct DocumentService {
    config: Config,
    storage: StorageManager,
    index: Arc<RwLock<KnowledgeIndex>>,
    backends: ServiceBackends,
    searcher: Searcher,
    ingestor: Ingestor,
}

impl DocumentService {
    /// Open the persisted index from the configured data directory
    pub fn open(config: Config, backends: ServiceBackends) -> Result<Self> {
        let storage = StorageManager::new(&config)?;
        let persistence = Box::new(storage.persistence());
        Self::with_persistence(config, backends, storage, persistence)
    }

    /// Open with an explicit persistence backend
    pub fn with_persistence(
        config: Config,
        backends: ServiceBackends,
        storage: StorageManager,
        persistence: Box<dyn IndexPersistence>,
    ) -> Result<Self> {
        let index = KnowledgeIndex::open(persistence, backends.embedder.dimension())?;
        let index = Arc::new(RwLock::new(index));

        let embedder = BatchEmbedder::new(backends.embedder.clone(), config.embedding.batch_size);
        let searcher = Searcher::new(
            embedder.clone(),
            backends.reranker.clone(),
            index.clone(),
            config.retrieval.clone(),
        );
        let ingestor = Ingestor::new(embedder, backends.extractor.clone(), index.clone());

        info!(
            model = backends.embedder.model_name(),
            reranker = backends.reranker.model_name(),
            "Document service ready"
        );

        Ok(Self {
            config,
            storage,
            index,
            backends,
            searcher,
            ingestor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Chunker for `policy` using the embedding model's tokenizer
    pub fn chunker(&self, policy: ChunkingPolicy) -> Chunker {
        Chunker::from_config(
            policy,
            &self.config.chunking,
            self.backends.tokenizer.clone(),
        )
    }

    /// Ingest one uploaded document with the upload chunking policy
    pub async fn upload(&self, file_name: &str, data: Vec<u8>) -> Result<IngestOutcome> {
        let chunker = self.chunker(self.config.chunking.upload_policy);
        self.ingestor
            .ingest_upload(file_name, data, &chunker, &self.storage)
            .await
    }

    /// Ingest every PDF in `dir`
    ///
    /// `policy` defaults to the configured batch policy.
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        policy: Option<ChunkingPolicy>,
        rebuild: bool,
    ) -> Result<DirectoryReport> {
        let chunker = self.chunker(policy.unwrap_or(self.config.chunking.batch_policy));
        self.ingestor.ingest_directory(dir, &chunker, rebuild).await
    }

    pub async fn query(&self, question: &str) -> Result<QueryOutcome> {
        self.searcher.search(question).await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let (total_vectors, dimension, needs_reconcile, documents) = {
            let index = self.index.read().await;
            (
                index.len(),
                index.dimension(),
                index.needs_reconcile(),
                index.documents(),
            )
        };

        Ok(IndexStats {
            total_vectors,
            dimension,
            embedding_model: self.backends.embedder.model_name().to_string(),
            reranker_model: self.backends.reranker.model_name().to_string(),
            needs_reconcile,
            documents,
            storage: self.storage.stats()?,
        })
    }
}
