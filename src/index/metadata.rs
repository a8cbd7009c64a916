/// Chunk records stored parallel to the vector index
use crate::error::{DocQaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Metadata for one indexed chunk
///
/// Created once at ingestion and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: Uuid,
    /// Source document file name
    #[serde(alias = "pdf_name")]
    pub document: String,
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}

impl ChunkRecord {
    /// New record with a fresh random id
    pub fn new(document: impl Into<String>, page_number: u32, text: impl Into<String>) -> Self {
        Self {
            chunk_id: Uuid::new_v4(),
            document: document.into(),
            page_number,
            text: text.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.page_number == 0 {
            return Err(DocQaError::InvalidRecord(format!(
                "chunk {} has page number 0",
                self.chunk_id
            )));
        }
        if self.text.trim().is_empty() {
            return Err(DocQaError::InvalidRecord(format!(
                "chunk {} has empty text",
                self.chunk_id
            )));
        }
        Ok(())
    }
}

/// Append-only ordered sequence of chunk records
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: Vec<ChunkRecord>,
    ids: HashSet<Uuid>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a batch in order
    ///
    /// The whole batch is validated first; a rejected batch appends nothing.
    pub fn append(&mut self, records: Vec<ChunkRecord>) -> Result<()> {
        let mut batch_ids = HashSet::with_capacity(records.len());
        for record in &records {
            record.validate()?;
            if self.ids.contains(&record.chunk_id) || !batch_ids.insert(record.chunk_id) {
                return Err(DocQaError::InvalidRecord(format!(
                    "duplicate chunk id {}",
                    record.chunk_id
                )));
            }
        }

        self.ids.extend(batch_ids);
        self.records.extend(records);
        Ok(())
    }

    /// Record at `index`
    pub fn get(&self, index: usize) -> Result<&ChunkRecord> {
        self.records.get(index).ok_or(DocQaError::OutOfRange {
            index,
            len: self.records.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.records.iter()
    }

    /// Drop every record at or after `len`
    pub fn truncate(&mut self, len: usize) {
        if len >= self.records.len() {
            return;
        }
        for record in self.records.drain(len..) {
            self.ids.remove(&record.chunk_id);
        }
    }

    /// Pretty JSON array, one entry per vector position
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records).map_err(|e| DocQaError::Json {
            source: e,
            context: "Failed to serialize chunk metadata".to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<ChunkRecord> =
            serde_json::from_str(json).map_err(|e| DocQaError::Json {
                source: e,
                context: "Failed to parse chunk metadata".to_string(),
            })?;

        let mut store = Self::new();
        store.append(records)?;
        Ok(store)
    }
}
