//! Storage layer for docqa
//!
//! Owns the data directory layout: the persisted index pair and saved uploads.

pub mod persistence;

use crate::config::Config;
use crate::error::{DocQaError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use persistence::{write_atomic, FilePersistence, IndexPersistence};

/// Resolves and creates the on-disk layout
#[derive(Debug, Clone)]
pub struct StorageManager {
    data_dir: PathBuf,
    index_path: PathBuf,
    metadata_path: PathBuf,
    uploads_dir: PathBuf,
}

impl StorageManager {
    /// Create the data, index and uploads directories
    pub fn new(config: &Config) -> Result<Self> {
        let storage = Self {
            data_dir: crate::config::expand_tilde(&config.storage.data_dir),
            index_path: config.index_path(),
            metadata_path: config.metadata_path(),
            uploads_dir: config.uploads_path(),
        };

        let mut dirs = vec![storage.data_dir.clone(), storage.uploads_dir.clone()];
        dirs.extend(storage.index_path.parent().map(Path::to_path_buf));
        dirs.extend(storage.metadata_path.parent().map(Path::to_path_buf));

        for dir in dirs {
            std::fs::create_dir_all(&dir).map_err(|e| DocQaError::Io {
                source: e,
                context: format!("Failed to create directory: {}", dir.display()),
            })?;
        }

        Ok(storage)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Persistence handle for the index/metadata pair
    pub fn persistence(&self) -> FilePersistence {
        FilePersistence::new(self.index_path.clone(), self.metadata_path.clone())
    }

    /// Save an uploaded document under the uploads directory
    ///
    /// Only the final component of `file_name` is used.
    pub fn save_upload(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| DocQaError::UnsupportedInputType {
                name: file_name.to_string(),
                reason: "missing file name".to_string(),
            })?;

        let path = self.uploads_dir.join(name);
        write_atomic(&path, data)?;
        Ok(path)
    }

    /// Sizes of the persisted files
    pub fn stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            index_size: file_size(&self.index_path)?,
            metadata_size: file_size(&self.metadata_path)?,
            uploads_size: Self::dir_size(&self.uploads_dir)?,
        })
    }

    /// Calculate directory size recursively
    fn dir_size(path: &Path) -> Result<u64> {
        let mut size = 0u64;

        if path.is_dir() {
            for entry in std::fs::read_dir(path).map_err(|e| DocQaError::Io {
                source: e,
                context: format!(
                    "Failed to read directory for size calculation: {}",
                    path.display()
                ),
            })? {
                let entry = entry.map_err(|e| DocQaError::Io {
                    source: e,
                    context: "Failed to read directory entry for size calculation".to_string(),
                })?;
                let path = entry.path();

                if path.is_dir() {
                    size += Self::dir_size(&path)?;
                } else {
                    size += file_size(&path)?;
                }
            }
        }

        Ok(size)
    }
}

fn file_size(path: &Path) -> Result<u64> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(metadata.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(DocQaError::Io {
            source: e,
            context: format!("Failed to get file metadata: {}", path.display()),
        }),
    }
}

/// On-disk sizes in bytes
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StorageStats {
    pub index_size: u64,
    pub metadata_size: u64,
    pub uploads_size: u64,
}

impl StorageStats {
    pub fn total_size(&self) -> u64 {
        self.index_size + self.metadata_size + self.uploads_size
    }

    /// Format size as human-readable string
    pub fn format_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
