//! Durable two-file persistence for the vector index and its metadata
//!
//! The index file and the metadata file must always describe the same chunk
//! set. A save writes both to temporaries, then renames them into place. If
//! the second rename fails the first file is restored from a backup taken
//! before the swap, so a failed save leaves the previous pair on disk.
//!
//! A save cut short by a crash is finished or rolled back on the next load:
//! a staged metadata temporary still present means the metadata rename never
//! happened, so the index is restored from its backup.

use crate::error::{DocQaError, Result};
use crate::index::{MetadataStore, VectorIndex};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Loads and saves the index/metadata pair
///
/// `save` either replaces both files or returns an error:
/// - `PersistenceFailure` when the previous pair is still intact on disk
/// - `ConsistencyViolation` when the files may now disagree
pub trait IndexPersistence: Send + Sync {
    /// Previously saved state, or `None` on first run
    fn load(&self) -> Result<Option<(VectorIndex, MetadataStore)>>;

    fn save(&self, vectors: &VectorIndex, metadata: &MetadataStore) -> Result<()>;
}

/// Persistence to an index file and a JSON metadata file
#[derive(Debug, Clone)]
pub struct FilePersistence {
    index_path: PathBuf,
    metadata_path: PathBuf,
}

impl FilePersistence {
    pub fn new(index_path: PathBuf, metadata_path: PathBuf) -> Self {
        Self {
            index_path,
            metadata_path,
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    fn restore_index(&self, backup: Option<&Path>) -> std::io::Result<()> {
        match backup {
            Some(backup) => fs::rename(backup, &self.index_path),
            None => fs::remove_file(&self.index_path),
        }
    }

    /// Undo or finish a save that was interrupted before it cleaned up
    fn recover_interrupted_save(&self) -> Result<()> {
        let backup = sibling(&self.index_path, "bak");
        let index_tmp = sibling(&self.index_path, "tmp");
        let metadata_tmp = sibling(&self.metadata_path, "tmp");
        let backup_tmp = sibling(&backup, "tmp");
        let metadata_pending = metadata_tmp.is_file();

        if backup.is_file() {
            if metadata_pending {
                warn!(
                    "Interrupted save found, restoring index from {}",
                    backup.display()
                );
                fs::rename(&backup, &self.index_path).map_err(|e| DocQaError::Io {
                    source: e,
                    context: format!("Failed to restore index backup: {}", backup.display()),
                })?;
            } else {
                debug!("Removing backup left by a completed save");
                if let Err(e) = fs::remove_file(&backup) {
                    warn!("Failed to remove index backup {}: {}", backup.display(), e);
                }
            }
        } else if metadata_pending && self.index_path.is_file() && !self.metadata_path.exists() {
            warn!(
                "Interrupted first save found, removing {}",
                self.index_path.display()
            );
            fs::remove_file(&self.index_path).map_err(|e| DocQaError::Io {
                source: e,
                context: format!(
                    "Failed to remove partial index file: {}",
                    self.index_path.display()
                ),
            })?;
        }

        for stale in [&index_tmp, &metadata_tmp, &backup_tmp] {
            if stale.is_file() {
                warn!("Removing stale temporary file {}", stale.display());
                if let Err(e) = fs::remove_file(stale) {
                    warn!("Failed to remove {}: {}", stale.display(), e);
                }
            }
        }

        Ok(())
    }
}

impl IndexPersistence for FilePersistence {
    fn load(&self) -> Result<Option<(VectorIndex, MetadataStore)>> {
        self.recover_interrupted_save()?;

        let index_exists = self.index_path.exists();
        let metadata_exists = self.metadata_path.exists();

        match (index_exists, metadata_exists) {
            (false, false) => return Ok(None),
            (true, false) | (false, true) => {
                let (present, missing) = if index_exists {
                    (&self.index_path, &self.metadata_path)
                } else {
                    (&self.metadata_path, &self.index_path)
                };
                return Err(DocQaError::ConsistencyViolation(format!(
                    "{} exists but {} is missing",
                    present.display(),
                    missing.display()
                )));
            }
            (true, true) => {}
        }

        let bytes = fs::read(&self.index_path).map_err(|e| DocQaError::Io {
            source: e,
            context: format!("Failed to read index file: {}", self.index_path.display()),
        })?;
        let vectors = VectorIndex::from_bytes(&bytes)?;

        let json = fs::read_to_string(&self.metadata_path).map_err(|e| DocQaError::Io {
            source: e,
            context: format!(
                "Failed to read metadata file: {}",
                self.metadata_path.display()
            ),
        })?;
        let metadata = MetadataStore::from_json(&json)?;

        debug!(
            vectors = vectors.len(),
            records = metadata.len(),
            "Loaded persisted index"
        );

        Ok(Some((vectors, metadata)))
    }

    fn save(&self, vectors: &VectorIndex, metadata: &MetadataStore) -> Result<()> {
        let index_bytes = vectors.to_bytes();
        let metadata_json = metadata.to_json()?;

        let index_tmp = sibling(&self.index_path, "tmp");
        let metadata_tmp = sibling(&self.metadata_path, "tmp");

        let staged = write_synced(&index_tmp, &index_bytes)
            .and_then(|_| write_synced(&metadata_tmp, metadata_json.as_bytes()));
        if let Err(e) = staged {
            let _ = fs::remove_file(&index_tmp);
            let _ = fs::remove_file(&metadata_tmp);
            return Err(DocQaError::PersistenceFailure(format!(
                "Failed to stage index files: {}",
                e
            )));
        }

        let backup = if self.index_path.exists() {
            let backup = sibling(&self.index_path, "bak");
            if let Err(e) = copy_synced(&self.index_path, &backup) {
                let _ = fs::remove_file(&index_tmp);
                let _ = fs::remove_file(&metadata_tmp);
                return Err(DocQaError::PersistenceFailure(format!(
                    "Failed to back up index file: {}",
                    e
                )));
            }
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&index_tmp, &self.index_path) {
            let _ = fs::remove_file(&index_tmp);
            let _ = fs::remove_file(&metadata_tmp);
            if let Some(backup) = &backup {
                let _ = fs::remove_file(backup);
            }
            return Err(DocQaError::PersistenceFailure(format!(
                "Failed to replace index file: {}",
                e
            )));
        }

        if let Err(e) = fs::rename(&metadata_tmp, &self.metadata_path) {
            warn!(
                "Metadata rename failed, restoring previous index file: {}",
                e
            );
            return match self.restore_index(backup.as_deref()) {
                Ok(()) => {
                    let _ = fs::remove_file(&metadata_tmp);
                    Err(DocQaError::PersistenceFailure(format!(
                        "Failed to replace metadata file: {}",
                        e
                    )))
                }
                // The staged metadata stays behind so the next load rolls back.
                Err(restore_err) => {
                    error!(
                        "Index file could not be restored, files on disk disagree: {}",
                        restore_err
                    );
                    Err(DocQaError::ConsistencyViolation(format!(
                        "metadata rename failed ({}) and index restore failed ({})",
                        e, restore_err
                    )))
                }
            };
        }

        if let Some(backup) = backup {
            if let Err(e) = fs::remove_file(&backup) {
                warn!("Failed to remove index backup {}: {}", backup.display(), e);
            }
        }

        Ok(())
    }
}

/// Write `data` to `path` through a synced temporary and an atomic rename
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DocQaError::Io {
            source: e,
            context: format!("Failed to create parent directory: {}", parent.display()),
        })?;
    }

    let temp_path = sibling(path, "tmp");
    write_synced(&temp_path, data).map_err(|e| DocQaError::Io {
        source: e,
        context: format!("Failed to write temp file: {}", temp_path.display()),
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        DocQaError::Io {
            source: e,
            context: format!(
                "Failed to rename temp file to final location: {} -> {}",
                temp_path.display(),
                path.display()
            ),
        }
    })
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Copy `from` to `to` so that `to` is either absent or complete
fn copy_synced(from: &Path, to: &Path) -> std::io::Result<()> {
    let partial = sibling(to, "tmp");
    let copied = fs::copy(from, &partial)
        .and_then(|_| fs::File::open(&partial)?.sync_all())
        .and_then(|_| fs::rename(&partial, to));
    if copied.is_err() {
        let _ = fs::remove_file(&partial);
    }
    copied
}

/// `path` with `.suffix` appended to its file name
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChunkRecord;
    use tempfile::TempDir;

    fn sample() -> (VectorIndex, MetadataStore) {
        let mut vectors = VectorIndex::new(2);
        vectors.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let mut metadata = MetadataStore::new();
        metadata
            .append(vec![
                ChunkRecord::new("A.pdf", 1, "alpha"),
                ChunkRecord::new("A.pdf", 2, "beta"),
            ])
            .unwrap();
        (vectors, metadata)
    }

    /// `sample` plus one more chunk
    fn grown() -> (VectorIndex, MetadataStore) {
        let (mut vectors, mut metadata) = sample();
        vectors.add(&[vec![0.6, 0.8]]).unwrap();
        metadata
            .append(vec![ChunkRecord::new("B.pdf", 1, "gamma")])
            .unwrap();
        (vectors, metadata)
    }

    fn persistence(dir: &TempDir) -> FilePersistence {
        FilePersistence::new(
            dir.path().join("index").join("vectors.idx"),
            dir.path().join("index").join("metadata.json"),
        )
    }

    #[test]
    fn test_first_run_loads_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(persistence(&dir).load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        let store = persistence(&dir);
        let (vectors, metadata) = sample();

        store.save(&vectors, &metadata).unwrap();
        let (loaded_vectors, loaded_metadata) = store.load().unwrap().unwrap();

        assert_eq!(loaded_vectors.len(), 2);
        assert_eq!(loaded_metadata.len(), 2);
        assert_eq!(loaded_metadata.get(1).unwrap().text, "beta");
        assert!(!sibling(store.index_path(), "tmp").exists());
        assert!(!sibling(store.index_path(), "bak").exists());
    }

    #[test]
    fn test_one_file_missing_is_a_violation() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        let store = persistence(&dir);
        let (vectors, metadata) = sample();
        store.save(&vectors, &metadata).unwrap();

        std::fs::remove_file(store.metadata_path()).unwrap();
        assert!(matches!(
            store.load(),
            Err(DocQaError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn test_failed_stage_leaves_previous_pair() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        let store = persistence(&dir);
        let (vectors, metadata) = sample();
        store.save(&vectors, &metadata).unwrap();

        // A directory where the metadata temp file should go makes staging fail.
        std::fs::create_dir_all(sibling(store.metadata_path(), "tmp")).unwrap();

        let (grown, grown_meta) = grown();
        let result = store.save(&grown, &grown_meta);
        assert!(matches!(result, Err(DocQaError::PersistenceFailure(_))));

        let (loaded_vectors, loaded_metadata) = store.load().unwrap().unwrap();
        assert_eq!(loaded_vectors.len(), 2);
        assert_eq!(loaded_metadata.len(), 2);
    }

    #[test]
    fn test_failed_metadata_rename_restores_index() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        let store = persistence(&dir);
        let (vectors, metadata) = sample();
        store.save(&vectors, &metadata).unwrap();
        let previous = std::fs::read(store.index_path()).unwrap();

        // A non-empty directory cannot be replaced by the staged metadata file.
        std::fs::remove_file(store.metadata_path()).unwrap();
        std::fs::create_dir(store.metadata_path()).unwrap();
        std::fs::write(store.metadata_path().join("keep"), b"x").unwrap();

        let (grown, grown_meta) = grown();
        let result = store.save(&grown, &grown_meta);
        assert!(matches!(result, Err(DocQaError::PersistenceFailure(_))));

        assert_eq!(std::fs::read(store.index_path()).unwrap(), previous);
        assert!(!sibling(store.index_path(), "bak").exists());
        assert!(!sibling(store.index_path(), "tmp").exists());
        assert!(!sibling(store.metadata_path(), "tmp").exists());
    }

    #[test]
    fn test_load_rolls_back_save_interrupted_between_renames() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        let store = persistence(&dir);
        let (vectors, metadata) = sample();
        store.save(&vectors, &metadata).unwrap();
        let previous = std::fs::read(store.index_path()).unwrap();

        // On disk after a crash right after the index rename: new index,
        // old metadata, the backup and the staged metadata.
        let (grown, grown_meta) = grown();
        let backup = sibling(store.index_path(), "bak");
        std::fs::copy(store.index_path(), &backup).unwrap();
        std::fs::write(store.index_path(), grown.to_bytes()).unwrap();
        std::fs::write(
            sibling(store.metadata_path(), "tmp"),
            grown_meta.to_json().unwrap(),
        )
        .unwrap();

        let (loaded_vectors, loaded_metadata) = store.load().unwrap().unwrap();
        assert_eq!(loaded_vectors.len(), 2);
        assert_eq!(loaded_metadata.len(), 2);
        assert_eq!(std::fs::read(store.index_path()).unwrap(), previous);
        assert!(!backup.exists());
        assert!(!sibling(store.metadata_path(), "tmp").exists());

        // The recovered pair accepts the next save.
        store.save(&grown, &grown_meta).unwrap();
        let (loaded_vectors, loaded_metadata) = store.load().unwrap().unwrap();
        assert_eq!(loaded_vectors.len(), 3);
        assert_eq!(loaded_metadata.len(), 3);
    }

    #[test]
    fn test_load_keeps_pair_when_only_backup_remains() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        let store = persistence(&dir);
        let (vectors, metadata) = sample();
        store.save(&vectors, &metadata).unwrap();

        // Crash after both renames but before the backup was removed.
        let backup = sibling(store.index_path(), "bak");
        std::fs::copy(store.index_path(), &backup).unwrap();
        let (grown, grown_meta) = grown();
        std::fs::write(store.index_path(), grown.to_bytes()).unwrap();
        std::fs::write(store.metadata_path(), grown_meta.to_json().unwrap()).unwrap();

        let (loaded_vectors, loaded_metadata) = store.load().unwrap().unwrap();
        assert_eq!(loaded_vectors.len(), 3);
        assert_eq!(loaded_metadata.len(), 3);
        assert!(!backup.exists());
    }

    #[test]
    fn test_load_discards_interrupted_first_save() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        let store = persistence(&dir);
        let (vectors, metadata) = sample();

        std::fs::write(store.index_path(), vectors.to_bytes()).unwrap();
        std::fs::write(
            sibling(store.metadata_path(), "tmp"),
            metadata.to_json().unwrap(),
        )
        .unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!store.index_path().exists());
        assert!(!sibling(store.metadata_path(), "tmp").exists());
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uploads").join("doc.pdf");
        write_atomic(&path, b"%PDF-1.4").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
        assert!(!sibling(&path, "tmp").exists());
    }
}
