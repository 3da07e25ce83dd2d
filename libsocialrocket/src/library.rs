//! Creative library: reusable media kept in the queue directory
//!
//! Imported files are copied to `creative_<8 hex>_<name>` and listed in
//! `creative_library.json`. Posting never consumes a library entry; a post
//! built from one gets its own copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::StorageError;
use crate::queue::json_file;
use crate::types::MediaKind;
use crate::{Result, RocketError};

pub const LIBRARY_FILE: &str = "creative_library.json";

#[derive(Debug)]
pub struct CreativeLibrary {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl CreativeLibrary {
    /// Library rooted in the queue directory
    pub fn open(queue_dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = queue_dir.into();
        fs::create_dir_all(&dir).map_err(StorageError::from)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn library_file(&self) -> PathBuf {
        self.dir.join(LIBRARY_FILE)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persisted entries, including ones whose file has disappeared
    pub fn load(&self) -> Vec<PathBuf> {
        let _guard = self.guard();
        json_file::read_or_default(&self.library_file(), "creative library")
    }

    /// Entries whose file still exists
    pub fn list(&self) -> Vec<PathBuf> {
        self.load().into_iter().filter(|p| p.exists()).collect()
    }

    /// Copy `source` into the library and return the stored path
    ///
    /// Importing a path that is already a library entry returns it unchanged.
    pub fn import(&self, source: &Path) -> Result<PathBuf> {
        if !source.is_file() {
            return Err(RocketError::InvalidInput(format!(
                "Media file not found: {}",
                source.display()
            )));
        }
        if !MediaKind::from_path(source).is_supported() {
            tracing::warn!("Adding unrecognised media type {}", source.display());
        }

        let _guard = self.guard();
        let mut entries: Vec<PathBuf> = json_file::read_or_default(&self.library_file(), "creative library");
        if let Some(existing) = entries.iter().find(|e| e.as_path() == source) {
            return Ok(existing.clone());
        }

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "creative".to_string());
        let tag = &Uuid::new_v4().simple().to_string()[..8];
        let dest = self.dir.join(format!("creative_{}_{}", tag, file_name));

        fs::copy(source, &dest).map_err(StorageError::from)?;
        entries.push(dest.clone());
        json_file::write_atomic(&self.library_file(), &entries, "creative library")?;

        tracing::info!("Added creative: {}", file_name);
        Ok(dest)
    }

    /// Drop an entry and delete its copy; returns whether it was listed
    pub fn remove(&self, path: &Path) -> Result<bool> {
        let _guard = self.guard();
        let mut entries: Vec<PathBuf> = json_file::read_or_default(&self.library_file(), "creative library");
        let before = entries.len();
        entries.retain(|e| e.as_path() != path);
        if entries.len() == before {
            return Ok(false);
        }

        json_file::write_atomic(&self.library_file(), &entries, "creative library")?;
        if path.starts_with(&self.dir) {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not delete {}: {}", path.display(), e);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, CreativeLibrary, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let library = CreativeLibrary::open(temp_dir.path().join("queue")).unwrap();
        let source = temp_dir.path().join("banner.png");
        fs::write(&source, b"png").unwrap();
        (temp_dir, library, source)
    }

    #[test]
    fn test_import_copies_with_prefix() {
        let (_temp, library, source) = setup();
        let stored = library.import(&source).unwrap();

        let name = stored.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("creative_"));
        assert!(name.ends_with("_banner.png"));
        assert_eq!(name.len(), "creative_".len() + 8 + "_banner.png".len());
        assert!(source.exists());
        assert_eq!(library.list(), vec![stored]);
    }

    #[test]
    fn test_import_existing_entry_is_noop() {
        let (_temp, library, source) = setup();
        let stored = library.import(&source).unwrap();
        let again = library.import(&stored).unwrap();

        assert_eq!(again, stored);
        assert_eq!(library.load().len(), 1);
    }

    #[test]
    fn test_import_missing_file() {
        let (temp, library, _) = setup();
        let result = library.import(&temp.path().join("nope.png"));
        assert!(matches!(result, Err(RocketError::InvalidInput(_))));
    }

    #[test]
    fn test_list_skips_vanished_files() {
        let (_temp, library, source) = setup();
        let stored = library.import(&source).unwrap();
        fs::remove_file(&stored).unwrap();

        assert!(library.list().is_empty());
        assert_eq!(library.load().len(), 1);
    }

    #[test]
    fn test_remove_deletes_copy() {
        let (_temp, library, source) = setup();
        let stored = library.import(&source).unwrap();

        assert!(library.remove(&stored).unwrap());
        assert!(!stored.exists());
        assert!(library.load().is_empty());
        assert!(!library.remove(&stored).unwrap());
    }

    #[test]
    fn test_corrupt_library_is_empty() {
        let (_temp, library, _) = setup();
        fs::write(library.library_file(), "not json").unwrap();
        assert!(library.list().is_empty());
    }
}
