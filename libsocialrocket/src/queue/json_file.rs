//! JSON documents written with temp file + fsync + rename

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Read a JSON document, treating a missing, empty or corrupt file as `T::default()`
///
/// Corruption is logged at `warn`; the file is left in place so it can be
/// inspected, and the next save replaces it.
pub(crate) fn read_or_default<T>(path: &Path, what: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::warn!("Could not read {} at {}: {}", what, path.display(), e);
            return T::default();
        }
    };

    if content.trim().is_empty() {
        return T::default();
    }

    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(
            "Ignoring unreadable {} at {}: {}",
            what,
            path.display(),
            e
        );
        T::default()
    })
}

/// Read a JSON array element by element
///
/// Elements that do not decode as `T` are logged at `warn` and handed back
/// raw, so a caller can write them back untouched.
pub(crate) fn read_entries<T>(path: &Path, what: &str) -> (Vec<T>, Vec<serde_json::Value>)
where
    T: DeserializeOwned,
{
    let raw: Vec<serde_json::Value> = read_or_default(path, what);
    let mut entries = Vec::with_capacity(raw.len());
    let mut unreadable = Vec::new();

    for value in raw {
        match T::deserialize(&value) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    "Skipping unreadable {} entry in {}: {}",
                    what,
                    path.display(),
                    e
                );
                unreadable.push(value);
            }
        }
    }

    (entries, unreadable)
}

/// Replace `path` atomically with the pretty-printed JSON form of `value`
pub(crate) fn write_atomic<T>(path: &Path, value: &T, what: &'static str) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json =
        serde_json::to_string_pretty(value).map_err(|source| StorageError::Serialize { what, source })?;

    let tmp_path = temp_path(path);
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(json.as_bytes())?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Move a file, falling back to copy + delete when rename crosses devices
pub(crate) fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_and_corrupt_files_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");

        let missing: Vec<String> = read_or_default(&path, "doc");
        assert!(missing.is_empty());

        fs::write(&path, "{ not json").unwrap();
        let corrupt: Vec<String> = read_or_default(&path, "doc");
        assert!(corrupt.is_empty());

        fs::write(&path, "  \n").unwrap();
        let blank: Vec<String> = read_or_default(&path, "doc");
        assert!(blank.is_empty());
    }

    #[test]
    fn test_write_atomic_replaces_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("doc.json");

        write_atomic(&path, &vec!["a".to_string()], "doc").unwrap();
        write_atomic(&path, &vec!["b".to_string(), "c".to_string()], "doc").unwrap();

        let back: Vec<String> = read_or_default(&path, "doc");
        assert_eq!(back, vec!["b", "c"]);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_move_file_creates_destination_dir() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.png");
        let to = temp_dir.path().join("posted").join("a.png");
        fs::write(&from, b"img").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"img");
    }
}
