//! Archive of published posts
//!
//! Media of a fired record is moved into the posted directory (same file
//! name) and an entry with the per-platform results is appended to
//! `posted.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::json_file;
use crate::error::StorageError;
use crate::types::{PlatformResult, PostRecord};
use crate::Result;

pub const HISTORY_FILE: &str = "posted.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedEntry {
    pub record: PostRecord,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub results: Vec<PlatformResult>,
}

impl PostedEntry {
    pub fn succeeded_on(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.platform.as_str())
    }

    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.success)
    }
}

#[derive(Debug)]
pub struct PostedStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl PostedStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(StorageError::from)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn history_file(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move the record's media here and append a history entry
    ///
    /// The archived record's `media_path` points at the new location. A
    /// media file that cannot be moved is logged and left where it is; the
    /// history entry is written regardless.
    pub fn archive(&self, mut record: PostRecord, results: Vec<PlatformResult>) -> Result<PostedEntry> {
        if let Some(media) = record.media_path.take() {
            record.media_path = Some(self.relocate(&media));
        }

        let entry = PostedEntry {
            record,
            posted_at: Utc::now(),
            results,
        };

        let _guard = self.guard();
        let mut history: Vec<PostedEntry> = json_file::read_or_default(&self.history_file(), "posting history");
        history.push(entry.clone());
        json_file::write_atomic(&self.history_file(), &history, "posting history")?;

        tracing::info!(id = %entry.record.id, "Archived post");
        Ok(entry)
    }

    fn relocate(&self, media: &Path) -> PathBuf {
        let Some(name) = media.file_name() else {
            return media.to_path_buf();
        };
        if !media.exists() {
            tracing::warn!("Media {} vanished before archiving", media.display());
            return media.to_path_buf();
        }

        let dest = self.dir.join(name);
        match json_file::move_file(media, &dest) {
            Ok(()) => dest,
            Err(e) => {
                tracing::warn!("Could not move {} to {}: {}", media.display(), dest.display(), e);
                media.to_path_buf()
            }
        }
    }

    /// Archived entries, oldest first
    pub fn history(&self) -> Vec<PostedEntry> {
        let _guard = self.guard();
        json_file::read_or_default(&self.history_file(), "posting history")
    }
}
