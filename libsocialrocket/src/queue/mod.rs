//! Persistent post queue
//!
//! The queue directory owns three kinds of files:
//! - `queue.json`: every pending [`PostRecord`], sorted by scheduled time
//! - `<id><ext>`: the media copy belonging to a queued record
//! - creative library copies (see [`crate::library`])
//!
//! Every mutation is a load → mutate → save unit performed under the store's
//! mutex, so the scheduler task and foreground callers never interleave
//! partial updates. Saves are atomic (temp file + rename).
//!
//! `queue.json` is decoded one record at a time: a record that does not
//! decode is logged, left out of [`QueueStore::load`] and written back
//! unchanged on the next save.

pub(crate) mod json_file;
pub mod posted;

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::StorageError;
use crate::types::PostRecord;
use crate::Result;

pub use posted::{PostedEntry, PostedStore};

pub const QUEUE_FILE: &str = "queue.json";

#[derive(Debug)]
pub struct QueueStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl QueueStore {
    /// Open (and create if needed) the queue directory
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

    pub fn queue_file(&self) -> PathBuf {
        self.dir.join(QUEUE_FILE)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All pending records, ascending by scheduled time
    ///
    /// A missing or unreadable queue file yields an empty queue.
    pub fn load(&self) -> Vec<PostRecord> {
        let _guard = self.guard();
        self.load_unlocked()
    }

    fn load_unlocked(&self) -> Vec<PostRecord> {
        let (mut records, _) = json_file::read_entries::<PostRecord>(&self.queue_file(), "queue");
        records.sort_by_key(|r| r.scheduled_time);
        records
    }

    /// Replace the whole queue
    pub fn save(&self, records: Vec<PostRecord>) -> Result<()> {
        let _guard = self.guard();
        self.save_unlocked(records)
    }

    fn save_unlocked(&self, mut records: Vec<PostRecord>) -> Result<()> {
        for record in &mut records {
            record.refresh_full_text();
        }
        records.sort_by_key(|r| r.scheduled_time);

        // Entries this version cannot read are carried over as they are
        let path = self.queue_file();
        let (_, unreadable) = json_file::read_entries::<PostRecord>(&path, "queue");
        let mut document = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|source| StorageError::Serialize { what: "queue", source })?;
        document.extend(unreadable);

        json_file::write_atomic(&path, &document, "queue")?;
        Ok(())
    }

    /// Run `f` against the loaded queue and persist the result
    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<PostRecord>) -> Result<T>) -> Result<T> {
        let _guard = self.guard();
        let mut records = self.load_unlocked();
        let out = f(&mut records)?;
        self.save_unlocked(records)?;
        Ok(out)
    }

    pub fn append(&self, record: PostRecord) -> Result<()> {
        tracing::debug!(id = %record.id, scheduled = %record.scheduled_time, "Queueing post");
        self.mutate(|records| {
            records.push(record);
            Ok(())
        })
    }

    /// Append several records in one save
    pub fn append_all(&self, new_records: Vec<PostRecord>) -> Result<()> {
        self.mutate(|records| {
            records.extend(new_records);
            Ok(())
        })
    }

    pub fn get(&self, id: &str) -> Option<PostRecord> {
        self.load().into_iter().find(|r| r.id == id)
    }

    /// Apply `mutator` to the record with `id` and return the updated copy
    pub fn update<F>(&self, id: &str, mutator: F) -> Result<PostRecord>
    where
        F: FnOnce(&mut PostRecord),
    {
        self.mutate(|records| {
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
            mutator(record);
            record.refresh_full_text();
            Ok(record.clone())
        })
    }

    /// Delete a record and its owned media file
    ///
    /// A media file that is already gone is not an error.
    pub fn remove(&self, id: &str) -> Result<PostRecord> {
        let record = self.mutate(|records| {
            let index = records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
            Ok(records.remove(index))
        })?;

        if let Some(media) = &record.media_path {
            match fs::remove_file(media) {
                Ok(()) => tracing::debug!("Deleted media {}", media.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not delete media {}: {}", media.display(), e),
            }
        }

        Ok(record)
    }

    /// Take a record out of the queue without touching its media
    ///
    /// Returns `None` when the record is no longer queued.
    pub fn take(&self, id: &str) -> Result<Option<PostRecord>> {
        self.mutate(|records| {
            Ok(records
                .iter()
                .position(|r| r.id == id)
                .map(|index| records.remove(index)))
        })
    }

    /// Records with `scheduled_time <= now`, oldest first
    pub fn due(&self, now: DateTime<Utc>) -> Vec<PostRecord> {
        self.load().into_iter().filter(|r| r.is_due(now)).collect()
    }

    /// Records scheduled on a local calendar date
    pub fn on_date(&self, date: NaiveDate) -> Vec<PostRecord> {
        self.load()
            .into_iter()
            .filter(|r| r.scheduled_time.with_timezone(&Local).date_naive() == date)
            .collect()
    }

    /// Copy media into the queue directory as `<id><.ext>`
    pub fn import_media(&self, id: &str, source: &Path) -> Result<PathBuf> {
        let file_name = match source.extension() {
            Some(ext) => format!("{}.{}", id, ext.to_string_lossy()),
            None => id.to_string(),
        };
        let dest = self.dir.join(file_name);
        fs::copy(source, &dest).map_err(StorageError::from)?;
        Ok(dest)
    }
}
