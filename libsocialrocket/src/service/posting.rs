//! Posting service: queue lifecycle and immediate publishing
//!
//! Everything that creates, changes or publishes a post goes through here so
//! validation happens once, before the queue file is touched.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::events::{Event, EventBus};
use super::validation::{normalize_platforms, require_future, require_media};
use crate::error::StorageError;
use crate::platforms::PublisherRegistry;
use crate::queue::{PostedEntry, QueueStore};
use crate::scheduler::Scheduler;
use crate::types::{compose_full_text, new_post_id, PlatformResult, PostRecord};
use crate::{Result, RocketError};

/// Request to queue one post per scheduled time
#[derive(Debug, Clone, Default)]
pub struct ScheduleRequest {
    pub media: PathBuf,
    pub caption: String,
    pub hashtags: String,
    pub keywords: String,
    pub platforms: Vec<String>,
    pub times: Vec<DateTime<Utc>>,
}

/// Fields to change on a queued post; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub caption: Option<String>,
    pub hashtags: Option<String>,
    pub keywords: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Request to publish immediately without queueing
#[derive(Debug, Clone, Default)]
pub struct PostNowRequest {
    pub media: PathBuf,
    pub caption: String,
    pub hashtags: String,
    pub platforms: Vec<String>,
}

#[derive(Clone)]
pub struct PostingService {
    queue: Arc<QueueStore>,
    registry: Arc<PublisherRegistry>,
    scheduler: Arc<Scheduler>,
    event_bus: EventBus,
}

impl PostingService {
    pub fn new(
        queue: Arc<QueueStore>,
        registry: Arc<PublisherRegistry>,
        scheduler: Arc<Scheduler>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            queue,
            registry,
            scheduler,
            event_bus,
        }
    }

    /// Validate and queue one record per requested time
    ///
    /// Each record gets its own copy of the media in the queue directory.
    /// Nothing is queued if any check fails.
    pub fn schedule(&self, request: ScheduleRequest) -> Result<Vec<PostRecord>> {
        require_media(&request.media)?;
        let platforms = normalize_platforms(&request.platforms)?;
        if request.times.is_empty() {
            return Err(RocketError::InvalidInput(
                "No scheduled time given".to_string(),
            ));
        }
        let now = Utc::now();
        for time in &request.times {
            require_future(*time, now)?;
        }

        let mut records = Vec::with_capacity(request.times.len());
        for time in &request.times {
            let mut record = PostRecord::new(
                request.caption.clone(),
                request.hashtags.clone(),
                request.keywords.clone(),
                platforms.clone(),
                *time,
            );
            match self.queue.import_media(&record.id, &request.media) {
                Ok(path) => record.media_path = Some(path),
                Err(e) => {
                    discard_media(&records);
                    return Err(e);
                }
            }
            records.push(record);
        }

        if let Err(e) = self.queue.append_all(records.clone()) {
            discard_media(&records);
            return Err(e);
        }

        info!(
            "Scheduled {} post(s) to {}",
            records.len(),
            platforms.join(", ")
        );
        Ok(records)
    }

    /// Apply an edit to a queued record
    pub fn edit(&self, id: &str, edit: PostEdit) -> Result<PostRecord> {
        if let Some(time) = edit.scheduled_time {
            require_future(time, Utc::now())?;
        }
        let platforms = edit
            .platforms
            .as_deref()
            .map(normalize_platforms)
            .transpose()?;

        let record = self.queue.update(id, |record| {
            if let Some(caption) = edit.caption {
                record.caption = caption;
            }
            if let Some(hashtags) = edit.hashtags {
                record.hashtags = hashtags;
            }
            if let Some(keywords) = edit.keywords {
                record.keywords = keywords;
            }
            if let Some(platforms) = platforms {
                record.platforms = platforms;
            }
            if let Some(time) = edit.scheduled_time {
                record.scheduled_time = time;
            }
        })?;

        info!(id = %id, "Updated queued post");
        Ok(record)
    }

    /// Delete a queued record and its media copy
    pub fn remove(&self, id: &str) -> Result<PostRecord> {
        let record = self.queue.remove(id)?;
        info!(id = %id, "Removed post from queue");
        Ok(record)
    }

    /// Publish in-hand content to every selected platform right away
    ///
    /// The post is not queued or archived; per-platform outcomes are
    /// returned and emitted as events.
    pub async fn post_now(&self, request: PostNowRequest) -> Result<Vec<PlatformResult>> {
        let platforms = normalize_platforms(&request.platforms)?;
        require_media(&request.media)?;

        let post_id = new_post_id();
        let text = compose_full_text(&request.caption, &request.hashtags);

        self.event_bus.emit(Event::PublishStarted {
            post_id: post_id.clone(),
            platforms: platforms.clone(),
        });

        let results = self
            .registry
            .publish_all(&platforms, &text, Some(request.media.as_path()))
            .await;

        for result in &results {
            self.event_bus.emit(Event::PlatformPublished {
                post_id: post_id.clone(),
                result: result.clone(),
            });
        }

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!("{} of {} platform(s) failed", failed, results.len());
        }
        Ok(results)
    }

    /// Publish a queued record now instead of waiting for its time
    pub async fn publish_queued_now(&self, id: &str) -> Result<PostedEntry> {
        self.scheduler
            .publish_queued(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()).into())
    }
}

fn discard_media(records: &[PostRecord]) {
    for path in records.iter().filter_map(|r| r.media_path.as_ref()) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Could not clean up {}: {}", path.display(), e);
        }
    }
}
