//! Background scheduler that publishes due posts
//!
//! The scheduler owns one tokio task. Each tick it scans the queue for
//! records whose scheduled time has passed, publishes each to all of its
//! platforms concurrently and archives it with the per-platform results. A
//! record is taken out of the queue before publishing starts, so it is
//! published at most once and is consumed by the scan that
//! picks it up whatever the outcome; failures are visible in the posting
//! history, not retried.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::SchedulingConfig;
use crate::error::Result;
use crate::platforms::PublisherRegistry;
use crate::queue::posted::{PostedEntry, PostedStore};
use crate::queue::QueueStore;
use crate::service::events::{Event, EventBus};
use crate::types::PostRecord;

/// Outcome of one scan pass
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Records published and archived during the pass
    pub posted: Vec<PostedEntry>,
    /// Records that could not be archived, with the reason; they stay queued
    pub failed: Vec<(String, String)>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.posted.is_empty() && self.failed.is_empty()
    }
}

struct ScanContext {
    queue: Arc<QueueStore>,
    posted: Arc<PostedStore>,
    registry: Arc<PublisherRegistry>,
    events: EventBus,
    default_platforms: Vec<String>,
}

struct RunningTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    context: Arc<ScanContext>,
    interval: Duration,
    task: Mutex<Option<RunningTask>>,
}

impl Scheduler {
    pub fn new(
        queue: Arc<QueueStore>,
        posted: Arc<PostedStore>,
        registry: Arc<PublisherRegistry>,
        events: EventBus,
        settings: &SchedulingConfig,
    ) -> Self {
        Self {
            context: Arc::new(ScanContext {
                queue,
                posted,
                registry,
                events,
                default_platforms: settings.default_platforms.clone(),
            }),
            interval: Duration::from_secs(settings.poll_interval.max(1)),
            task: Mutex::new(None),
        }
    }

    /// Override the scan interval (takes effect on the next start)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the scan loop; a no-op when already running
    ///
    /// The first scan happens immediately. Must be called from within a
    /// tokio runtime.
    pub fn start(&self) {
        let mut task = self.task_slot();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            tracing::debug!("Scheduler already running");
            return;
        }

        let (stop, mut stopped) = watch::channel(false);
        let context = Arc::clone(&self.context);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        context.scan(Utc::now()).await;
                    }
                }
            }

            tracing::debug!("Scheduler loop exited");
        });

        *task = Some(RunningTask { stop, handle });
        drop(task);

        tracing::info!("Scheduler started (interval {}s)", period.as_secs());
        self.context.events.emit(Event::SchedulerStarted {
            interval_secs: period.as_secs(),
        });
    }

    /// Stop scheduling new scans and wait for the loop to exit
    ///
    /// A scan already in progress runs to completion. A no-op when stopped.
    pub async fn stop(&self) {
        let Some(task) = self.task_slot().take() else {
            return;
        };

        let _ = task.stop.send(true);
        if let Err(e) = task.handle.await {
            tracing::warn!("Scheduler task ended abnormally: {}", e);
        }

        tracing::info!("Scheduler stopped");
        self.context.events.emit(Event::SchedulerStopped);
    }

    pub fn is_running(&self) -> bool {
        self.task_slot()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Perform a single scan as if the clock read `now`
    pub async fn run_once(&self, now: DateTime<Utc>) -> ScanReport {
        self.context.scan(now).await
    }

    /// Claim a queued record, publish it now and archive it
    ///
    /// Returns `None` when the record is no longer queued, e.g. because a
    /// scan or another caller claimed it first.
    pub async fn publish_queued(&self, id: &str) -> Result<Option<PostedEntry>> {
        self.context.publish_queued(id).await
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<RunningTask>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScanContext {
    async fn scan(&self, now: DateTime<Utc>) -> ScanReport {
        let due = self.queue.due(now);
        let mut report = ScanReport::default();
        if due.is_empty() {
            tracing::trace!("No posts due");
            return report;
        }

        tracing::info!("Found {} post(s) due", due.len());

        for id in due.into_iter().map(|r| r.id) {
            match self.publish_queued(&id).await {
                Ok(Some(entry)) => report.posted.push(entry),
                Ok(None) => tracing::debug!(id = %id, "Post already claimed, skipping"),
                Err(e) => {
                    tracing::error!(id = %id, "Failed to archive post: {}", e);
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        report
    }

    /// Take the record out of the queue before anything is published
    ///
    /// The claim runs under the queue lock, so concurrent callers cannot
    /// both win it and later edits of the record see `NotFound`.
    async fn publish_queued(&self, id: &str) -> Result<Option<PostedEntry>> {
        let Some(record) = self.queue.take(id)? else {
            return Ok(None);
        };
        self.publish(record).await.map(Some)
    }

    async fn publish(&self, record: PostRecord) -> Result<PostedEntry> {
        let id = record.id.clone();
        let platforms = if record.platforms.is_empty() {
            self.default_platforms.clone()
        } else {
            record.platforms.clone()
        };

        self.events.emit(Event::PublishStarted {
            post_id: id.clone(),
            platforms: platforms.clone(),
        });

        let results = self
            .registry
            .publish_all(&platforms, &record.full_text, record.media_path.as_deref())
            .await;

        for result in &results {
            self.events.emit(Event::PlatformPublished {
                post_id: id.clone(),
                result: result.clone(),
            });
        }

        let entry = match self.posted.archive(record.clone(), results) {
            Ok(entry) => entry,
            Err(e) => {
                if let Err(requeue) = self.queue.append(record) {
                    tracing::error!(id = %id, "Could not requeue post: {}", requeue);
                }
                return Err(e);
            }
        };

        self.events.emit(Event::PostArchived {
            post_id: id,
            results: entry.results.clone(),
        });
        Ok(entry)
    }
}
