//! Service layer for SocialRocket
//!
//! `RocketService` is the single entry point the command-line tools use. It
//! owns the shared stores, the publisher registry, the content generator and
//! the scheduler, and hands background results to its caller through one
//! event channel.
//!
//! - `PostingService`: schedule, edit, remove and publish posts
//! - `validation`: checks applied before anything is persisted
//! - `EventBus`: background-to-foreground event delivery
//!
//! # Example
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use libsocialrocket::service::posting::ScheduleRequest;
//! use libsocialrocket::service::RocketService;
//!
//! # async fn example() -> libsocialrocket::Result<()> {
//! let (service, mut events) = RocketService::new()?;
//!
//! let records = service.schedule(ScheduleRequest {
//!     media: "launch.png".into(),
//!     caption: "We are live".to_string(),
//!     hashtags: "#launch".to_string(),
//!     platforms: vec!["X".to_string()],
//!     times: vec![Utc::now() + Duration::hours(2)],
//!     ..Default::default()
//! })?;
//! println!("Queued {}", records[0].id);
//!
//! service.start_scheduler();
//! while let Some(event) = events.recv().await {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod posting;
pub mod validation;

use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use self::events::{Event, EventBus, EventReceiver};
use self::posting::{PostEdit, PostNowRequest, PostingService, ScheduleRequest};
use crate::browser::WebDriverLauncher;
use crate::error::GenerationError;
use crate::generation::{ContentGenerator, GeneratedContent, Prompts};
use crate::library::CreativeLibrary;
use crate::platforms::PublisherRegistry;
use crate::queue::{PostedEntry, PostedStore, QueueStore};
use crate::scheduler::{ScanReport, Scheduler};
use crate::types::{PlatformResult, PostRecord};
use crate::{Config, Result};

/// Main service facade
///
/// All sub-services share the same `Arc`ed stores, so a record queued
/// through [`RocketService::schedule`] is immediately visible to the
/// scheduler.
pub struct RocketService {
    config: Arc<Config>,
    queue: Arc<QueueStore>,
    posted: Arc<PostedStore>,
    library: Arc<CreativeLibrary>,
    registry: Arc<PublisherRegistry>,
    generator: Arc<ContentGenerator>,
    scheduler: Arc<Scheduler>,
    posting: PostingService,
    event_bus: EventBus,
}

impl RocketService {
    /// Create a service from the default configuration file
    pub fn new() -> Result<(Self, EventReceiver)> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    /// Create a service with live publishers and providers for `config`
    pub fn from_config(config: Config) -> Result<(Self, EventReceiver)> {
        let launcher = Arc::new(WebDriverLauncher::from_config(&config.browser));
        let registry = PublisherRegistry::from_config(&config, launcher);
        let generator = ContentGenerator::from_config(&config.ai);
        Self::with_components(config, registry, generator)
    }

    /// Create a service around caller-built publishers and providers
    pub fn with_components(
        config: Config,
        registry: PublisherRegistry,
        generator: ContentGenerator,
    ) -> Result<(Self, EventReceiver)> {
        let queue_dir = config.queue_dir()?;
        let queue = Arc::new(QueueStore::open(&queue_dir)?);
        let posted = Arc::new(PostedStore::open(config.posted_dir()?)?);
        let library = Arc::new(CreativeLibrary::open(&queue_dir)?);
        let registry = Arc::new(registry);
        let generator = Arc::new(generator);
        let (event_bus, receiver) = EventBus::new();

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&queue),
            Arc::clone(&posted),
            Arc::clone(&registry),
            event_bus.clone(),
            &config.scheduling,
        ));
        let posting = PostingService::new(
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&scheduler),
            event_bus.clone(),
        );

        tracing::debug!(
            "Service ready (queue: {}, dry run: {})",
            queue_dir.display(),
            registry.is_dry_run()
        );

        Ok((
            Self {
                config: Arc::new(config),
                queue,
                posted,
                library,
                registry,
                generator,
                scheduler,
                posting,
                event_bus,
            },
            receiver,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    pub fn posted(&self) -> &PostedStore {
        &self.posted
    }

    pub fn library(&self) -> &CreativeLibrary {
        &self.library
    }

    pub fn registry(&self) -> &PublisherRegistry {
        &self.registry
    }

    pub fn posting(&self) -> &PostingService {
        &self.posting
    }

    /// A sender for the service's event channel
    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.registry.set_dry_run(dry_run);
    }

    pub fn schedule(&self, request: ScheduleRequest) -> Result<Vec<PostRecord>> {
        self.posting.schedule(request)
    }

    pub fn edit(&self, id: &str, edit: PostEdit) -> Result<PostRecord> {
        self.posting.edit(id, edit)
    }

    pub fn remove(&self, id: &str) -> Result<PostRecord> {
        self.posting.remove(id)
    }

    pub async fn post_now(&self, request: PostNowRequest) -> Result<Vec<PlatformResult>> {
        self.posting.post_now(request).await
    }

    pub async fn publish_queued_now(&self, id: &str) -> Result<PostedEntry> {
        self.posting.publish_queued_now(id).await
    }

    /// Pending posts in scheduled order
    pub fn list(&self) -> Vec<PostRecord> {
        self.queue.load()
    }

    /// Pending posts on a local calendar date
    pub fn posts_on(&self, date: NaiveDate) -> Vec<PostRecord> {
        self.queue.on_date(date)
    }

    /// Published posts, oldest first
    pub fn history(&self) -> Vec<PostedEntry> {
        self.posted.history()
    }

    /// Generate content and wait for it
    pub async fn generate(
        &self,
        media: &Path,
        prompts: &Prompts,
    ) -> std::result::Result<GeneratedContent, GenerationError> {
        self.generator.generate(media, prompts).await
    }

    /// Generate content in the background
    ///
    /// The outcome arrives as [`Event::ContentGenerated`] or
    /// [`Event::GenerationFailed`].
    pub fn spawn_generation(&self, media: PathBuf, prompts: Prompts) -> JoinHandle<()> {
        let generator = Arc::clone(&self.generator);
        let event_bus = self.event_bus.clone();

        tokio::spawn(async move {
            match generator.generate(&media, &prompts).await {
                Ok(content) => event_bus.emit(Event::ContentGenerated {
                    media_path: media,
                    content,
                }),
                Err(e) => event_bus.emit(Event::GenerationFailed {
                    media_path: media,
                    error: e.to_string(),
                }),
            }
        })
    }

    pub fn start_scheduler(&self) {
        self.scheduler.start();
    }

    pub async fn stop_scheduler(&self) {
        self.scheduler.stop().await;
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// One scheduler pass outside the background loop
    pub async fn run_scheduler_once(&self, now: DateTime<Utc>) -> ScanReport {
        self.scheduler.run_once(now).await
    }
}
