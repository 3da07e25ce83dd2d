//! Publisher lookup and dispatch

use futures::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Publisher, StubPublisher, XPublisher};
use crate::browser::BrowserLauncher;
use crate::config::Config;
use crate::error::PlatformError;
use crate::types::{PlatformId, PlatformResult};

const PREVIEW_CHARS: usize = 80;

pub struct PublisherRegistry {
    publishers: HashMap<PlatformId, Arc<dyn Publisher>>,
    dry_run: AtomicBool,
}

impl PublisherRegistry {
    /// An empty registry
    pub fn new(dry_run: bool) -> Self {
        Self {
            publishers: HashMap::new(),
            dry_run: AtomicBool::new(dry_run),
        }
    }

    /// Every known platform registered as a not-implemented stub
    pub fn with_stubs(dry_run: bool) -> Self {
        let mut registry = Self::new(dry_run);
        for platform in PlatformId::ALL {
            registry.register(Arc::new(StubPublisher::new(platform)));
        }
        registry
    }

    /// Stubs everywhere except X, which drives a browser from `launcher`
    pub fn from_config(config: &Config, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let mut registry = Self::with_stubs(config.scheduling.dry_run);
        registry.register(Arc::new(XPublisher::from_config(config, launcher)));
        registry
    }

    /// Register a publisher, replacing any previous one for its platform
    pub fn register(&mut self, publisher: Arc<dyn Publisher>) {
        self.publishers.insert(publisher.platform(), publisher);
    }

    pub fn unregister(&mut self, platform: PlatformId) -> Option<Arc<dyn Publisher>> {
        self.publishers.remove(&platform)
    }

    pub fn get(&self, platform: PlatformId) -> Option<Arc<dyn Publisher>> {
        self.publishers.get(&platform).cloned()
    }

    /// Registered platforms in canonical order
    pub fn platforms(&self) -> Vec<PlatformId> {
        PlatformId::ALL
            .into_iter()
            .filter(|p| self.publishers.contains_key(p))
            .collect()
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.dry_run.store(dry_run, Ordering::SeqCst);
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }

    /// Publish to one platform by name
    ///
    /// Never fails: unknown names, missing publishers and publisher errors
    /// all become an unsuccessful [`PlatformResult`].
    pub async fn publish(&self, name: &str, text: &str, media: Option<&Path>) -> PlatformResult {
        let publisher = match self.resolve(name) {
            Ok(publisher) => publisher,
            Err(e) => {
                tracing::warn!("Failed to post to {}: {}", name, e);
                return PlatformResult::failed(name, e.to_string());
            }
        };
        let platform = publisher.platform();

        if self.is_dry_run() && publisher.is_implemented() {
            let info = dry_run_message(platform, text, media);
            tracing::info!("{}", info);
            return PlatformResult::succeeded(platform.as_str(), info);
        }

        match publisher.publish(text, media).await {
            Ok(info) => {
                tracing::info!("[LIVE] {}", info);
                PlatformResult::succeeded(platform.as_str(), info)
            }
            Err(e) => {
                tracing::warn!("[LIVE] Failed to post to {}: {}", platform, e);
                PlatformResult::failed(platform.as_str(), e.to_string())
            }
        }
    }

    /// Publish to every named platform concurrently
    ///
    /// Results come back in the order of `names`; one platform failing does
    /// not affect the others.
    pub async fn publish_all(
        &self,
        names: &[String],
        text: &str,
        media: Option<&Path>,
    ) -> Vec<PlatformResult> {
        let tasks = names.iter().map(|name| self.publish(name, text, media));
        join_all(tasks).await
    }

    fn resolve(&self, name: &str) -> Result<Arc<dyn Publisher>, PlatformError> {
        let platform: PlatformId = name.parse()?;
        self.get(platform)
            .ok_or_else(|| PlatformError::UnknownPlatform(name.to_string()))
    }
}

/// Message reported in place of a live post
pub fn dry_run_message(platform: PlatformId, text: &str, media: Option<&Path>) -> String {
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    let media_name = media
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "[DRY RUN] Would post to {}: \"{}\" (media: {})",
        platform, preview, media_name
    )
}
