//! Mock publisher for testing
//!
//! Configurable success, failure and latency, with shared counters so a test
//! can hand one clone to a registry and inspect another.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use super::Publisher;
use crate::error::PlatformError;
use crate::types::PlatformId;

/// A call received by a [`MockPublisher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub text: String,
    pub media: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: PlatformId,

    /// Error returned instead of publishing; `None` means succeed
    pub error: Option<PlatformError>,

    /// Simulated latency before completing
    pub delay: Duration,

    pub published: Arc<Mutex<Vec<PublishedPost>>>,
}

impl MockConfig {
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            error: None,
            delay: Duration::ZERO,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Always succeeds
    pub fn success(platform: PlatformId) -> Self {
        Self::new(MockConfig::new(platform))
    }

    /// Always fails with `error`
    pub fn failure(platform: PlatformId, error: PlatformError) -> Self {
        Self::new(MockConfig {
            error: Some(error),
            ..MockConfig::new(platform)
        })
    }

    pub fn with_delay(platform: PlatformId, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::new(platform)
        })
    }

    pub fn call_count(&self) -> usize {
        self.published().len()
    }

    pub fn published(&self) -> Vec<PublishedPost> {
        self.config
            .published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn platform(&self) -> PlatformId {
        self.config.platform
    }

    async fn publish(&self, text: &str, media: Option<&Path>) -> Result<String, PlatformError> {
        if let Ok(mut published) = self.config.published.lock() {
            published.push(PublishedPost {
                text: text.to_string(),
                media: media.map(Path::to_path_buf),
            });
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.error {
            Some(error) => Err(error.clone()),
            None => Ok(format!("Posted to {}", self.config.platform)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let publisher = MockPublisher::success(PlatformId::X);
        let handle = publisher.clone();

        let info = publisher
            .publish("Test content", Some(Path::new("/tmp/a.png")))
            .await
            .unwrap();
        assert_eq!(info, "Posted to X");
        assert_eq!(handle.call_count(), 1);
        assert_eq!(
            handle.published()[0],
            PublishedPost {
                text: "Test content".to_string(),
                media: Some(PathBuf::from("/tmp/a.png")),
            }
        );
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let publisher = MockPublisher::failure(
            PlatformId::Threads,
            PlatformError::Network("connection reset".to_string()),
        );

        let err = publisher.publish("Test", None).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(publisher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let publisher = MockPublisher::with_delay(PlatformId::X, Duration::from_millis(50));

        let start = std::time::Instant::now();
        publisher.publish("Test", None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
