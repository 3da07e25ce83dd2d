//! Platform publishers and dispatch
//!
//! Each target platform is a [`Publisher`]. The [`PublisherRegistry`] maps
//! platform identifiers to publishers, applies the dry-run switch and folds
//! every outcome into a [`PlatformResult`] so callers can report per-platform
//! success without matching on errors.
//!
//! Only X is automated; every other platform is a [`StubPublisher`] that
//! fails with a fixed "not implemented" message and never touches the
//! network.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libsocialrocket::browser::WebDriverLauncher;
//! use libsocialrocket::platforms::PublisherRegistry;
//! use libsocialrocket::Config;
//!
//! # async fn example() -> libsocialrocket::Result<()> {
//! let config = Config::load()?;
//! let launcher = Arc::new(WebDriverLauncher::from_config(&config.browser));
//! let registry = PublisherRegistry::from_config(&config, launcher);
//!
//! let result = registry.publish("X", "Hello from SocialRocket", None).await;
//! println!("{}: {}", result.platform, result.message);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::path::Path;

use crate::error::PlatformError;
use crate::types::PlatformId;

pub mod registry;
pub mod stub;
pub mod x;

// Available in all builds so integration tests and dry pipelines can use it
pub mod mock;

pub use mock::MockPublisher;
pub use registry::PublisherRegistry;
pub use stub::StubPublisher;
pub use x::{XPublisher, XState, XTimings};

/// Publishes a post to one platform
#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> PlatformId;

    /// False for placeholders that always fail; dry runs still call those
    fn is_implemented(&self) -> bool {
        true
    }

    /// Publish `text` with optional media and return an info message
    async fn publish(&self, text: &str, media: Option<&Path>) -> Result<String, PlatformError>;
}
