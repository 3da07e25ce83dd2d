//! SocialRocket - scheduled multi-platform social publishing
//!
//! This library holds the publishing engine behind the `rocket-*` tools: a
//! durable post queue, AI-assisted caption generation with provider
//! fallback, per-platform publishers (browser automation for X) and the
//! scheduler that fires due posts.

pub mod browser;
pub mod config;
pub mod error;
pub mod generation;
pub mod library;
pub mod logging;
pub mod platforms;
pub mod queue;
pub mod scheduler;
pub mod scheduling;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, RocketError};
pub use queue::{PostedEntry, PostedStore, QueueStore};
pub use service::RocketService;
pub use types::{PlatformId, PlatformResult, PostRecord};
