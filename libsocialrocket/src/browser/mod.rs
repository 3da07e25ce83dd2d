//! Browser automation seam
//!
//! Publishers that drive a platform's web UI talk to a [`BrowserSession`]
//! obtained from a [`BrowserLauncher`]. The live implementation speaks the
//! W3C WebDriver protocol to a local chromedriver or geckodriver
//! ([`webdriver`]); [`scripted`] provides an in-memory page for tests.
//!
//! Selectors are CSS. Operations that accept several selectors treat them as
//! alternates and use the first that matches.

pub mod scripted;
pub mod webdriver;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub use scripted::{BrowserAction, ScriptedBrowser, ScriptedLauncher};
pub use webdriver::WebDriverLauncher;

pub const VIEWPORT_WIDTH: u32 = 1280;
pub const VIEWPORT_HEIGHT: u32 = 720;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("timed out after {}s waiting for {what}", .after.as_secs())]
    Timeout { what: String, after: Duration },

    #[error("element not found: {0}")]
    NotFound(String),

    #[error("webdriver error: {0}")]
    Protocol(String),

    #[error("webdriver unreachable: {0}")]
    Http(String),

    #[error("{0}")]
    Io(String),
}

/// A located element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    /// Driver-side element handle
    pub id: String,
    /// Selector that matched
    pub selector: String,
}

/// One open page in an automated browser
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate and wait for the page to load
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until one of `selectors` is present
    async fn wait_for(&self, selectors: &[&str], timeout: Duration) -> Result<ElementRef, BrowserError>;

    /// First present match among `selectors`, without waiting
    async fn find(&self, selectors: &[&str]) -> Result<Option<ElementRef>, BrowserError>;

    /// Replace the element's text
    async fn fill(&self, element: &ElementRef, text: &str) -> Result<(), BrowserError>;

    async fn press_enter(&self, element: &ElementRef) -> Result<(), BrowserError>;

    async fn click(&self, element: &ElementRef) -> Result<(), BrowserError>;

    /// Attach a local file to an `input[type="file"]`
    async fn set_input_file(&self, element: &ElementRef, path: &Path) -> Result<(), BrowserError>;

    /// Wait until the current URL starts with `url`
    async fn wait_for_url(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until the document reports it has finished loading
    async fn wait_for_load(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// End the session; calling it again is harmless
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Starts fresh browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}
