//! Configuration management for SocialRocket
//!
//! The configuration is a TOML document. Every section is optional so a
//! half-filled file (or no file at all) still yields a usable `Config`;
//! missing credentials surface later as "not configured" failures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::PlatformId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformCredentials>,
    #[serde(default = "default_best_times")]
    pub best_times: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for `queue/` and `posted/`; defaults to the XDG data directory
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_primary_provider")]
    pub primary_provider: String,
    pub anthropic_key: Option<String>,
    pub openai_key: Option<String>,
    pub gemini_key: Option<String>,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// Per-call timeout for a single provider request
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

/// Login details for one platform
///
/// Only X is automated today; the remaining fields are carried so the
/// other publishers can be filled in without a config migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformCredentials {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Subreddit, page URL or similar posting target
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between scheduler scans
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Simulate publishing without touching any browser
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// Used when a queued record carries no platforms
    #[serde(default)]
    pub default_platforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, selenium)
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// `chrome` or `firefox`
    #[serde(default = "default_browser_name")]
    pub browser: String,
}

fn default_primary_provider() -> String {
    "Anthropic".to_string()
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_ai_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    30
}

fn default_dry_run() -> bool {
    true
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_browser_name() -> String {
    "chrome".to_string()
}

/// Research-based posting windows per platform (24h clock)
pub fn default_best_times() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, [&str; 3]); 8] = [
        ("X", ["09:00", "12:00", "17:00"]),
        ("Threads", ["07:00", "12:00", "19:00"]),
        ("LinkedIn", ["07:30", "12:00", "17:00"]),
        ("Reddit", ["06:00", "08:00", "12:00"]),
        ("Facebook", ["09:00", "13:00", "16:00"]),
        ("Instagram", ["11:00", "14:00", "19:00"]),
        ("TikTok", ["07:00", "12:00", "19:00"]),
        ("Quora", ["09:00", "11:00", "14:00"]),
    ];

    table
        .iter()
        .map(|(platform, times)| {
            (
                platform.to_string(),
                times.iter().map(|t| t.to_string()).collect(),
            )
        })
        .collect()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            primary_provider: default_primary_provider(),
            anthropic_key: None,
            openai_key: None,
            gemini_key: None,
            anthropic_model: default_anthropic_model(),
            openai_model: default_openai_model(),
            gemini_model: default_gemini_model(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            dry_run: default_dry_run(),
            default_platforms: Vec::new(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            browser: default_browser_name(),
        }
    }
}

impl AiConfig {
    /// True when at least one provider has a non-blank key
    pub fn has_any_key(&self) -> bool {
        [&self.anthropic_key, &self.openai_key, &self.gemini_key]
            .iter()
            .any(|key| non_blank(key).is_some())
    }
}

impl PlatformCredentials {
    /// Login identifier: username, falling back to email
    pub fn login(&self) -> Option<&str> {
        non_blank(&self.username).or_else(|| non_blank(&self.email))
    }

    pub fn secret(&self) -> Option<&str> {
        non_blank(&self.password)
    }
}

/// Treat empty and whitespace-only strings as unset
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error: defaults are returned so the tools
    /// still run (in dry-run mode) before anything has been configured.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default_config());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            best_times: default_best_times(),
            ..Default::default()
        }
    }

    /// Credentials for a platform, if the `[platforms.<key>]` table exists
    pub fn credentials(&self, platform: PlatformId) -> Option<&PlatformCredentials> {
        self.platforms.get(platform.key())
    }

    /// Resolved data directory (expanded `storage.data_dir` or XDG default)
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(PathBuf::from(shellexpand::tilde(dir).to_string())),
            None => resolve_data_path(),
        }
    }

    /// Directory holding `queue.json`, queued media and the creative library
    pub fn queue_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("queue"))
    }

    /// Directory receiving media of published posts
    pub fn posted_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("posted"))
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SOCIALROCKET_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("socialrocket").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("socialrocket"))
}
