//! Core types for SocialRocket

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PlatformError;

/// Target platforms the publisher framework knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlatformId {
    X,
    Threads,
    LinkedIn,
    Reddit,
    Facebook,
    Instagram,
    TikTok,
    Quora,
}

impl PlatformId {
    pub const ALL: [PlatformId; 8] = [
        PlatformId::X,
        PlatformId::Threads,
        PlatformId::LinkedIn,
        PlatformId::Reddit,
        PlatformId::Facebook,
        PlatformId::Instagram,
        PlatformId::TikTok,
        PlatformId::Quora,
    ];

    /// Display name, also the identifier stored on queued posts
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Threads => "Threads",
            Self::LinkedIn => "LinkedIn",
            Self::Reddit => "Reddit",
            Self::Facebook => "Facebook",
            Self::Instagram => "Instagram",
            Self::TikTok => "TikTok",
            Self::Quora => "Quora",
        }
    }

    /// Lowercase key used for `[platforms.<key>]` config tables
    pub fn key(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Threads => "threads",
            Self::LinkedIn => "linkedin",
            Self::Reddit => "reddit",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::TikTok => "tiktok",
            Self::Quora => "quora",
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        if wanted == "twitter" {
            return Ok(Self::X);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.key() == wanted)
            .ok_or_else(|| PlatformError::UnknownPlatform(s.to_string()))
    }
}

/// A queued post
///
/// Field names on disk are camelCase; the snake_case names written by the
/// first releases are still accepted when reading, as are their timestamps
/// without an offset (read as local time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: String,
    #[serde(default, alias = "media_path")]
    pub media_path: Option<PathBuf>,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub hashtags: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default, alias = "full_text")]
    pub full_text: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default = "Utc::now", alias = "created_at", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "scheduled_time", deserialize_with = "lenient_timestamp")]
    pub scheduled_time: DateTime<Utc>,
}

impl PostRecord {
    /// Create a record with a fresh id and `fullText` derived from the text fields
    pub fn new(
        caption: impl Into<String>,
        hashtags: impl Into<String>,
        keywords: impl Into<String>,
        platforms: Vec<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            id: new_post_id(),
            media_path: None,
            caption: caption.into(),
            hashtags: hashtags.into(),
            keywords: keywords.into(),
            full_text: String::new(),
            platforms,
            created_at: Utc::now(),
            scheduled_time,
        };
        record.refresh_full_text();
        record
    }

    /// Replace caption and hashtags, keeping `fullText` consistent
    pub fn set_text(&mut self, caption: impl Into<String>, hashtags: impl Into<String>) {
        self.caption = caption.into();
        self.hashtags = hashtags.into();
        self.refresh_full_text();
    }

    pub fn refresh_full_text(&mut self) {
        self.full_text = compose_full_text(&self.caption, &self.hashtags);
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time <= now
    }

    /// File name of the owned media copy, if any
    pub fn media_file_name(&self) -> Option<String> {
        self.media_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().to_string())
    }
}

/// Outcome of publishing to one platform
///
/// `message` is the publisher's info string on success and the failure
/// reason otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: String,
    pub success: bool,
    pub message: String,
}

impl PlatformResult {
    pub fn succeeded(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            success: false,
            message: message.into(),
        }
    }
}

/// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` one as local time
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// caption, then a blank line and the hashtags when there are any
pub fn compose_full_text(caption: &str, hashtags: &str) -> String {
    if hashtags.is_empty() {
        caption.to_string()
    } else {
        format!("{}\n\n{}", caption, hashtags)
    }
}

/// Short opaque post id (first 8 characters of a v4 UUID)
pub fn new_post_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

// ============================================================================
// Media Types
// ============================================================================

/// Image formats a vision model can receive inline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Detect MIME type from file extension
    ///
    /// SVG is deliberately absent: it is an image to the user but not to
    /// the vision APIs.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad media category, used for the library and the composer preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Web,
    Other,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => Self::Image,
            "mp4" | "mov" | "avi" | "webm" => Self::Video,
            "html" | "htm" => Self::Web,
            _ => Self::Other,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_full_text_with_hashtags() {
        let record = PostRecord::new("Launch day", "#rust #ship", "", vec![], Utc::now());
        assert_eq!(record.full_text, "Launch day\n\n#rust #ship");
    }

    #[test]
    fn test_full_text_without_hashtags() {
        let mut record = PostRecord::new("Launch day", "#rust", "", vec![], Utc::now());
        record.set_text("Still launching", "");
        assert_eq!(record.full_text, "Still launching");
    }

    #[test]
    fn test_full_text_follows_every_edit() {
        let mut record = PostRecord::new("a", "", "", vec![], Utc::now());
        for (caption, hashtags) in [("b", "#one"), ("", "#two"), ("c", "")] {
            record.set_text(caption, hashtags);
            assert_eq!(record.full_text, compose_full_text(caption, hashtags));
        }
    }

    #[test]
    fn test_post_id_shape() {
        let id = new_post_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_post_id());
    }

    #[test]
    fn test_is_due_boundary() {
        let now = Utc::now();
        let record = PostRecord::new("x", "", "", vec![], now);
        assert!(record.is_due(now));
        assert!(!record.is_due(now - Duration::seconds(1)));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = PostRecord::new("hi", "#x", "k", vec!["X".to_string()], Utc::now());
        record.media_path = Some(PathBuf::from("/tmp/queue/abcd1234.png"));

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("mediaPath").is_some());
        assert!(json.get("fullText").is_some());
        assert!(json.get("scheduledTime").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("media_path").is_none());
    }

    #[test]
    fn test_record_reads_legacy_and_unknown_fields() {
        let json = r#"{
            "id": "abcd1234",
            "media_path": "/tmp/queue/abcd1234.png",
            "caption": "Hello",
            "scheduled_time": "2030-01-01T09:00:00Z",
            "thumbnail": "ignored"
        }"#;

        let record: PostRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "abcd1234");
        assert_eq!(record.media_path, Some(PathBuf::from("/tmp/queue/abcd1234.png")));
        assert_eq!(record.hashtags, "");
        assert!(record.platforms.is_empty());
        assert_eq!(record.media_file_name().as_deref(), Some("abcd1234.png"));
    }

    #[test]
    fn test_parse_timestamp_accepts_offset_and_naive_forms() {
        let utc = parse_timestamp("2030-01-01T09:00:00Z").unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap());
        assert_eq!(
            parse_timestamp("2030-01-01T10:00:00+01:00"),
            Some(utc)
        );

        let local = Local
            .with_ymd_and_hms(2030, 1, 1, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_timestamp("2030-01-01T09:00:00"), Some(local));
        assert_eq!(parse_timestamp("2030-01-01 09:00:00.000"), Some(local));

        assert_eq!(parse_timestamp("next tuesday"), None);
    }

    #[test]
    fn test_record_with_snake_case_naive_times() {
        let record: PostRecord = serde_json::from_str(
            r#"{"id": "legacy01", "caption": "old", "created_at": "2029-12-31T08:00:00",
                "scheduled_time": "2030-01-01T09:00:00"}"#,
        )
        .unwrap();
        assert_eq!(record.scheduled_time, parse_timestamp("2030-01-01T09:00:00").unwrap());
        assert!(record.created_at < record.scheduled_time);
    }

    #[test]
    fn test_platform_id_parsing() {
        assert_eq!("X".parse::<PlatformId>().unwrap(), PlatformId::X);
        assert_eq!("linkedin".parse::<PlatformId>().unwrap(), PlatformId::LinkedIn);
        assert_eq!(" TikTok ".parse::<PlatformId>().unwrap(), PlatformId::TikTok);
        assert_eq!("twitter".parse::<PlatformId>().unwrap(), PlatformId::X);

        let err = "myspace".parse::<PlatformId>().unwrap_err();
        assert_eq!(err, PlatformError::UnknownPlatform("myspace".to_string()));
    }

    #[test]
    fn test_image_mime_detection() {
        assert_eq!(
            ImageMimeType::from_path(Path::new("a/b/photo.JPG")),
            Some(ImageMimeType::Jpeg)
        );
        assert_eq!(ImageMimeType::from_path(Path::new("logo.svg")), None);
        assert_eq!(ImageMimeType::from_path(Path::new("clip.mp4")), None);
        assert_eq!(ImageMimeType::WebP.as_str(), "image/webp");
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(MediaKind::from_path(Path::new("logo.svg")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("clip.MOV")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("page.html")), MediaKind::Web);
        assert!(!MediaKind::from_path(Path::new("notes.txt")).is_supported());
    }
}
