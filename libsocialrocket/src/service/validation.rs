//! Input checks applied before anything is persisted or published

use chrono::{DateTime, Local, Utc};
use std::path::Path;

use crate::types::PlatformId;
use crate::{Result, RocketError};

/// The media file must exist at the time of use
pub fn require_media(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RocketError::InvalidInput(format!(
            "Media file not found: {}",
            path.display()
        )))
    }
}

/// Parse, deduplicate and canonicalize platform names
///
/// Returns display names (`"X"`, `"LinkedIn"`) in first-seen order. An
/// empty list or an unknown name is rejected.
pub fn normalize_platforms(names: &[String]) -> Result<Vec<String>> {
    if names.iter().all(|n| n.trim().is_empty()) {
        return Err(RocketError::InvalidInput(
            "Select at least one platform".to_string(),
        ));
    }

    let mut platforms: Vec<PlatformId> = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let platform: PlatformId = name
            .parse()
            .map_err(|e: crate::error::PlatformError| RocketError::InvalidInput(e.to_string()))?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }

    Ok(platforms.iter().map(|p| p.as_str().to_string()).collect())
}

/// Scheduled times must be strictly after `now`
pub fn require_future(time: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if time > now {
        Ok(())
    } else {
        Err(RocketError::InvalidInput(format!(
            "Scheduled time must be in the future (got {})",
            time.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_require_media() {
        let file = NamedTempFile::new().unwrap();
        assert!(require_media(file.path()).is_ok());

        let err = require_media(Path::new("/nonexistent/launch.png")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("Media file not found"));
    }

    #[test]
    fn test_normalize_platforms() {
        let names = vec![
            "twitter".to_string(),
            "linkedin".to_string(),
            "X".to_string(),
            " ".to_string(),
        ];
        assert_eq!(normalize_platforms(&names).unwrap(), vec!["X", "LinkedIn"]);
    }

    #[test]
    fn test_normalize_platforms_rejects_empty_and_unknown() {
        assert!(normalize_platforms(&[]).is_err());
        assert!(normalize_platforms(&["".to_string()]).is_err());

        let err = normalize_platforms(&["myspace".to_string()]).unwrap_err();
        assert!(err.to_string().contains("myspace"));
    }

    #[test]
    fn test_require_future_boundary() {
        let now = Utc::now();
        assert!(require_future(now, now).is_err());
        assert!(require_future(now - Duration::seconds(1), now).is_err());
        assert!(require_future(now + Duration::seconds(1), now).is_ok());
    }
}
