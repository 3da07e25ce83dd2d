//! Background-to-foreground event channel
//!
//! Background work (scheduler scans, content generation) reports through an
//! [`EventBus`]. Exactly one consumer holds the [`EventReceiver`], typically
//! the CLI loop printing a running log. Emitting never blocks and never
//! fails: once the receiver is dropped, events are discarded.
//!
//! # Example
//!
//! ```no_run
//! use libsocialrocket::service::events::{Event, EventBus};
//!
//! # async fn example() {
//! let (bus, mut receiver) = EventBus::new();
//!
//! bus.emit(Event::SchedulerStarted { interval_secs: 30 });
//!
//! if let Some(event) = receiver.recv().await {
//!     println!("{}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::generation::GeneratedContent;
use crate::types::PlatformResult;

pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventBus {
    /// Create the bus and its single receiver
    pub fn new() -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// A bus whose events go nowhere
    pub fn detached() -> Self {
        Self::new().0
    }

    pub fn emit(&self, event: Event) {
        // Err only means the receiver is gone
        let _ = self.sender.send(event);
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ContentGenerated {
        media_path: PathBuf,
        content: GeneratedContent,
    },

    GenerationFailed {
        media_path: PathBuf,
        error: String,
    },

    PublishStarted {
        post_id: String,
        platforms: Vec<String>,
    },

    PlatformPublished {
        post_id: String,
        result: PlatformResult,
    },

    PostArchived {
        post_id: String,
        results: Vec<PlatformResult>,
    },

    SchedulerStarted {
        interval_secs: u64,
    },

    SchedulerStopped,
}

/// One running-log line per event
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::ContentGenerated {
                media_path,
                content,
            } => write!(
                f,
                "Generated content for {} using {}",
                file_label(media_path),
                content.provider
            ),
            Event::GenerationFailed { media_path, error } => write!(
                f,
                "Content generation failed for {}: {}",
                file_label(media_path),
                error
            ),
            Event::PublishStarted { post_id, platforms } => {
                write!(f, "Posting {} to {}", post_id, platforms.join(", "))
            }
            Event::PlatformPublished { post_id, result } => {
                if result.success {
                    write!(f, "{} [{}] {}", post_id, result.platform, result.message)
                } else {
                    write!(
                        f,
                        "{} [{}] Failed: {}",
                        post_id, result.platform, result.message
                    )
                }
            }
            Event::PostArchived { post_id, results } => {
                let ok = results.iter().filter(|r| r.success).count();
                write!(
                    f,
                    "Moved {} to posted ({}/{} platforms succeeded)",
                    post_id,
                    ok,
                    results.len()
                )
            }
            Event::SchedulerStarted { interval_secs } => {
                write!(f, "Scheduler started (checking every {}s)", interval_secs)
            }
            Event::SchedulerStopped => write!(f, "Scheduler stopped"),
        }
    }
}

fn file_label(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_emission_and_receipt() {
        let (bus, mut receiver) = EventBus::new();

        bus.emit(Event::PublishStarted {
            post_id: "test123".to_string(),
            platforms: vec!["X".to_string()],
        });

        match receiver.recv().await.unwrap() {
            Event::PublishStarted { post_id, platforms } => {
                assert_eq!(post_id, "test123");
                assert_eq!(platforms, vec!["X"]);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (bus, mut receiver) = EventBus::new();
        let sender = bus.clone();

        bus.emit(Event::SchedulerStarted { interval_secs: 30 });
        sender.emit(Event::SchedulerStopped);

        assert_eq!(
            receiver.recv().await,
            Some(Event::SchedulerStarted { interval_secs: 30 })
        );
        assert_eq!(receiver.recv().await, Some(Event::SchedulerStopped));
    }

    #[test]
    fn test_emit_without_receiver() {
        let bus = EventBus::detached();
        assert!(bus.is_closed());

        // Should not panic
        bus.emit(Event::SchedulerStopped);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::PlatformPublished {
            post_id: "abc".to_string(),
            result: PlatformResult::failed("LinkedIn", "LinkedIn posting not implemented yet."),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"platform_published\""));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_display_lines() {
        let event = Event::PostArchived {
            post_id: "abc".to_string(),
            results: vec![
                PlatformResult::succeeded("X", "Posted to X"),
                PlatformResult::failed("Quora", "Quora posting not implemented yet."),
            ],
        };
        assert_eq!(
            event.to_string(),
            "Moved abc to posted (1/2 platforms succeeded)"
        );

        let event = Event::GenerationFailed {
            media_path: PathBuf::from("/tmp/media/launch.png"),
            error: "All providers failed".to_string(),
        };
        assert_eq!(
            event.to_string(),
            "Content generation failed for launch.png: All providers failed"
        );
    }
}
