//! Error types for SocialRocket

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RocketError>;

#[derive(Error, Debug)]
pub enum RocketError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RocketError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RocketError::InvalidInput(_) => 3,
            RocketError::Platform(PlatformError::NotConfigured(_)) => 2,
            RocketError::Generation(GenerationError::NoProviderConfigured) => 2,
            RocketError::Platform(_) => 1,
            RocketError::Generation(_) => 1,
            RocketError::Config(_) => 1,
            RocketError::Storage(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Post not found in queue: {0}")]
    NotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("{platform} {step} step failed: {reason}")]
    Automation {
        platform: String,
        step: String,
        reason: String,
    },

    #[error("{0}")]
    NotImplemented(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Why a single AI provider could not produce usable content
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0} API key not configured")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("failed to parse response - no content extracted")]
    EmptyContent,
}

/// A provider failure tagged with the provider that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("No AI provider configured. Add an Anthropic, OpenAI, or Gemini API key to the [ai] section of the config file.")]
    NoProviderConfigured,

    #[error("All providers failed: {}", join_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),
}

impl GenerationError {
    /// Individual provider failures, in the order they were attempted
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            GenerationError::NoProviderConfigured => &[],
            GenerationError::AllProvidersFailed(failures) => failures,
        }
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = RocketError::InvalidInput("Scheduled time is in the past".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_not_configured() {
        let error = RocketError::Platform(PlatformError::NotConfigured("X".to_string()));
        assert_eq!(error.exit_code(), 2);

        let error = RocketError::Generation(GenerationError::NoProviderConfigured);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_runtime_failures() {
        let automation = RocketError::Platform(PlatformError::Automation {
            platform: "X".to_string(),
            step: "submit".to_string(),
            reason: "tweet button not found".to_string(),
        });
        assert_eq!(automation.exit_code(), 1);

        let storage = RocketError::Storage(StorageError::NotFound("abc".to_string()));
        assert_eq!(storage.exit_code(), 1);

        let config = RocketError::Config(ConfigError::MissingField("ai".to_string()));
        assert_eq!(config.exit_code(), 1);
    }

    #[test]
    fn test_automation_message_names_step() {
        let error = PlatformError::Automation {
            platform: "X".to_string(),
            step: "password".to_string(),
            reason: "timed out after 30s waiting for input[name=\"password\"]".to_string(),
        };
        let message = error.to_string();
        assert!(message.starts_with("X password step failed"));
        assert!(message.contains("timed out"));
    }

    #[test]
    fn test_not_implemented_message_is_verbatim() {
        let error = PlatformError::NotImplemented("Reddit posting not implemented yet.".to_string());
        assert_eq!(error.to_string(), "Reddit posting not implemented yet.");
    }

    #[test]
    fn test_all_providers_failed_lists_every_reason() {
        let error = GenerationError::AllProvidersFailed(vec![
            ProviderFailure {
                provider: "Anthropic".to_string(),
                error: ProviderError::Http {
                    status: 529,
                    message: "Overloaded".to_string(),
                },
            },
            ProviderFailure {
                provider: "OpenAI".to_string(),
                error: ProviderError::NotConfigured("OpenAI".to_string()),
            },
        ]);

        let message = error.to_string();
        assert_eq!(
            message,
            "All providers failed: Anthropic: HTTP 529: Overloaded; OpenAI: OpenAI API key not configured"
        );
        assert_eq!(error.failures().len(), 2);
    }

    #[test]
    fn test_error_conversion_from_storage_error() {
        let storage_error = StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        let rocket_error: RocketError = storage_error.into();

        match rocket_error {
            RocketError::Storage(_) => {}
            _ => panic!("Expected RocketError::Storage"),
        }
    }
}
