//! AI content generation with ordered provider fallback
//!
//! A [`ContentGenerator`] holds providers in the order they are tried: the
//! configured primary first, then the remaining built-in providers as
//! Anthropic, OpenAI, Gemini. Each provider receives the same prompt (and
//! the image inline when the media is one a vision model accepts). The
//! first response that parses into non-empty content wins; every earlier
//! failure is kept on the result.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use libsocialrocket::generation::{ContentGenerator, Prompts};
//! use libsocialrocket::Config;
//!
//! let config = Config::load()?;
//! let generator = ContentGenerator::from_config(&config.ai);
//! let content = generator
//!     .generate(std::path::Path::new("launch.png"), &Prompts::default())
//!     .await?;
//! println!("{} (via {})", content.caption, content.provider);
//! # Ok(())
//! # }
//! ```

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod openai;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::AiConfig;
use crate::error::{GenerationError, ProviderError, ProviderFailure};
use crate::types::ImageMimeType;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;

pub const DEFAULT_CAPTION_PROMPT: &str = "Write a viral, engaging social media caption that drives engagement. Use emotional triggers, be compelling and benefit-focused. Keep it concise (100-150 characters).";
pub const DEFAULT_HASHTAG_PROMPT: &str = "Generate 8-12 trending, viral-worthy hashtags focusing on buyer intent and engagement. Mix popular and niche hashtags.";
pub const DEFAULT_KEYWORD_PROMPT: &str = "Generate 7-10 SEO-optimized longtail keywords focusing on search intent, trending terms, and specific content attributes.";

/// Built-in providers in fallback order
pub const PROVIDER_ORDER: [&str; 3] = ["Anthropic", "OpenAI", "Gemini"];

/// A source of generated text
///
/// Implementations turn one prompt (plus optional inline image) into raw
/// model output. Parsing and fallback are handled by [`ContentGenerator`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name used in logs and failure lists
    fn name(&self) -> &str;

    async fn generate(&self, media: &MediaInput, prompt: &str) -> Result<String, ProviderError>;
}

/// User-supplied sub-prompts; blank entries use the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompts {
    pub caption: String,
    pub hashtags: String,
    pub keywords: String,
}

/// Combine the three sub-prompts into the instruction sent to every provider
pub fn build_prompt(prompts: &Prompts) -> String {
    fn or_default<'a>(custom: &'a str, default: &'a str) -> &'a str {
        if custom.trim().is_empty() {
            default
        } else {
            custom
        }
    }

    let caption = or_default(&prompts.caption, DEFAULT_CAPTION_PROMPT);
    let hashtags = or_default(&prompts.hashtags, DEFAULT_HASHTAG_PROMPT);
    let keywords = or_default(&prompts.keywords, DEFAULT_KEYWORD_PROMPT);

    format!(
        r##"You are an expert social media content strategist specializing in creating viral, conversion-focused posts.

Analyze this image and generate optimized social media content:

1. **Caption**: {caption}
2. **Hashtags**: {hashtags}
3. **Keywords**: {keywords}

Focus on:
- Emotional triggers and storytelling
- Benefit-driven language (not just features)
- Viral-worthy, shareable content
- Platform-optimized formatting
- Trending topics and search terms

Respond ONLY with valid JSON in this exact format:
{{
  "caption": "Your compelling caption here",
  "hashtags": "#hashtag1 #hashtag2 #hashtag3 ...",
  "keywords": "keyword1, keyword2, keyword3, ..."
}}"##
    )
}

/// Base64 image ready to embed in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: ImageMimeType,
    pub data: String,
}

/// The media a generation request is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInput {
    pub path: PathBuf,
    pub image: Option<InlineImage>,
}

impl MediaInput {
    /// Read the media, inlining it when it is a supported still image
    ///
    /// Unreadable or non-image files produce a text-only input; this never
    /// fails.
    pub async fn load(path: &Path) -> Self {
        let image = match ImageMimeType::from_path(path) {
            Some(mime_type) => match tokio::fs::read(path).await {
                Ok(bytes) => Some(InlineImage {
                    mime_type,
                    data: BASE64_STANDARD.encode(bytes),
                }),
                Err(e) => {
                    tracing::warn!("Could not read {} for analysis: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };

        Self {
            path: path.to_path_buf(),
            image,
        }
    }

    /// Input that never carries an image
    pub fn text_only(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            image: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Prompt used when the media cannot be shown to the model
    pub fn text_prompt(&self, prompt: &str) -> String {
        format!(
            "Generate social media content for a file named '{}'.\n\n{}",
            self.file_name(),
            prompt
        )
    }
}

/// Caption, hashtags and keywords extracted from one response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParsedContent {
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub hashtags: String,
    #[serde(default)]
    pub keywords: String,
}

impl ParsedContent {
    pub fn is_empty(&self) -> bool {
        self.caption.is_empty() && self.hashtags.is_empty() && self.keywords.is_empty()
    }
}

/// Extract content from raw model output
///
/// The outermost `{ ... }` block is decoded as JSON first, so prose around
/// the object is ignored. Otherwise lines starting with `CAPTION:`,
/// `HASHTAGS:` or `KEYWORDS:` (any case) are used.
pub fn parse_response(text: &str) -> ParsedContent {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str::<ParsedContent>(&text[start..=end]) {
                return parsed;
            }
        }
    }

    let mut parsed = ParsedContent::default();
    for line in text.lines().map(str::trim) {
        if let Some(rest) = strip_prefix_ignore_case(line, "CAPTION:") {
            parsed.caption = rest.trim().to_string();
        } else if let Some(rest) = strip_prefix_ignore_case(line, "HASHTAGS:") {
            parsed.hashtags = rest.trim().to_string();
        } else if let Some(rest) = strip_prefix_ignore_case(line, "KEYWORDS:") {
            parsed.keywords = rest.trim().to_string();
        }
    }
    parsed
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// Successful generation, tagged with the provider that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub caption: String,
    pub hashtags: String,
    pub keywords: String,
    pub provider: String,
    /// Providers that failed before this one succeeded
    #[serde(skip)]
    pub failures: Vec<ProviderFailure>,
}

pub struct ContentGenerator {
    providers: Vec<Box<dyn Provider>>,
}

impl ContentGenerator {
    /// Providers tried in the given order
    pub fn with_providers(providers: Vec<Box<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Built-in HTTP providers ordered primary-first
    pub fn from_config(config: &AiConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let providers = provider_order(&config.primary_provider)
            .into_iter()
            .map(|name| -> Box<dyn Provider> {
                match name {
                    "Anthropic" => Box::new(AnthropicProvider::from_config(config, timeout)),
                    "OpenAI" => Box::new(OpenAiProvider::from_config(config, timeout)),
                    _ => Box::new(GeminiProvider::from_config(config, timeout)),
                }
            })
            .collect();

        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Generate content for the media at `media_path`
    pub async fn generate(
        &self,
        media_path: &Path,
        prompts: &Prompts,
    ) -> Result<GeneratedContent, GenerationError> {
        let media = MediaInput::load(media_path).await;
        self.generate_for(&media, prompts).await
    }

    /// Generate content for an already-loaded media input
    pub async fn generate_for(
        &self,
        media: &MediaInput,
        prompts: &Prompts,
    ) -> Result<GeneratedContent, GenerationError> {
        let prompt = build_prompt(prompts);
        let mut failures = Vec::new();

        for provider in &self.providers {
            let name = provider.name().to_string();
            let error = match provider.generate(media, &prompt).await {
                Ok(text) => {
                    let parsed = parse_response(&text);
                    if !parsed.is_empty() {
                        tracing::info!("Generated content using {}", name);
                        return Ok(GeneratedContent {
                            caption: parsed.caption,
                            hashtags: parsed.hashtags,
                            keywords: parsed.keywords,
                            provider: name,
                            failures,
                        });
                    }
                    let preview: String = text.chars().take(200).collect();
                    tracing::debug!("Unparseable {} response: {}", name, preview);
                    ProviderError::EmptyContent
                }
                Err(error) => error,
            };

            tracing::warn!("{} failed: {}", name, error);
            failures.push(ProviderFailure {
                provider: name,
                error,
            });
        }

        let only_unconfigured = failures
            .iter()
            .all(|f| matches!(f.error, ProviderError::NotConfigured(_)));
        if only_unconfigured {
            return Err(GenerationError::NoProviderConfigured);
        }

        let error = GenerationError::AllProvidersFailed(failures);
        tracing::error!("{}", error);
        Err(error)
    }
}

/// Fallback order for a configured primary provider
///
/// Unknown primaries are ignored rather than tried.
pub fn provider_order(primary: &str) -> Vec<&'static str> {
    let primary = PROVIDER_ORDER
        .iter()
        .copied()
        .find(|p| p.eq_ignore_ascii_case(primary.trim()));

    primary
        .into_iter()
        .chain(PROVIDER_ORDER.iter().copied().filter(move |p| Some(*p) != primary))
        .collect()
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Send a request and decode a JSON success body
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|err| ProviderError::Request(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(map_http_error(status.as_u16(), &body));
    }

    response
        .json()
        .await
        .map_err(|err| ProviderError::Malformed(err.to_string()))
}

fn map_http_error(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|wrapper| {
            let message = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(code) if !code.is_empty() => format!("{}: {}", code, message),
                _ => message,
            })
        })
        .unwrap_or_else(|| body.trim().to_string());

    ProviderError::Http { status, message }
}
