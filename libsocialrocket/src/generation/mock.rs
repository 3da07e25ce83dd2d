//! Scripted provider for tests and offline runs

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{MediaInput, Provider};
use crate::error::ProviderError;

#[derive(Debug, Clone)]
enum Behavior {
    Respond(String),
    Fail(ProviderError),
}

/// Provider returning a fixed response or error
///
/// Clones share the call log, so a test can keep one handle and give the
/// other to a [`super::ContentGenerator`].
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    behavior: Behavior,
    delay: Duration,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Responds with `text` verbatim
    pub fn responding(name: &str, text: impl Into<String>) -> Self {
        Self::with_behavior(name, Behavior::Respond(text.into()))
    }

    /// Responds with a JSON object holding the three fields
    pub fn with_content(name: &str, caption: &str, hashtags: &str, keywords: &str) -> Self {
        let body = serde_json::json!({
            "caption": caption,
            "hashtags": hashtags,
            "keywords": keywords,
        });
        Self::responding(name, body.to_string())
    }

    pub fn failing(name: &str, error: ProviderError) -> Self {
        Self::with_behavior(name, Behavior::Fail(error))
    }

    /// Fails the way a provider without an API key does
    pub fn unconfigured(name: &str) -> Self {
        Self::failing(name, ProviderError::NotConfigured(name.to_string()))
    }

    fn with_behavior(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: Duration::ZERO,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Prompts received so far, text-only prompts already expanded
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, media: &MediaInput, prompt: &str) -> Result<String, ProviderError> {
        let sent = match media.image {
            Some(_) => prompt.to_string(),
            None => media.text_prompt(prompt),
        };
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(sent);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Respond(text) => Ok(text.clone()),
            Behavior::Fail(error) => Err(error.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::generation::{ContentGenerator, Prompts};
    use std::path::Path;

    fn media() -> MediaInput {
        MediaInput::text_only(Path::new("launch.png"))
    }

    #[tokio::test]
    async fn test_fallback_reaches_working_provider() {
        let erroring = MockProvider::failing(
            "A",
            ProviderError::Http {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let unconfigured = MockProvider::unconfigured("B");
        let working = MockProvider::with_content("C", "Ship it", "#rust", "release");
        let handle = working.clone();

        let generator = ContentGenerator::with_providers(vec![
            Box::new(erroring),
            Box::new(unconfigured),
            Box::new(working),
        ]);
        let content = generator.generate_for(&media(), &Prompts::default()).await.unwrap();

        assert_eq!(content.provider, "C");
        assert_eq!(content.caption, "Ship it");
        assert_eq!(content.hashtags, "#rust");
        assert_eq!(content.keywords, "release");
        assert_eq!(content.failures.len(), 2);
        assert_eq!(content.failures.iter().filter(|f| f.provider == "A").count(), 1);
        assert_eq!(content.failures.iter().filter(|f| f.provider == "B").count(), 1);
        assert_eq!(handle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let first = MockProvider::with_content("A", "one", "", "");
        let second = MockProvider::with_content("B", "two", "", "");
        let handle = second.clone();

        let generator = ContentGenerator::with_providers(vec![Box::new(first), Box::new(second)]);
        let content = generator.generate_for(&media(), &Prompts::default()).await.unwrap();

        assert_eq!(content.provider, "A");
        assert!(content.failures.is_empty());
        assert_eq!(handle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_parse_counts_as_failure() {
        let chatty = MockProvider::responding("A", "I'd love to help with your post!");
        let working = MockProvider::responding("B", "CAPTION: saved");

        let generator = ContentGenerator::with_providers(vec![Box::new(chatty), Box::new(working)]);
        let content = generator.generate_for(&media(), &Prompts::default()).await.unwrap();

        assert_eq!(content.caption, "saved");
        assert_eq!(content.failures[0].error, ProviderError::EmptyContent);
    }

    #[tokio::test]
    async fn test_all_unconfigured() {
        let generator = ContentGenerator::with_providers(vec![
            Box::new(MockProvider::unconfigured("Anthropic")),
            Box::new(MockProvider::unconfigured("OpenAI")),
        ]);
        let err = generator.generate_for(&media(), &Prompts::default()).await.unwrap_err();
        assert!(matches!(err, GenerationError::NoProviderConfigured));

        let nobody = ContentGenerator::with_providers(Vec::new());
        assert!(matches!(
            nobody.generate_for(&media(), &Prompts::default()).await,
            Err(GenerationError::NoProviderConfigured)
        ));
    }

    #[tokio::test]
    async fn test_all_failed_lists_reasons_in_order() {
        let generator = ContentGenerator::with_providers(vec![
            Box::new(MockProvider::failing("Anthropic", ProviderError::Request("timed out".into()))),
            Box::new(MockProvider::unconfigured("OpenAI")),
            Box::new(MockProvider::responding("Gemini", "no idea")),
        ]);
        let err = generator.generate_for(&media(), &Prompts::default()).await.unwrap_err();

        let providers: Vec<_> = err.failures().iter().map(|f| f.provider.as_str()).collect();
        assert_eq!(providers, vec!["Anthropic", "OpenAI", "Gemini"]);
        assert!(err.to_string().starts_with("All providers failed: Anthropic: request failed"));
    }

    #[tokio::test]
    async fn test_custom_prompts_reach_provider() {
        let provider = MockProvider::with_content("A", "x", "", "");
        let handle = provider.clone();
        let generator = ContentGenerator::with_providers(vec![Box::new(provider)]);

        let prompts = Prompts {
            caption: "Mention the discount".to_string(),
            ..Default::default()
        };
        generator.generate_for(&media(), &prompts).await.unwrap();

        let sent = &handle.prompts()[0];
        assert!(sent.starts_with("Generate social media content for a file named 'launch.png'."));
        assert!(sent.contains("1. **Caption**: Mention the discount"));
    }
}
