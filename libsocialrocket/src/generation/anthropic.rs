//! Anthropic Messages API provider

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{http_client, send_json, MediaInput, Provider};
use crate::config::{non_blank, AiConfig};
use crate::error::ProviderError;

const BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;

pub struct AnthropicProvider {
    client: Client,
    api_key: Option<SecretString>,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.map(SecretString::from),
            model: model.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn from_config(config: &AiConfig, timeout: Duration) -> Self {
        Self::new(
            non_blank(&config.anthropic_key).map(str::to_string),
            config.anthropic_model.clone(),
            timeout,
        )
    }

    /// Point at a different endpoint (proxies, local test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, media: &MediaInput, prompt: &str) -> CreateMessageRequest {
        let content = match &media.image {
            Some(image) => vec![
                ContentBlock::Image {
                    source: ImageSource {
                        r#type: "base64",
                        media_type: image.mime_type.as_str(),
                        data: image.data.clone(),
                    },
                },
                ContentBlock::Text {
                    text: prompt.to_string(),
                },
            ],
            None => vec![ContentBlock::Text {
                text: media.text_prompt(prompt),
            }],
        };

        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content,
            }],
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn generate(&self, media: &MediaInput, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured(self.name().to_string()))?;

        let body = self.build_request(media, prompt);
        let request = self
            .client
            .post(&self.base_url)
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let response: CreateMessageResponse = send_json(request).await?;
        extract_text_response(response)
    }
}

#[derive(Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Serialize)]
struct ImageSource {
    r#type: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct CreateMessageResponse {
    #[serde(default)]
    content: Vec<ContentBlockResponse>,
}

#[derive(Deserialize)]
struct ContentBlockResponse {
    #[serde(default)]
    text: Option<String>,
}

fn extract_text_response(response: CreateMessageResponse) -> Result<String, ProviderError> {
    response
        .content
        .into_iter()
        .find_map(|block| block.text)
        .ok_or_else(|| ProviderError::Malformed("Anthropic returned no text content".to_string()))
}
