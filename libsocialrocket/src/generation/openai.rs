//! OpenAI Chat Completions provider

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{http_client, send_json, MediaInput, Provider};
use crate::config::{non_blank, AiConfig};
use crate::error::ProviderError;

const BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 1024;

pub struct OpenAiProvider {
    client: Client,
    api_key: Option<SecretString>,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
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
            non_blank(&config.openai_key).map(str::to_string),
            config.openai_model.clone(),
            timeout,
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, media: &MediaInput, prompt: &str) -> ChatCompletionRequest {
        let content = match &media.image {
            Some(image) => MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", image.mime_type, image.data),
                    },
                },
                ContentPart::Text {
                    text: prompt.to_string(),
                },
            ]),
            None => MessageContent::Text(media.text_prompt(prompt)),
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn generate(&self, media: &MediaInput, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured(self.name().to_string()))?;

        let request = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key.expose_secret())
            .json(&self.build_request(media, prompt));

        let response: ChatCompletionResponse = send_json(request).await?;
        extract_text_response(response)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

/// Plain string for text-only prompts, part list when an image is attached
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::Malformed("OpenAI returned no message content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::InlineImage;
    use crate::types::ImageMimeType;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_image_request_uses_data_url() {
        let provider = OpenAiProvider::new(Some("key".into()), "gpt-4o", Duration::from_secs(5));
        let media = MediaInput {
            path: PathBuf::from("photo.jpg"),
            image: Some(InlineImage {
                mime_type: ImageMimeType::Jpeg,
                data: "QUJD".to_string(),
            }),
        };

        let json = serde_json::to_value(provider.build_request(&media, "PROMPT")).unwrap();
        assert_eq!(json["max_tokens"], 1024);
        let content = &json["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[0]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
        assert_eq!(content[1]["type"], "text");
    }

    #[test]
    fn test_text_only_request_is_plain_string() {
        let provider = OpenAiProvider::new(Some("key".into()), "gpt-4o", Duration::from_secs(5));
        let media = MediaInput::text_only(Path::new("page.html"));

        let json = serde_json::to_value(provider.build_request(&media, "PROMPT")).unwrap();
        let content = json["messages"][0]["content"].as_str().unwrap();
        assert!(content.contains("'page.html'"));
        assert!(content.ends_with("PROMPT"));
    }

    #[test]
    fn test_extract_text() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"CAPTION: hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text_response(response).unwrap(), "CAPTION: hi");

        let refusal: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(extract_text_response(refusal).is_err());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let provider = OpenAiProvider::new(None, "gpt-4o", Duration::from_secs(5));
        let err = provider
            .generate(&MediaInput::text_only(Path::new("a.png")), "p")
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured("OpenAI".to_string()));
    }
}
