//! Google Gemini generateContent provider

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{http_client, send_json, MediaInput, Provider};
use crate::config::{non_blank, AiConfig};
use crate::error::ProviderError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiProvider {
    client: Client,
    api_key: Option<SecretString>,
    model: String,
    base_url: String,
}

impl GeminiProvider {
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
            non_blank(&config.gemini_key).map(str::to_string),
            config.gemini_model.clone(),
            timeout,
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, media: &MediaInput, prompt: &str) -> GenerateContentRequest {
        let parts = match &media.image {
            Some(image) => vec![
                Part::Text {
                    text: prompt.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type.as_str(),
                        data: image.data.clone(),
                    },
                },
            ],
            None => vec![Part::Text {
                text: media.text_prompt(prompt),
            }],
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn generate(&self, media: &MediaInput, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured(self.name().to_string()))?;

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&self.build_request(media, prompt));

        let response: GenerateContentResponse = send_json(request).await?;
        extract_text_response(response)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        Err(ProviderError::Malformed(
            "Gemini returned no text in the response candidates".to_string(),
        ))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::InlineImage;
    use crate::types::ImageMimeType;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_endpoint_includes_model() {
        let provider = GeminiProvider::new(Some("k".into()), "gemini-1.5-flash", Duration::from_secs(5))
            .with_base_url("http://localhost:1234/v1beta/models");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:1234/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_image_request_shape() {
        let provider = GeminiProvider::new(Some("k".into()), "gemini-1.5-flash", Duration::from_secs(5));
        let media = MediaInput {
            path: PathBuf::from("a.webp"),
            image: Some(InlineImage {
                mime_type: ImageMimeType::WebP,
                data: "Zm9v".to_string(),
            }),
        };

        let json = serde_json::to_value(provider.build_request(&media, "PROMPT")).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "PROMPT");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/webp");
        assert_eq!(parts[1]["inlineData"]["data"], "Zm9v");
    }

    #[test]
    fn test_extract_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"CAPTION: a"},{"text":"\nHASHTAGS: #b"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text_response(response).unwrap(), "CAPTION: a\nHASHTAGS: #b");

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(extract_text_response(blocked).is_err());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let provider = GeminiProvider::new(None, "gemini-1.5-flash", Duration::from_secs(5));
        let err = provider
            .generate(&MediaInput::text_only(Path::new("a.png")), "p")
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured("Gemini".to_string()));
    }
}
