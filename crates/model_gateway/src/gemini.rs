//! Gemini `generateContent` provider.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use perch_core::{
    traits::{CompletionProvider, CompletionRequest},
    Error, Result,
};

use crate::http::send_json;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Multimodal provider speaking the Gemini REST API.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Secret<String>,
}

impl GeminiProvider {
    pub fn new(client: Client, base_url: Option<&str>, model: impl Into<String>, api_key: Secret<String>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_GEMINI_BASE_URL).trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn build_body(request: &CompletionRequest<'_>) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        if let Some(media) = request.media {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: media.mime_type.clone(),
                    data: media.to_base64(),
                },
            });
        }
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json".into(),
            },
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        tracing::debug!(
            model = %self.model,
            has_media = request.media.is_some(),
            "Sending generateContent request"
        );

        let builder = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&Self::build_body(request));

        let response: GenerateContentResponse = send_json(self.name(), builder, request.timeout).await?;
        response.text()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// Variant order matters for untagged decoding.
#[derive(Debug, Serialize, Deserialize)]
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

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn text(&self) -> Result<String> {
        let text: String = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text { text } => Some(text.as_str()),
                        Part::InlineData { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::model_provider("gemini returned no text"));
        }
        Ok(text)
    }
}
