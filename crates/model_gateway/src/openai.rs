//! OpenAI-compatible chat completions provider.
//!
//! Works with any service implementing `/chat/completions` with image and
//! `input_audio` content parts.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::{json, Value};

use perch_core::{
    traits::{CompletionProvider, CompletionRequest},
    types::{MediaKind, MediaPayload},
    Error, Result,
};

use crate::http::send_json;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Secret<String>,
}

impl OpenAiProvider {
    pub fn new(client: Client, base_url: Option<&str>, model: impl Into<String>, api_key: Secret<String>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_OPENAI_BASE_URL).trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn build_body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut content = vec![json!({"type": "text", "text": request.prompt})];
        if let Some(media) = request.media {
            content.push(media_part(media));
        }
        json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [{"role": "user", "content": content}],
        })
    }
}

fn media_part(media: &MediaPayload) -> Value {
    match media.kind {
        MediaKind::Image => json!({
            "type": "image_url",
            "image_url": {"url": media.data_url()},
        }),
        MediaKind::Audio => json!({
            "type": "input_audio",
            "input_audio": {"data": media.to_base64(), "format": audio_format(&media.mime_type)},
        }),
    }
}

fn audio_format(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        _ => "wav",
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(
            model = %self.model,
            has_media = request.media.is_some(),
            "Sending chat completion request"
        );

        let builder = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.build_body(request));

        let response: ChatResponse = send_json(self.name(), builder, request.timeout).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::model_provider("openai returned no content"))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use bytes::Bytes;
    use std::time::Duration;

    fn provider(base: Option<&str>) -> OpenAiProvider {
        OpenAiProvider::new(Client::new(), base, "gpt-test", Secret::new("sk-test".into()))
    }

    #[test]
    fn test_image_and_audio_parts() {
        let p = provider(None);
        let image = MediaPayload::new(MediaKind::Image, "image/png", Bytes::from_static(b"abc"));
        let body = p.build_body(&CompletionRequest::with_media("Identify", &image, Duration::from_secs(1)));
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,YWJj"
        );

        let audio = MediaPayload::new(MediaKind::Audio, "audio/mpeg", Bytes::from_static(b"abc"));
        let body = p.build_body(&CompletionRequest::with_media("Identify", &audio, Duration::from_secs(1)));
        assert_eq!(body["messages"][0]["content"][1]["input_audio"]["format"], "mp3");
    }

    #[tokio::test]
    async fn test_complete_sends_bearer_and_reads_first_choice() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(_body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({"choices": [{"message": {"content": auth}}]}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let text = provider(Some(&base))
            .complete(&CompletionRequest::text("hi", Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(text, "Bearer sk-test");
    }
}
