//! Completion provider traits.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::MediaPayload;

/// One request to a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: String,
    /// Image or audio attached to the prompt, if any.
    pub media: Option<&'a MediaPayload>,
    /// Hard deadline for the whole call.
    pub timeout: Duration,
}

impl<'a> CompletionRequest<'a> {
    pub fn text(prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            media: None,
            timeout,
        }
    }

    pub fn with_media(prompt: impl Into<String>, media: &'a MediaPayload, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            media: Some(media),
            timeout,
        }
    }
}

/// A multimodal completion backend.
///
/// Implementations return the raw model text; callers run it through the
/// repair utility. A non-success HTTP status must surface as an error so the
/// provider chain can fall through.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Stable name used in logs, metrics and `/health`.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String>;
}
