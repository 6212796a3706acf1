use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Request Types
// =============================================================================

/// JSON body of `POST /v1/identify`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifyBody {
    /// Base64 image, optionally with a `data:` URL prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Reference to an image uploaded to the object store beforehand.
    #[serde(default, rename = "imagePath", skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Base64 audio clip, optionally with a `data:` URL prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Validated identification input. Exactly one media kind is present.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentificationRequest {
    Image(Bytes),
    ImageRef(String),
    Audio(Bytes),
}

impl IdentificationRequest {
    /// Validate a request body and decode its base64 payload.
    pub fn from_body(body: IdentifyBody) -> Result<Self> {
        let present = [
            body.image.is_some(),
            body.image_path.is_some(),
            body.audio.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();

        match present {
            0 => return Err(Error::invalid_request("No image or audio provided")),
            1 => {}
            _ => {
                return Err(Error::invalid_request(
                    "Provide exactly one of image, imagePath or audio",
                ))
            }
        }

        if let Some(image) = body.image {
            return Ok(Self::Image(decode_base64("image", &image)?));
        }
        if let Some(path) = body.image_path {
            let path = path.trim();
            if path.is_empty() {
                return Err(Error::invalid_request("imagePath is empty"));
            }
            return Ok(Self::ImageRef(path.to_string()));
        }
        match body.audio {
            Some(audio) => Ok(Self::Audio(decode_base64("audio", &audio)?)),
            None => Err(Error::invalid_request("No image or audio provided")),
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::ImageRef(_) => "image_ref",
            Self::Audio(_) => "audio",
        }
    }
}

fn decode_base64(field: &str, raw: &str) -> Result<Bytes> {
    let payload = match raw.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(Error::invalid_request(format!("{} is empty", field)));
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map(Bytes::from)
        .map_err(|e| Error::invalid_request(format!("{} is not valid base64: {}", field, e)))
}

/// Which modality a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

/// Resolved media bytes ready to hand to a completion provider.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPayload {
    pub kind: MediaKind,
    pub mime_type: String,
    pub data: Bytes,
}

impl MediaPayload {
    pub fn new(kind: MediaKind, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            kind,
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Base64 encoding of the payload for inline provider requests.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// `data:` URL form used by OpenAI-compatible image inputs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}
