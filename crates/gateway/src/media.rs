//! Media sniffing for identification payloads.
//!
//! Clients do not send a MIME type, so it is derived from magic bytes before
//! the payload is handed to a completion provider.

use bytes::Bytes;

use perch_core::{
    types::{MediaKind, MediaPayload},
    Error, Result,
};

/// Supported audio formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Mp4,
    Wav,
    Webm,
    Ogg,
    Flac,
}

impl AudioFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Mp4 => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Flac => "audio/flac",
        }
    }

    /// Detect format from bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        if data.starts_with(b"RIFF") && data.len() >= 12 && &data[8..12] == b"WAVE" {
            return Some(AudioFormat::Wav);
        }
        if data.starts_with(b"OggS") {
            return Some(AudioFormat::Ogg);
        }
        if data.starts_with(b"fLaC") {
            return Some(AudioFormat::Flac);
        }
        // ID3v2 tag or a bare MPEG frame sync.
        if data.starts_with(b"ID3") || (data[0] == 0xFF && data[1] & 0xE0 == 0xE0) {
            return Some(AudioFormat::Mp3);
        }
        if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Some(AudioFormat::Webm);
        }
        if data.len() >= 8 && &data[4..8] == b"ftyp" {
            return Some(AudioFormat::Mp4);
        }

        None
    }
}

/// Wrap raw image bytes, rejecting anything that is not a raster image.
pub fn image_payload(data: Bytes) -> Result<MediaPayload> {
    let format = image::guess_format(&data)
        .map_err(|_| Error::invalid_request("Unsupported image format"))?;
    Ok(MediaPayload::new(MediaKind::Image, format.to_mime_type(), data))
}

/// Wrap raw audio bytes, rejecting unknown containers.
pub fn audio_payload(data: Bytes) -> Result<MediaPayload> {
    let format = AudioFormat::detect(&data).ok_or_else(|| Error::invalid_request("Unsupported audio format"))?;
    Ok(MediaPayload::new(MediaKind::Audio, format.mime_type(), data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_audio_format_detection() {
        let wav = b"RIFF\x00\x00\x00\x00WAVEfmt ";
        assert_eq!(AudioFormat::detect(wav), Some(AudioFormat::Wav));

        let ogg = b"OggS\x00\x02";
        assert_eq!(AudioFormat::detect(ogg), Some(AudioFormat::Ogg));

        let mp3 = &[0xFF, 0xFB, 0x90, 0x00];
        assert_eq!(AudioFormat::detect(mp3), Some(AudioFormat::Mp3));

        assert_eq!(AudioFormat::detect(b"ID3\x04\x00"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::detect(b"\x00\x00\x00\x20ftypM4A "), Some(AudioFormat::Mp4));
        assert_eq!(AudioFormat::detect(b"hi"), None);
    }

    #[test]
    fn test_image_payload_sniffs_mime() {
        let png = image_payload(Bytes::from_static(PNG_HEADER)).unwrap();
        assert_eq!(png.mime_type, "image/png");
        assert_eq!(png.kind, MediaKind::Image);

        let jpeg = image_payload(Bytes::from_static(JPEG_HEADER)).unwrap();
        assert_eq!(jpeg.mime_type, "image/jpeg");
    }

    #[test]
    fn test_rejects_unknown_bytes() {
        assert!(image_payload(Bytes::from_static(b"definitely not an image")).is_err());
        assert!(audio_payload(Bytes::from_static(b"plain text")).is_err());
    }
}
