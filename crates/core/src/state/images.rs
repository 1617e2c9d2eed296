//! # Image Attachments
//!
//! Screenshots and mockups attached to a mission before it starts.
//! Only the Scout and Architect stages ever see them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("unsupported MIME type '{0}' (expected image/*)")]
    UnsupportedMime(String),
    #[error("image data is not valid base64")]
    InvalidBase64,
    #[error("malformed data URL")]
    MalformedDataUrl,
    #[error("no image at index {0}")]
    NoSuchImage(usize),
}

/// An attached image, already base64-encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub data: String,
    #[serde(rename = "mimeType", alias = "mime_type")]
    pub mime_type: String,
}

impl ImageRef {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Encode raw file bytes
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Result<Self, ImageError> {
        check_mime(mime_type)?;
        Ok(Self::new(STANDARD.encode(bytes), mime_type))
    }

    /// Accept an already-encoded payload, checking it decodes
    pub fn from_base64(data: &str, mime_type: &str) -> Result<Self, ImageError> {
        check_mime(mime_type)?;
        let data = data.trim();
        STANDARD
            .decode(data)
            .map_err(|_| ImageError::InvalidBase64)?;
        Ok(Self::new(data, mime_type))
    }

    /// Parse a `data:image/png;base64,....` URL as produced by browser file readers
    pub fn from_data_url(url: &str) -> Result<Self, ImageError> {
        let rest = url
            .trim()
            .strip_prefix("data:")
            .ok_or(ImageError::MalformedDataUrl)?;
        let (meta, data) = rest.split_once(',').ok_or(ImageError::MalformedDataUrl)?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or(ImageError::MalformedDataUrl)?;
        Self::from_base64(data, mime)
    }

    /// Size of the decoded payload in bytes (approximate for padded input)
    pub fn decoded_len(&self) -> usize {
        let padding = self.data.chars().rev().take_while(|c| *c == '=').count();
        ((self.data.len() / 4) * 3).saturating_sub(padding.min(2))
    }
}

fn check_mime(mime_type: &str) -> Result<(), ImageError> {
    if mime_type.starts_with("image/") && mime_type.len() > "image/".len() {
        Ok(())
    } else {
        Err(ImageError::UnsupportedMime(mime_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_round_trips_through_base64() {
        let image = ImageRef::from_bytes(b"hello", "image/png").unwrap();
        assert_eq!(image.data, "aGVsbG8=");
        assert_eq!(image.decoded_len(), 5);
    }

    #[test]
    fn test_rejects_non_image_mime() {
        assert_eq!(
            ImageRef::from_bytes(b"x", "text/plain"),
            Err(ImageError::UnsupportedMime("text/plain".to_string()))
        );
    }

    #[test]
    fn test_data_url() {
        let image = ImageRef::from_data_url("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, "aGVsbG8=");

        assert_eq!(
            ImageRef::from_data_url("image/jpeg;base64,aGVsbG8="),
            Err(ImageError::MalformedDataUrl)
        );
        assert_eq!(
            ImageRef::from_data_url("data:image/jpeg;base64,@@@"),
            Err(ImageError::InvalidBase64)
        );
    }

    #[test]
    fn test_serializes_with_camel_case_mime() {
        let json = serde_json::to_value(ImageRef::new("AAAA", "image/gif")).unwrap();
        assert_eq!(json["mimeType"], "image/gif");
    }
}
