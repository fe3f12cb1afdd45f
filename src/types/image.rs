//! Generated image payloads and base64 helpers

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::{HuginnError, Result};

/// Raw image bytes produced by a backend or the fallback provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Bytes,
    pub content_type: String,
    /// Prompt as rewritten by the backend itself, when it reports one.
    pub revised_prompt: Option<String>,
}

impl GeneratedImage {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            revised_prompt: None,
        }
    }

    /// Attach a backend-revised prompt.
    pub fn with_revised_prompt(mut self, revised: Option<String>) -> Self {
        self.revised_prompt = revised;
        self
    }
}

/// Strip an optional `data:image/...;base64,` prefix.
fn strip_data_uri(encoded: &str) -> &str {
    if let Some(rest) = encoded.strip_prefix("data:image/")
        && let Some(idx) = rest.find(";base64,")
    {
        return &rest[idx + ";base64,".len()..];
    }
    encoded
}

/// Guess the image MIME type from the leading characters of a base64 payload.
///
/// Falls back to `image/png` when the signature is unknown.
pub fn detect_content_type_from_base64(encoded: &str) -> &'static str {
    let clean = strip_data_uri(encoded);
    if clean.starts_with("iVBORw0KGgo") {
        "image/png"
    } else if clean.starts_with("/9j/") {
        "image/jpeg"
    } else if clean.starts_with("R0lGODlh") || clean.starts_with("R0lGODdh") {
        "image/gif"
    } else if clean.contains("UklGR") && clean.contains("V0VCUw") {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Decode a (possibly data-URI prefixed) base64 image into bytes plus
/// its detected content type.
pub fn decode_base64_image(encoded: &str) -> Result<GeneratedImage> {
    let clean = strip_data_uri(encoded.trim());
    let bytes = STANDARD
        .decode(clean)
        .map_err(|e| HuginnError::DataError(format!("invalid base64 image: {e}")))?;
    Ok(GeneratedImage::new(
        bytes,
        detect_content_type_from_base64(clean),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_signatures() {
        assert_eq!(detect_content_type_from_base64("iVBORw0KGgoAAA"), "image/png");
        assert_eq!(detect_content_type_from_base64("/9j/4AAQ"), "image/jpeg");
        assert_eq!(detect_content_type_from_base64("R0lGODlhAQ"), "image/gif");
        assert_eq!(
            detect_content_type_from_base64("UklGRiQAAABXRUJQVlA4IBgAAAAwAQCdASoBAAEAV0VCUw"),
            "image/webp"
        );
        assert_eq!(detect_content_type_from_base64("AAAA"), "image/png");
    }

    #[test]
    fn detection_ignores_data_uri_prefix() {
        assert_eq!(
            detect_content_type_from_base64("data:image/jpeg;base64,/9j/4AAQ"),
            "image/jpeg"
        );
    }

    #[test]
    fn decode_strips_prefix() {
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(b"\x89PNG"));
        let image = decode_base64_image(&encoded).unwrap();
        assert_eq!(image.bytes.as_ref(), b"\x89PNG");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_base64_image("not base64 !!").is_err());
    }
}
