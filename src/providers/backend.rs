//! OpenAI-compatible image-generation client.
//!
//! Sends `POST {endpoint}/v1/images/generations` and classifies the result:
//!
//! | Response                                  | Outcome   |
//! |-------------------------------------------|-----------|
//! | transport failure, non-2xx other than 400 | `Error`   |
//! | HTTP 400 (any body)                        | `Blocked` |
//! | 2xx without `url` or `b64_json`            | `Blocked` |
//! | 2xx with `b64_json`                        | `Success` |
//! | 2xx with `url`, fetched OK                 | `Success` |
//! | 2xx with `url`, fetch failed               | `Error`   |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::{BackendCall, ImageBackend};
use crate::types::{GeneratedImage, GenerationOutcome, decode_base64_image};

/// Default timeout for generation requests.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Marker some backends put in the 400 body for moderation rejections.
const SAFETY_FILTER_MARKER: &str = "filtered by safety checks";

const DEFAULT_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Serialize)]
struct GenerationPayload<'a> {
    prompt: &'a str,
    n: u32,
    seed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedItem>,
}

#[derive(Debug, Deserialize)]
struct GeneratedItem {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

/// HTTP client speaking the OpenAI images API.
#[derive(Clone)]
pub struct OpenAiImageBackend {
    http: Client,
}

impl OpenAiImageBackend {
    /// Create a client with the default 120 s timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_GENERATION_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { http }
    }

    fn payload<'a>(call: &'a BackendCall<'a>) -> GenerationPayload<'a> {
        let size = match (call.width, call.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{w}x{h}")),
            _ => None,
        };
        GenerationPayload {
            prompt: call.prompt,
            n: 1,
            seed: call.seed,
            model: call.model,
            size,
        }
    }

    /// Classify a 400 body: explicit safety-filter detail, or a generic rejection.
    fn classify_bad_request(endpoint: &str, body: &str) -> GenerationOutcome {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| {
                json.get("detail")
                    .and_then(|d| d.as_str())
                    .or_else(|| json.pointer("/error/message").and_then(|m| m.as_str()))
                    .map(str::to_owned)
            });

        match detail {
            Some(d) if d.to_lowercase().contains(SAFETY_FILTER_MARKER) => GenerationOutcome::blocked(
                format!("backend {endpoint} blocked the prompt (safety filter)"),
            ),
            _ => GenerationOutcome::blocked(format!(
                "backend {endpoint} rejected the prompt (400 Bad Request)"
            )),
        }
    }

    /// Download a generated image from its URL.
    async fn fetch_image(&self, url: &str) -> Option<GeneratedImage> {
        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "image fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(%url, status = %response.status(), "image fetch returned error status");
            return None;
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        match response.bytes().await {
            Ok(bytes) => Some(GeneratedImage::new(bytes, content_type)),
            Err(e) => {
                warn!(%url, error = %e, "image body read failed");
                None
            }
        }
    }
}

impl Default for OpenAiImageBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageBackend for OpenAiImageBackend {
    async fn generate(&self, call: &BackendCall<'_>) -> GenerationOutcome {
        let url = format!("{}/v1/images/generations", call.endpoint);
        let mut request = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .json(&Self::payload(call));
        if let Some(token) = call.token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                return GenerationOutcome::error(format!(
                    "network error for {}: {e}",
                    call.endpoint
                ));
            }
        };

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Self::classify_bad_request(call.endpoint, &body);
        }
        if !status.is_success() {
            return GenerationOutcome::error(format!("backend returned {status} from {url}"));
        }

        let parsed: GenerationResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                return GenerationOutcome::error(format!(
                    "unreadable response from {}: {e}",
                    call.endpoint
                ));
            }
        };

        let Some(item) = parsed.data.into_iter().next() else {
            return GenerationOutcome::blocked(format!(
                "backend {} returned no image data (likely moderated)",
                call.endpoint
            ));
        };

        if let Some(encoded) = item.b64_json.as_deref().filter(|s| !s.is_empty()) {
            return match decode_base64_image(encoded) {
                Ok(image) => {
                    debug!(endpoint = call.endpoint, bytes = image.bytes.len(), "inline image decoded");
                    GenerationOutcome::Success(image.with_revised_prompt(item.revised_prompt))
                }
                Err(e) => GenerationOutcome::error(format!(
                    "invalid inline image from {}: {e}",
                    call.endpoint
                )),
            };
        }

        match item.url.as_deref().filter(|s| !s.is_empty()) {
            Some(image_url) => match self.fetch_image(image_url).await {
                Some(image) => {
                    GenerationOutcome::Success(image.with_revised_prompt(item.revised_prompt))
                }
                None => GenerationOutcome::error(format!(
                    "failed to fetch image from URL: {image_url}"
                )),
            },
            None => GenerationOutcome::blocked(format!(
                "backend {} returned no image data (likely moderated)",
                call.endpoint
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call<'a>(width: Option<u32>, height: Option<u32>) -> BackendCall<'a> {
        BackendCall {
            endpoint: "http://backend",
            prompt: "a fox",
            model: None,
            width,
            height,
            seed: 42,
            token: None,
        }
    }

    #[test]
    fn size_requires_both_dimensions() {
        let c = call(Some(512), None);
        assert!(OpenAiImageBackend::payload(&c).size.is_none());

        let c = call(Some(512), Some(256));
        assert_eq!(
            OpenAiImageBackend::payload(&c).size.as_deref(),
            Some("512x256")
        );
    }

    #[test]
    fn payload_omits_missing_model() {
        let c = call(None, None);
        let json = serde_json::to_value(OpenAiImageBackend::payload(&c)).unwrap();
        assert_eq!(json["n"], 1);
        assert_eq!(json["seed"], 42);
        assert!(json.get("model").is_none());
        assert!(json.get("size").is_none());
    }

    #[test]
    fn safety_detail_is_recognized() {
        let outcome = OpenAiImageBackend::classify_bad_request(
            "http://b",
            r#"{"detail":"Prompt was Filtered by Safety Checks"}"#,
        );
        assert!(outcome.reason().unwrap().contains("safety filter"));

        let outcome = OpenAiImageBackend::classify_bad_request(
            "http://b",
            r#"{"error":{"message":"filtered by safety checks"}}"#,
        );
        assert!(outcome.reason().unwrap().contains("safety filter"));
    }

    #[test]
    fn any_bad_request_is_blocked() {
        let outcome = OpenAiImageBackend::classify_bad_request("http://b", "not json");
        assert!(matches!(outcome, GenerationOutcome::Blocked { .. }));
        assert!(outcome.reason().unwrap().contains("400"));
    }
}
