//! Pollinations-style fallback image source.
//!
//! `GET {base}/prompt/{url-encoded prompt}?model=...&nofeed=true[&width][&height]`
//! returns raw image bytes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::traits::FallbackProvider;
use crate::types::GeneratedImage;
use crate::{HuginnError, Result};

const DEFAULT_BASE_URL: &str = "https://image.pollinations.ai";
const DEFAULT_MODEL: &str = "flux-pro";
const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Fallback client for a Pollinations-compatible endpoint.
#[derive(Clone)]
pub struct PollinationsClient {
    http: Client,
    base_url: String,
    model: String,
}

impl PollinationsClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Override the model query parameter.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request_url(&self, prompt: &str, width: Option<u32>, height: Option<u32>) -> Result<Url> {
        let invalid =
            || HuginnError::Configuration(format!("invalid fallback URL: {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push("prompt")
            .push(prompt);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("model", &self.model)
                .append_pair("nofeed", "true");
            if let Some(w) = width.filter(|w| *w > 0) {
                query.append_pair("width", &w.to_string());
            }
            if let Some(h) = height.filter(|h| *h > 0) {
                query.append_pair("height", &h.to_string());
            }
        }
        Ok(url)
    }
}

impl Default for PollinationsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackProvider for PollinationsClient {
    fn name(&self) -> &str {
        "pollinations"
    }

    async fn generate(
        &self,
        prompt: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Option<GeneratedImage> {
        let url = match self.request_url(prompt, width, height) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "fallback request not sent");
                return None;
            }
        };
        debug!(%url, "fallback request");

        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "fallback request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "fallback returned error status");
            return None;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        match response.bytes().await {
            Ok(bytes) => {
                debug!(bytes = bytes.len(), %content_type, "fallback image downloaded");
                Some(GeneratedImage::new(bytes, content_type))
            }
            Err(e) => {
                warn!(error = %e, "fallback body read failed");
                None
            }
        }
    }
}
