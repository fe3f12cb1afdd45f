//! Inbound image request parameters

use serde::{Deserialize, Serialize};

/// Seed used when the caller does not specify one, so repeated identical
/// prompts hit the same cache entry and reproduce the same image.
pub const DEFAULT_SEED: i64 = 42;

/// A single image-generation request as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: i64,
}

fn default_seed() -> i64 {
    DEFAULT_SEED
}

impl ImageRequest {
    /// Create a request for `description` with no size/model and the default seed.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            width: None,
            height: None,
            model: None,
            seed: DEFAULT_SEED,
        }
    }

    /// Set the requested width in pixels.
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Set the requested height in pixels.
    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Set the requested model name. Empty names are ignored.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = (!model.is_empty()).then_some(model);
        self
    }

    /// Set the generation seed.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    /// Compute the content-addressed cache key for this request.
    pub fn cache_key(&self) -> crate::cache::CacheKey {
        crate::cache::CacheKey::new(
            &self.description,
            self.width,
            self.height,
            self.model.as_deref(),
            Some(self.seed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_default_seed() {
        let req = ImageRequest::new("a cat");
        assert_eq!(req.seed, DEFAULT_SEED);
        assert!(req.width.is_none());
        assert!(req.model.is_none());
    }

    #[test]
    fn empty_model_is_ignored() {
        let req = ImageRequest::new("a cat").model("");
        assert!(req.model.is_none());
    }

    #[test]
    fn deserialize_applies_default_seed() {
        let req: ImageRequest = serde_json::from_str(r#"{"description": "a cat"}"#).unwrap();
        assert_eq!(req.seed, 42);
        assert_eq!(req.description, "a cat");
    }
}
