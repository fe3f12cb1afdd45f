//! Cache record states.

use bytes::Bytes;

/// How a `Ready` image is held: inline bytes, or a pointer to hosted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredImage {
    Inline { bytes: Bytes, content_type: String },
    Hosted { url: String },
}

/// Optimized / safety-rewritten prompt text remembered alongside a record,
/// so a later hit can skip the LLM round-trips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    pub optimized: Option<String>,
    pub rewritten: Option<String>,
}

impl PromptContext {
    pub fn new(optimized: impl Into<String>, rewritten: Option<String>) -> Self {
        Self {
            optimized: Some(optimized.into()),
            rewritten,
        }
    }
}

/// A resolved cache entry. Absence of a record is a cache miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRecord {
    /// A generated image is available.
    Ready {
        image: StoredImage,
        revised_prompt: Option<String>,
        prompts: PromptContext,
    },
    /// Every generation path rejected the prompt. Later hits go straight to
    /// the fallback provider.
    Blocked { prompts: PromptContext },
    /// The fallback provider itself failed for this key.
    FallbackFailed { prompts: PromptContext },
}

impl CacheRecord {
    /// Prompt context carried by any state.
    pub fn prompts(&self) -> &PromptContext {
        match self {
            CacheRecord::Ready { prompts, .. }
            | CacheRecord::Blocked { prompts }
            | CacheRecord::FallbackFailed { prompts } => prompts,
        }
    }

    /// Short state name for logs and metric labels.
    pub fn state(&self) -> &'static str {
        match self {
            CacheRecord::Ready { .. } => "ready",
            CacheRecord::Blocked { .. } => "blocked",
            CacheRecord::FallbackFailed { .. } => "fallback_failed",
        }
    }
}
