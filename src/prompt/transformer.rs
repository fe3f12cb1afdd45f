//! LLM-backed prompt transforms: optimization and safety rewrite.
//!
//! Both go through the same path: memo lookup, template rendering, one
//! completion call, extraction, length rules, memo insert. Every failure
//! yields the input text unchanged, and failures are never memoized.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::extract::extract_prompt;
use super::templates::{self, DEFAULT_OPTIMIZE_TEMPLATE, DEFAULT_SAFETY_TEMPLATE};
use crate::cache::PromptTransformCache;
use crate::providers::traits::CompletionProvider;
use crate::telemetry;

/// Transformed prompts shorter than this are discarded.
const MIN_PROMPT_CHARS: usize = 5;
/// Transformed prompts are truncated to this many characters.
const MAX_PROMPT_CHARS: usize = 2000;
/// After truncation, cut at the last sentence end if it lies past this point.
const SENTENCE_CUT_THRESHOLD: usize = 1500;

/// Which transform is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOperation {
    Optimize,
    SafetyRewrite,
}

impl TransformOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformOperation::Optimize => "optimize",
            TransformOperation::SafetyRewrite => "safety_rewrite",
        }
    }
}

/// Runs prompt transforms against a [`CompletionProvider`].
pub struct PromptTransformer {
    completion: Option<Arc<dyn CompletionProvider>>,
    optimize_enabled: bool,
    safety_enabled: bool,
    optimize_template: String,
    safety_template: String,
    optimize_cache: PromptTransformCache,
    safety_cache: PromptTransformCache,
}

impl PromptTransformer {
    /// Create a transformer with both transforms disabled.
    pub fn new(completion: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self {
            completion,
            optimize_enabled: false,
            safety_enabled: false,
            optimize_template: DEFAULT_OPTIMIZE_TEMPLATE.to_string(),
            safety_template: DEFAULT_SAFETY_TEMPLATE.to_string(),
            optimize_cache: PromptTransformCache::new(),
            safety_cache: PromptTransformCache::new(),
        }
    }

    /// Enable prompt optimization with the given template.
    pub fn with_optimization(mut self, template: impl Into<String>) -> Self {
        self.optimize_enabled = true;
        self.optimize_template = template.into();
        self
    }

    /// Enable the safety rewrite with the given template.
    pub fn with_safety_rewrite(mut self, template: impl Into<String>) -> Self {
        self.safety_enabled = true;
        self.safety_template = template.into();
        self
    }

    pub fn optimization_enabled(&self) -> bool {
        self.optimize_enabled
    }

    pub fn safety_rewrite_enabled(&self) -> bool {
        self.safety_enabled
    }

    pub fn optimize_cache(&self) -> &PromptTransformCache {
        &self.optimize_cache
    }

    pub fn safety_cache(&self) -> &PromptTransformCache {
        &self.safety_cache
    }

    /// Optimize `text` for image generation. Identity when disabled.
    pub async fn optimize(&self, text: &str) -> String {
        if !self.optimize_enabled {
            return text.to_string();
        }
        self.transform(text, TransformOperation::Optimize).await
    }

    /// Rewrite `text` to pass content filters.
    ///
    /// `None` when disabled, when the call fails, or when the rewrite is
    /// identical to the input.
    pub async fn rewrite_for_safety(&self, text: &str) -> Option<String> {
        if !self.safety_enabled {
            return None;
        }
        let rewritten = self.transform(text, TransformOperation::SafetyRewrite).await;
        if rewritten == text {
            warn!("safety rewrite identical to input, treating as failed");
            return None;
        }
        Some(rewritten)
    }

    /// Memoized transform of `text`. Falls back to `text` on any failure.
    pub async fn transform(&self, text: &str, operation: TransformOperation) -> String {
        let (template, cache) = match operation {
            TransformOperation::Optimize => (&self.optimize_template, &self.optimize_cache),
            TransformOperation::SafetyRewrite => (&self.safety_template, &self.safety_cache),
        };

        if let Some(hit) = cache.get(text) {
            debug!(operation = operation.as_str(), "transform cache hit");
            return hit;
        }

        let Some(completion) = &self.completion else {
            warn!(operation = operation.as_str(), "no completion provider configured");
            return text.to_string();
        };

        let rendered = templates::render(template, text);
        let raw = match completion.complete(&rendered).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(operation = operation.as_str(), provider = completion.name(), error = %e, "completion failed, keeping original prompt");
                record(operation, "error");
                return text.to_string();
            }
        };

        let Some(extracted) = extract_prompt(&raw) else {
            warn!(operation = operation.as_str(), "no prompt found in completion, keeping original");
            record(operation, "error");
            return text.to_string();
        };

        let Some(finalized) = finalize_length(&extracted) else {
            warn!(operation = operation.as_str(), chars = extracted.chars().count(), "transformed prompt too short, keeping original");
            record(operation, "error");
            return text.to_string();
        };

        cache.insert(text, finalized.clone());
        record(operation, "ok");
        info!(operation = operation.as_str(), original = %text, transformed = %finalized, "prompt transformed");
        finalized
    }
}

fn record(operation: TransformOperation, status: &'static str) {
    metrics::counter!(telemetry::TRANSFORM_TOTAL,
        "operation" => operation.as_str(),
        "status" => status)
    .increment(1);
}

/// Apply the length rules. `None` means "too short, use the original".
pub fn finalize_length(text: &str) -> Option<String> {
    let len = text.chars().count();
    if len < MIN_PROMPT_CHARS {
        return None;
    }
    if len <= MAX_PROMPT_CHARS {
        return Some(text.to_string());
    }

    let truncated: String = text.chars().take(MAX_PROMPT_CHARS).collect();
    let truncated = truncated.trim();
    if let Some(byte_idx) = truncated.rfind('.')
        && truncated[..byte_idx].chars().count() > SENTENCE_CUT_THRESHOLD
    {
        return Some(truncated[..=byte_idx].to_string());
    }
    Some(truncated.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_results_rejected() {
        assert!(finalize_length("abcd").is_none());
        assert_eq!(finalize_length("abcde").as_deref(), Some("abcde"));
    }

    #[test]
    fn long_results_cut_at_late_sentence_end() {
        let mut text = "a".repeat(1800);
        text.push('.');
        text.push_str(&"b".repeat(500));
        let out = finalize_length(&text).unwrap();
        assert_eq!(out.chars().count(), 1801);
        assert!(out.ends_with('.'));
    }

    #[test]
    fn long_results_without_late_period_hard_truncate() {
        let mut text = "a".repeat(100);
        text.push('.');
        text.push_str(&"b".repeat(3000));
        let out = finalize_length(&text).unwrap();
        assert_eq!(out.chars().count(), MAX_PROMPT_CHARS);
    }

    #[tokio::test]
    async fn disabled_transforms_are_identity() {
        let transformer = PromptTransformer::new(None);
        assert_eq!(transformer.optimize("a cat").await, "a cat");
        assert!(transformer.rewrite_for_safety("a cat").await.is_none());
    }

    #[tokio::test]
    async fn missing_provider_keeps_original_without_memo() {
        let transformer = PromptTransformer::new(None).with_optimization("{ORIGINAL_PROMPT}");
        assert_eq!(transformer.optimize("a cat").await, "a cat");
        assert!(transformer.optimize_cache().is_empty());
    }
}
