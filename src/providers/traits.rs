//! Provider traits for the external capabilities the gateway depends on.
//!
//! Each capability gets its own narrow trait rather than one "god trait":
//!
//! - [`ImageBackend`]: one generation call against one upstream endpoint,
//!   already classified into a [`GenerationOutcome`]
//! - [`CompletionProvider`]: LLM text completion used for prompt transforms
//! - [`ImageUploader`]: image hosting upload returning a public URL
//! - [`FallbackProvider`]: last-resort single-shot image source
//!
//! Concrete HTTP clients live next to this module; tests substitute mocks.
//!
//! # Failure Semantics
//!
//! The generation and fallback paths never surface errors as `Err`: a failed
//! backend call is just another outcome for the orchestrator, and a failed
//! fallback is `None`. Completion and upload failures are `Err` so callers
//! can log the cause before substituting their default.

use async_trait::async_trait;

use crate::Result;
use crate::types::{GeneratedImage, GenerationOutcome};

// ============================================================================
// Image Backend
// ============================================================================

/// A single upstream generation call, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall<'a> {
    /// Endpoint base URL, without trailing slash.
    pub endpoint: &'a str,
    pub prompt: &'a str,
    /// Model name after per-endpoint alias resolution.
    pub model: Option<&'a str>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: i64,
    /// Bearer token, if any.
    pub token: Option<&'a str>,
}

/// Upstream image-generation endpoint contract.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Issue one generation request and classify the response.
    ///
    /// Must return `Success` only with usable image bytes, `Blocked` for
    /// content-policy rejections, and `Error` for everything else.
    async fn generate(&self, call: &BackendCall<'_>) -> GenerationOutcome;
}

// ============================================================================
// Completion Provider
// ============================================================================

/// LLM completion capability: given a fully rendered prompt, return the raw
/// model output.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ============================================================================
// Image Uploader
// ============================================================================

/// Image hosting upload capability.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Upload `data` under `filename`, returning the public URL.
    async fn upload(&self, data: &[u8], filename: &str) -> Result<String>;
}

// ============================================================================
// Fallback Provider
// ============================================================================

/// Secondary best-effort image source, called once without retry.
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Generate an image, or `None` on any failure.
    async fn generate(
        &self,
        prompt: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Option<GeneratedImage>;
}
