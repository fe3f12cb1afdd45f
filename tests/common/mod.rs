//! Mock providers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use huginn::providers::traits::{
    BackendCall, CompletionProvider, FallbackProvider, ImageBackend, ImageUploader,
};
use huginn::{GeneratedImage, GenerationOutcome, HuginnError, Result};

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub fn png() -> GeneratedImage {
    GeneratedImage::new(PNG_BYTES.to_vec(), "image/png")
}

// ============================================================================
// Image backend
// ============================================================================

/// One recorded upstream call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: String,
    pub prompt: String,
    pub model: Option<String>,
    pub token: Option<String>,
}

/// Backend whose response is chosen by a closure over the call.
pub struct ScriptedBackend {
    script: Box<dyn Fn(&BackendCall<'_>) -> GenerationOutcome + Send + Sync>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new(
        script: impl Fn(&BackendCall<'_>) -> GenerationOutcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with a PNG.
    pub fn succeeding() -> Self {
        Self::new(|_| GenerationOutcome::Success(png()))
    }

    /// Every call is blocked.
    pub fn blocking() -> Self {
        Self::new(|_| GenerationOutcome::blocked("rejected by test backend"))
    }

    /// Every call fails technically.
    pub fn failing() -> Self {
        Self::new(|_| GenerationOutcome::error("test backend is down"))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageBackend for ScriptedBackend {
    async fn generate(&self, call: &BackendCall<'_>) -> GenerationOutcome {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint: call.endpoint.to_string(),
            prompt: call.prompt.to_string(),
            model: call.model.map(str::to_owned),
            token: call.token.map(str::to_owned),
        });
        (self.script)(call)
    }
}

// ============================================================================
// Fallback
// ============================================================================

pub struct MockFallback {
    succeed: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockFallback {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackProvider for MockFallback {
    fn name(&self) -> &str {
        "mock-fallback"
    }

    async fn generate(
        &self,
        prompt: &str,
        _width: Option<u32>,
        _height: Option<u32>,
    ) -> Option<GeneratedImage> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.succeed
            .then(|| GeneratedImage::new(b"fallback-jpeg".to_vec(), "image/jpeg"))
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Completion provider that answers from a lookup on the rendered prompt.
pub struct MockCompletion {
    responses: HashMap<String, String>,
    default: Option<String>,
    calls: AtomicUsize,
}

impl MockCompletion {
    /// Reply with `reply` to every prompt.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            responses: HashMap::new(),
            default: Some(reply.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call.
    pub fn failing() -> Self {
        Self {
            responses: HashMap::new(),
            default: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Reply with `reply` when the rendered prompt contains `needle`.
    pub fn when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.responses.insert(needle.into(), reply.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default.clone())
            .ok_or_else(|| HuginnError::Api {
                status: 503,
                message: "completion unavailable".to_string(),
            })
    }
}

// ============================================================================
// Uploader
// ============================================================================

pub struct MockUploader {
    base: String,
    uploads: AtomicUsize,
}

impl MockUploader {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            uploads: AtomicUsize::new(0),
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageUploader for MockUploader {
    fn name(&self) -> &str {
        "mock-uploader"
    }

    async fn upload(&self, _data: &[u8], filename: &str) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}/{filename}", self.base))
    }
}
