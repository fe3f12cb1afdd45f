//! Bounded-retry generation loop over the backend pool.
//!
//! One call to [`GenerationOrchestrator::attempt`] tries endpoints in random
//! weighted order, never the same endpoint twice, and stops on the first
//! success. Content-policy rejections are counted: once the count reaches the
//! blocked-retry budget the loop gives up with `Blocked` instead of trying
//! further endpoints.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::pool::{BackendPool, normalize_endpoint};
use super::traits::{BackendCall, ImageBackend};
use crate::telemetry;
use crate::types::{AttemptSummary, GenerationOutcome, ImageRequest};

/// Default number of blocked responses tolerated per attempt loop.
pub const DEFAULT_BLOCKED_RETRY_ATTEMPTS: usize = 2;

/// Immutable per-endpoint settings for the attempt loop.
///
/// ```rust
/// # use huginn::providers::BackendSettings;
/// let settings = BackendSettings::new()
///     .global_token("sk-global")
///     .endpoint_token("http://gpu-1:8000", "sk-gpu-1")
///     .model_alias("http://gpu-1:8000", "flux", "flux-schnell")
///     .blocked_retry_attempts(3);
/// ```
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// endpoint → (requested model → endpoint-specific model).
    pub model_map: HashMap<String, HashMap<String, String>>,
    /// endpoint → bearer token.
    pub tokens: HashMap<String, String>,
    /// Token used when an endpoint has none of its own.
    pub global_token: Option<String>,
    /// Blocked responses tolerated before giving up. Default: 2.
    pub blocked_retry_attempts: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            model_map: HashMap::new(),
            tokens: HashMap::new(),
            global_token: None,
            blocked_retry_attempts: DEFAULT_BLOCKED_RETRY_ATTEMPTS,
        }
    }
}

impl BackendSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token used for endpoints without their own.
    pub fn global_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.global_token = (!token.is_empty()).then_some(token);
        self
    }

    /// Set the bearer token for one endpoint.
    pub fn endpoint_token(mut self, endpoint: &str, token: impl Into<String>) -> Self {
        self.tokens.insert(normalize_endpoint(endpoint), token.into());
        self
    }

    /// Map a requested model name to the name one endpoint expects.
    pub fn model_alias(
        mut self,
        endpoint: &str,
        requested: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        self.model_map
            .entry(normalize_endpoint(endpoint))
            .or_default()
            .insert(requested.into(), actual.into());
        self
    }

    /// Set the blocked-retry budget.
    pub fn blocked_retry_attempts(mut self, n: usize) -> Self {
        self.blocked_retry_attempts = n;
        self
    }

    /// Model name to send to `endpoint` for a requested model.
    pub fn resolve_model<'a>(&'a self, endpoint: &str, requested: Option<&'a str>) -> Option<&'a str> {
        let requested = requested?;
        Some(
            self.model_map
                .get(endpoint)
                .and_then(|aliases| aliases.get(requested))
                .map(String::as_str)
                .unwrap_or(requested),
        )
    }

    /// Bearer token for `endpoint`: its own, else the global one.
    pub fn resolve_token(&self, endpoint: &str) -> Option<&str> {
        self.tokens
            .get(endpoint)
            .filter(|t| !t.is_empty())
            .or(self.global_token.as_ref())
            .map(String::as_str)
    }
}

/// Runs the attempt loop against an [`ImageBackend`].
pub struct GenerationOrchestrator {
    pool: BackendPool,
    backend: Arc<dyn ImageBackend>,
    settings: BackendSettings,
}

impl GenerationOrchestrator {
    pub fn new(pool: BackendPool, backend: Arc<dyn ImageBackend>, settings: BackendSettings) -> Self {
        Self {
            pool,
            backend,
            settings,
        }
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Upper bound on attempts for one call.
    pub fn max_attempts(&self) -> usize {
        self.pool
            .unique_len()
            .max(self.settings.blocked_retry_attempts)
    }

    /// Generate an image for `request` using `prompt` as the upstream prompt.
    ///
    /// Never fails: every failure mode is folded into the returned outcome.
    pub async fn attempt(&self, request: &ImageRequest, prompt: &str) -> AttemptSummary {
        let budget = self.settings.blocked_retry_attempts;
        let mut tried: HashSet<String> = HashSet::new();
        let mut blocked_count = 0usize;
        let mut was_blocked = false;
        let mut last = GenerationOutcome::error("no backends were available or all failed");

        for attempt in 1..=self.max_attempts() {
            let Some(endpoint) = self.pool.select(&tried).map(str::to_owned) else {
                debug!("no untried backends left");
                break;
            };
            tried.insert(endpoint.clone());

            if blocked_count >= budget {
                info!(blocked = blocked_count, budget, "blocked retry budget exhausted");
                last = GenerationOutcome::blocked(format!(
                    "request was blocked by {blocked_count} backends"
                ));
                was_blocked = true;
                break;
            }

            let model = self
                .settings
                .resolve_model(&endpoint, request.model.as_deref());
            if model != request.model.as_deref() {
                debug!(endpoint = %endpoint, requested = ?request.model, mapped = ?model, "model alias applied");
            }

            let call = BackendCall {
                endpoint: &endpoint,
                prompt,
                model,
                width: request.width,
                height: request.height,
                seed: request.seed,
                token: self.settings.resolve_token(&endpoint),
            };
            debug!(endpoint = %endpoint, attempt, model = ?model, "backend attempt");

            let outcome = self.backend.generate(&call).await;
            metrics::counter!(telemetry::BACKEND_ATTEMPTS_TOTAL,
                "endpoint" => endpoint.clone(),
                "outcome" => outcome.kind().as_str())
            .increment(1);

            match outcome {
                GenerationOutcome::Success(image) => {
                    info!(endpoint = %endpoint, attempt, "backend produced image");
                    return AttemptSummary {
                        outcome: GenerationOutcome::Success(image),
                        was_blocked,
                    };
                }
                GenerationOutcome::Blocked { ref reason } => {
                    warn!(endpoint = %endpoint, attempt, %reason, "attempt blocked");
                    blocked_count += 1;
                    was_blocked = true;
                    last = outcome;
                }
                GenerationOutcome::Error { ref reason } => {
                    warn!(endpoint = %endpoint, attempt, %reason, "attempt failed");
                    last = outcome;
                }
            }
        }

        info!(
            outcome = last.kind().as_str(),
            was_blocked,
            description = %request.description,
            "all backend attempts failed"
        );
        AttemptSummary {
            outcome: last,
            was_blocked,
        }
    }
}
