//! Request handling: cache lookup, generation, recovery and cache write.
//!
//! [`ImageGateway::handle`] resolves one [`ImageRequest`]:
//!
//! ```text
//!  cache ──Ready──────────────────────────────────────────► respond
//!    │
//!    ├─Blocked / FallbackFailed ─────────────────────────► fallback
//!    │
//!    └─miss ─► optimize ─► attempt ─success─► persist ───► respond
//!                             │
//!                             └─fail─► safety rewrite? ─► attempt again
//!                                                           │
//!                                   success ◄───────────────┤
//!                                   Blocked ─► mark blocked ─► fallback
//!                                   Error ─────────────────► fallback
//! ```
//!
//! Cache writes are best-effort: a failing store is logged, never surfaced.

mod builder;
mod single_flight;

pub use builder::GatewayBuilder;
pub use single_flight::SingleFlight;

use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::Result;
use crate::cache::{CacheKey, CacheRecord, CacheStore, PromptContext, StoredImage};
use crate::prompt::PromptTransformer;
use crate::providers::GenerationOrchestrator;
use crate::providers::traits::FallbackProvider;
use crate::telemetry;
use crate::types::{GeneratedImage, GenerationOutcome, ImageRequest, OutcomeKind};

/// What the caller should send back for a resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResponse {
    /// Raw image bytes.
    Image { bytes: Bytes, content_type: String },
    /// Redirect to a hosted copy.
    Redirect { url: String },
    /// Every generation path failed. `kind` is the final failure category.
    Failure { kind: OutcomeKind, message: String },
}

/// Read-only snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub backends: IndexMap<String, u32>,
    pub image_hosting: bool,
    pub cache_mode: &'static str,
    pub blocked_retry_attempts: usize,
    pub llm_optimization: TransformStatus,
    pub de_nsfw_rewriting: TransformStatus,
}

/// Status of one prompt transform.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformStatus {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<usize>,
}

/// The request handler. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ImageGateway {
    inner: Arc<GatewayInner>,
}

pub(crate) struct GatewayInner {
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) orchestrator: GenerationOrchestrator,
    pub(crate) transformer: PromptTransformer,
    pub(crate) fallback: Arc<dyn FallbackProvider>,
    pub(crate) in_flight: Option<SingleFlight<CacheKey, ImageResponse>>,
    pub(crate) llm_api_url: Option<String>,
    pub(crate) llm_model: Option<String>,
}

impl ImageGateway {
    /// Start configuring a gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub(crate) fn from_inner(inner: GatewayInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Resolve one image request. Never fails; failures come back as
    /// [`ImageResponse::Failure`].
    pub async fn handle(&self, request: ImageRequest) -> ImageResponse {
        match &self.inner.in_flight {
            Some(flights) => {
                let inner = self.inner.clone();
                flights
                    .run(request.cache_key(), move || {
                        async move { inner.resolve(&request).await }.boxed()
                    })
                    .await
            }
            None => self.inner.resolve(&request).await,
        }
    }

    /// Remove the cache record for `request`. Returns the key and whether
    /// a record existed.
    pub async fn delete_cached(&self, request: &ImageRequest) -> Result<(CacheKey, bool)> {
        let key = request.cache_key();
        let existed = self.inner.store.delete(&key).await?;
        info!(%key, existed, "admin cache delete");
        Ok((key, existed))
    }

    /// Snapshot of the effective configuration and cache sizes.
    pub fn status(&self) -> GatewayStatus {
        let inner = &self.inner;
        let transformer = &inner.transformer;
        let llm_optimization = if transformer.optimization_enabled() {
            TransformStatus {
                enabled: true,
                api_url: inner.llm_api_url.clone(),
                model: inner.llm_model.clone(),
                cache_size: Some(transformer.optimize_cache().len()),
            }
        } else {
            TransformStatus::disabled()
        };
        let de_nsfw_rewriting = if transformer.safety_rewrite_enabled() {
            TransformStatus {
                enabled: true,
                api_url: None,
                model: None,
                cache_size: Some(transformer.safety_cache().len()),
            }
        } else {
            TransformStatus::disabled()
        };

        let mode = inner.store.mode();
        GatewayStatus {
            status: "ok",
            version: crate::PKG_VERSION,
            backends: inner.orchestrator.pool().weights().clone(),
            image_hosting: mode == crate::cache::CacheMode::Hosted,
            cache_mode: mode.as_str(),
            blocked_retry_attempts: inner.orchestrator.settings().blocked_retry_attempts,
            llm_optimization,
            de_nsfw_rewriting,
        }
    }
}

impl TransformStatus {
    fn disabled() -> Self {
        Self {
            enabled: false,
            api_url: None,
            model: None,
            cache_size: None,
        }
    }
}

fn count_request(outcome: &'static str) {
    metrics::counter!(telemetry::REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

impl GatewayInner {
    async fn resolve(&self, request: &ImageRequest) -> ImageResponse {
        let key = request.cache_key();
        info!(%key, description = %request.description, model = ?request.model, seed = request.seed, "image request");

        let cached = match self.store.get(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                error!(%key, error = %e, "cache read failed, treating as miss");
                None
            }
        };

        match cached {
            Some(CacheRecord::Ready { image, .. }) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "state" => "ready").increment(1);
                count_request("cache_hit");
                info!(%key, "cache hit");
                match image {
                    StoredImage::Inline {
                        bytes,
                        content_type,
                    } => ImageResponse::Image {
                        bytes,
                        content_type,
                    },
                    StoredImage::Hosted { url } => ImageResponse::Redirect { url },
                }
            }
            Some(record) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "state" => record.state())
                    .increment(1);
                info!(%key, state = record.state(), "cache hit on failed state, going to fallback");
                let failure_kind = match record {
                    CacheRecord::Blocked { .. } => OutcomeKind::Blocked,
                    _ => OutcomeKind::Error,
                };
                let prompts = record.prompts();
                let optimized = match &prompts.optimized {
                    Some(optimized) => optimized.clone(),
                    None => self.transformer.optimize(&request.description).await,
                };
                let prompt = prompts.rewritten.clone().unwrap_or_else(|| optimized.clone());
                self.fallback(request, &key, &optimized, &prompt, failure_kind)
                    .await
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                info!(%key, "cache miss");
                self.generate(request, &key).await
            }
        }
    }

    async fn generate(&self, request: &ImageRequest, key: &CacheKey) -> ImageResponse {
        let optimized = self.transformer.optimize(&request.description).await;

        let first = self.orchestrator.attempt(request, &optimized).await;
        let mut outcome = first.outcome;
        let mut final_prompt = optimized.clone();
        let mut rewritten = None;

        if !outcome.is_success() && first.was_blocked && self.transformer.safety_rewrite_enabled()
        {
            info!(%key, "blocked during attempts, trying safety rewrite");
            match self.transformer.rewrite_for_safety(&optimized).await {
                Some(safe) => {
                    info!(%key, rewritten = %safe, "re-attempting with rewritten prompt");
                    outcome = self.orchestrator.attempt(request, &safe).await.outcome;
                    final_prompt = safe.clone();
                    rewritten = Some(safe);
                }
                None => info!(%key, "safety rewrite unavailable, going to fallback"),
            }
        }

        match outcome {
            GenerationOutcome::Success(image) => {
                let prompts = PromptContext {
                    optimized: Some(optimized.clone()),
                    rewritten,
                };
                self.respond_generated(request, key, image, prompts, &final_prompt)
                    .await
            }
            failed => {
                let kind = failed.kind();
                warn!(%key, kind = kind.as_str(), reason = failed.reason().unwrap_or_default(), "generation failed, using fallback");
                if kind == OutcomeKind::Blocked {
                    info!(%key, "marking prompt as blocked");
                    let record = CacheRecord::Blocked {
                        prompts: PromptContext {
                            optimized: Some(optimized.clone()),
                            rewritten,
                        },
                    };
                    self.put_best_effort(key, &record).await;
                }
                self.fallback(request, key, &optimized, &final_prompt, kind)
                    .await
            }
        }
    }

    /// Persist a backend image and build the response for it.
    async fn respond_generated(
        &self,
        request: &ImageRequest,
        key: &CacheKey,
        image: GeneratedImage,
        prompts: PromptContext,
        final_prompt: &str,
    ) -> ImageResponse {
        let stored = match self.store.persist_image(&image).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(%key, error = %e, "could not persist generated image, using fallback");
                let optimized = prompts.optimized.unwrap_or_default();
                return self
                    .fallback(request, key, &optimized, final_prompt, OutcomeKind::Error)
                    .await;
            }
        };

        let record = CacheRecord::Ready {
            image: stored.clone(),
            revised_prompt: image.revised_prompt.clone(),
            prompts,
        };
        self.put_best_effort(key, &record).await;
        count_request("generated");

        match stored {
            StoredImage::Hosted { url } => ImageResponse::Redirect { url },
            StoredImage::Inline { .. } => ImageResponse::Image {
                bytes: image.bytes,
                content_type: image.content_type,
            },
        }
    }

    /// Single call to the fallback provider; records the outcome either way.
    async fn fallback(
        &self,
        request: &ImageRequest,
        key: &CacheKey,
        optimized: &str,
        prompt: &str,
        failure_kind: OutcomeKind,
    ) -> ImageResponse {
        let prompts = PromptContext {
            optimized: Some(optimized.to_string()),
            rewritten: (prompt != optimized).then(|| prompt.to_string()),
        };

        let Some(image) = self
            .fallback
            .generate(prompt, request.width, request.height)
            .await
        else {
            metrics::counter!(telemetry::FALLBACK_TOTAL, "status" => "error").increment(1);
            error!(%key, provider = self.fallback.name(), "fallback provider failed");
            self.put_best_effort(key, &CacheRecord::FallbackFailed { prompts })
                .await;
            count_request("failed");
            return ImageResponse::Failure {
                kind: failure_kind,
                message: "failed to generate image from fallback provider".to_string(),
            };
        };
        metrics::counter!(telemetry::FALLBACK_TOTAL, "status" => "ok").increment(1);

        match self.store.persist_image(&image).await {
            Ok(stored) => {
                let record = CacheRecord::Ready {
                    image: stored,
                    revised_prompt: None,
                    prompts,
                };
                self.put_best_effort(key, &record).await;
            }
            Err(e) => warn!(%key, error = %e, "fallback image not cached"),
        }

        count_request("fallback");
        ImageResponse::Image {
            bytes: image.bytes,
            content_type: image.content_type,
        }
    }

    async fn put_best_effort(&self, key: &CacheKey, record: &CacheRecord) {
        if let Err(e) = self.store.put(key, record).await {
            error!(%key, state = record.state(), error = %e, "cache write failed");
        }
    }
}
