//! Builder for configuring gateway instances

use std::sync::Arc;

use super::{GatewayInner, ImageGateway, SingleFlight};
use crate::cache::CacheStore;
use crate::prompt::PromptTransformer;
use crate::providers::traits::{FallbackProvider, ImageBackend};
use crate::providers::{
    BackendPool, BackendSettings, GenerationOrchestrator, OpenAiImageBackend, PollinationsClient,
};
use crate::{HuginnError, Result};

/// Builder for [`ImageGateway`].
///
/// A cache store and a backend pool are required; everything else has a
/// working default (OpenAI-compatible backend client, Pollinations fallback,
/// transforms disabled, no in-flight deduplication).
pub struct GatewayBuilder {
    store: Option<Arc<dyn CacheStore>>,
    pool: Option<BackendPool>,
    backend: Option<Arc<dyn ImageBackend>>,
    settings: BackendSettings,
    transformer: Option<PromptTransformer>,
    fallback: Option<Arc<dyn FallbackProvider>>,
    dedupe_in_flight: bool,
    llm_api_url: Option<String>,
    llm_model: Option<String>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            pool: None,
            backend: None,
            settings: BackendSettings::default(),
            transformer: None,
            fallback: None,
            dedupe_in_flight: false,
            llm_api_url: None,
            llm_model: None,
        }
    }

    /// Set the cache store.
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the upstream endpoint pool.
    pub fn pool(mut self, pool: BackendPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Replace the upstream client.
    pub fn backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set per-endpoint tokens, model aliases and the blocked-retry budget.
    pub fn settings(mut self, settings: BackendSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the prompt transformer.
    pub fn transformer(mut self, transformer: PromptTransformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Replace the fallback provider.
    pub fn fallback(mut self, fallback: Arc<dyn FallbackProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Collapse concurrent requests for the same cache key into one
    /// generation.
    pub fn dedupe_in_flight(mut self, enabled: bool) -> Self {
        self.dedupe_in_flight = enabled;
        self
    }

    /// Completion endpoint details reported by the status snapshot.
    pub fn llm_info(mut self, api_url: impl Into<String>, model: impl Into<String>) -> Self {
        self.llm_api_url = Some(api_url.into());
        self.llm_model = Some(model.into());
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<ImageGateway> {
        let store = self
            .store
            .ok_or_else(|| HuginnError::Configuration("a cache store is required".into()))?;
        let pool = self
            .pool
            .ok_or_else(|| HuginnError::Configuration("a backend pool is required".into()))?;
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(OpenAiImageBackend::new()));
        let fallback = self
            .fallback
            .unwrap_or_else(|| Arc::new(PollinationsClient::new()));

        Ok(ImageGateway::from_inner(GatewayInner {
            store,
            orchestrator: GenerationOrchestrator::new(pool, backend, self.settings),
            transformer: self
                .transformer
                .unwrap_or_else(|| PromptTransformer::new(None)),
            fallback,
            in_flight: self.dedupe_in_flight.then(SingleFlight::new),
            llm_api_url: self.llm_api_url,
            llm_model: self.llm_model,
        }))
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
