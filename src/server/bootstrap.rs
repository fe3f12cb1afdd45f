//! Wiring a validated [`Config`] into a running [`ImageGateway`].

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::config::{Config, KvBackend, Secrets};
use crate::cache::{CacheStore, HostedStore, KeyValueStore, LocalStore, MemoryKeyValue};
use crate::gateway::ImageGateway;
use crate::prompt::{
    DEFAULT_OPTIMIZE_TEMPLATE, DEFAULT_SAFETY_TEMPLATE, PromptTransformer, resolve_template,
};
use crate::providers::traits::CompletionProvider;
use crate::providers::{
    BackendPool, BackendSettings, ChatCompletionClient, OpenAiImageBackend, PollinationsClient,
};
use crate::{HuginnError, Result};

/// Build the gateway described by `config`. Runs [`Config::validate`] first.
pub async fn build_gateway(config: &Config, secrets: &Secrets) -> Result<ImageGateway> {
    config.validate(secrets)?;

    let pool = BackendPool::from_weights(config.backends.urls.iter().cloned(), &config.backends.weights)?;
    for (endpoint, weight) in pool.weights() {
        let token = if secrets.backend_tokens.contains_key(endpoint) {
            "custom"
        } else if secrets.auth_token().is_some() {
            "global"
        } else {
            "none"
        };
        info!(%endpoint, weight, token, "backend configured");
    }

    let mut settings = BackendSettings::new()
        .blocked_retry_attempts(config.backends.blocked_retry_attempts);
    if let Some(token) = secrets.auth_token() {
        settings = settings.global_token(token);
    }
    for (endpoint, token) in &secrets.backend_tokens {
        settings = settings.endpoint_token(endpoint, token.clone());
    }
    for (endpoint, aliases) in &config.backends.model_map {
        for (requested, actual) in aliases {
            settings = settings.model_alias(endpoint, requested.clone(), actual.clone());
        }
    }

    let store = build_store(config, secrets).await?;
    info!(mode = store.mode().as_str(), "cache store ready");

    let mut builder = ImageGateway::builder()
        .store(store)
        .pool(pool)
        .settings(settings)
        .backend(Arc::new(OpenAiImageBackend::with_timeout(Duration::from_secs(
            config.backends.timeout_secs,
        ))))
        .fallback(Arc::new(build_fallback(config)))
        .transformer(build_transformer(config, secrets)?)
        .dedupe_in_flight(config.server.dedupe_in_flight);

    if let Some(api_url) = &config.llm_optimization.api_url {
        builder = builder.llm_info(api_url.clone(), config.llm_model());
    }

    builder.build()
}

async fn build_store(config: &Config, secrets: &Secrets) -> Result<Arc<dyn CacheStore>> {
    if !config.image_hosting.enabled {
        let store = LocalStore::open(&config.cache.dir).await?;
        info!(dir = %store.dir().display(), "local file cache");
        return Ok(Arc::new(store));
    }

    let uploader = config.hosting_settings(secrets)?.build()?;
    let kv: Arc<dyn KeyValueStore> = match config.image_hosting.kv_backend {
        KvBackend::Memory => Arc::new(MemoryKeyValue::new()),
        KvBackend::Redis => redis_backend(config)?,
    };
    info!(uploader = uploader.name(), kv = kv.name(), "hosted cache");
    Ok(Arc::new(HostedStore::new(kv, uploader)))
}

#[cfg(feature = "redis")]
fn redis_backend(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let url = config.image_hosting.redis_url.as_deref().unwrap_or_default();
    Ok(Arc::new(crate::cache::RedisKeyValue::new(
        url,
        config.image_hosting.key_prefix.clone(),
    )?))
}

#[cfg(not(feature = "redis"))]
fn redis_backend(_config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    Err(HuginnError::Configuration(
        "kv_backend = \"redis\" requires the `redis` feature".to_string(),
    ))
}

fn build_fallback(config: &Config) -> PollinationsClient {
    let client = match &config.fallback.base_url {
        Some(base_url) => PollinationsClient::with_base_url(base_url.clone()),
        None => PollinationsClient::new(),
    };
    match &config.fallback.model {
        Some(model) => client.model(model.clone()),
        None => client,
    }
}

fn build_transformer(config: &Config, secrets: &Secrets) -> Result<PromptTransformer> {
    let optimize = &config.llm_optimization;
    let safety = &config.safety_rewrite;
    if !optimize.enabled && !safety.enabled {
        return Ok(PromptTransformer::new(None));
    }

    let api_url = if optimize.enabled {
        optimize.api_url.as_deref()
    } else {
        config.safety_api_url()
    }
    .ok_or_else(|| HuginnError::Configuration("completion api_url is required".to_string()))?;

    let completion: Arc<dyn CompletionProvider> = Arc::new(
        ChatCompletionClient::new(api_url)
            .model(config.llm_model())
            .token(secrets.llm_optimization_token()),
    );
    let mut transformer = PromptTransformer::new(Some(completion));

    if optimize.enabled {
        let template = resolve_template(
            optimize.template_file.as_deref(),
            optimize.template.as_deref(),
            DEFAULT_OPTIMIZE_TEMPLATE,
        )?;
        info!(%api_url, model = config.llm_model(), "LLM prompt optimization enabled");
        transformer = transformer.with_optimization(template);
    }
    if safety.enabled {
        let template = resolve_template(
            safety.template_file.as_deref(),
            safety.template.as_deref(),
            DEFAULT_SAFETY_TEMPLATE,
        )?;
        info!("safety rewrite enabled");
        transformer = transformer.with_safety_rewrite(template);
    }
    Ok(transformer)
}
