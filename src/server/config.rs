//! Configuration loading for huginnd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.huginn/secrets.toml` (user, must be 0600)
//! 2. `/etc/huginn/secrets.toml` (system, must be 0600)
//!
//! Every secret falls back to an environment variable when absent from the
//! file.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::providers::{DEFAULT_BLOCKED_RETRY_ATTEMPTS, DEFAULT_COMPLETION_MODEL, HostingProvider};
use crate::{HuginnError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub backends: BackendsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub image_hosting: ImageHostingConfig,
    #[serde(default)]
    pub llm_optimization: TransformConfig,
    #[serde(default)]
    pub safety_rewrite: TransformConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8080).
    #[serde(default = "default_address")]
    pub address: String,
    /// Collapse concurrent identical requests (default: false).
    #[serde(default)]
    pub dedupe_in_flight: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            dedupe_in_flight: false,
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Upstream image-generation endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendsConfig {
    pub urls: Vec<String>,
    /// endpoint → selection weight (default 1 each).
    #[serde(default)]
    pub weights: HashMap<String, i64>,
    /// endpoint → (requested model → endpoint model).
    #[serde(default)]
    pub model_map: HashMap<String, HashMap<String, String>>,
    /// Blocked responses tolerated per request (default: 2).
    #[serde(default = "default_blocked_retry_attempts")]
    pub blocked_retry_attempts: usize,
    /// Generation request timeout in seconds (default: 120).
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_blocked_retry_attempts() -> usize {
    DEFAULT_BLOCKED_RETRY_ATTEMPTS
}

fn default_generation_timeout() -> u64 {
    120
}

/// Local cache configuration (used when image hosting is disabled).
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Directory for sidecar and blob files (default: ./image_file_cache).
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./image_file_cache")
}

/// Key-value backend for the hosted cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KvBackend {
    #[default]
    Memory,
    Redis,
}

/// Image hosting configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageHostingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: Option<HostingProvider>,
    /// Upload endpoint (picgo, cloudflare_imgbed).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub kv_backend: KvBackend,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub key_prefix: Option<String>,
}

/// One LLM prompt transform (optimization or safety rewrite).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Completion API base URL. The safety rewrite falls back to the
    /// optimization URL when unset.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Inline template; literal `\n` sequences become newlines.
    #[serde(default)]
    pub template: Option<String>,
    /// Template file; takes precedence over `template`.
    #[serde(default)]
    pub template_file: Option<PathBuf>,
}

/// Fallback provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            HuginnError::Configuration(msg) => {
                HuginnError::Configuration(format!("Failed to parse config file {path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| HuginnError::Configuration(e.to_string()))
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HuginnError::Configuration(
            "No config file found. Create ~/.huginn/config.toml or /etc/huginn/config.toml"
                .to_string(),
        ))
    }

    /// Completion API URL for the safety rewrite.
    pub fn safety_api_url(&self) -> Option<&str> {
        self.safety_rewrite
            .api_url
            .as_deref()
            .or(self.llm_optimization.api_url.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Completion model name.
    pub fn llm_model(&self) -> &str {
        self.llm_optimization
            .model
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_COMPLETION_MODEL)
    }

    /// Check everything that would make the daemon unusable.
    pub fn validate(&self, secrets: &Secrets) -> Result<()> {
        if self.backends.urls.iter().all(|u| u.trim().is_empty()) {
            return Err(HuginnError::Configuration(
                "at least one backend URL is required ([backends] urls)".to_string(),
            ));
        }
        if secrets.proxy_access_key().is_none() {
            return Err(HuginnError::Configuration(
                "a proxy access key is required (secrets.toml or PROXY_ACCESS_KEY)".to_string(),
            ));
        }
        let has_url = |url: Option<&str>| url.is_some_and(|u| !u.is_empty());
        if self.llm_optimization.enabled && !has_url(self.llm_optimization.api_url.as_deref()) {
            return Err(HuginnError::Configuration(
                "LLM optimization is enabled but [llm_optimization] api_url is missing".to_string(),
            ));
        }
        if self.safety_rewrite.enabled && self.safety_api_url().is_none() {
            return Err(HuginnError::Configuration(
                "safety rewrite is enabled but no completion api_url is configured".to_string(),
            ));
        }
        if self.image_hosting.enabled {
            self.hosting_settings(secrets)?.validate()?;
            if self.image_hosting.kv_backend == KvBackend::Redis
                && !has_url(self.image_hosting.redis_url.as_deref())
            {
                return Err(HuginnError::Configuration(
                    "kv_backend = \"redis\" requires [image_hosting] redis_url".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Hosting settings merged with secrets.
    pub fn hosting_settings(&self, secrets: &Secrets) -> Result<crate::providers::HostingSettings> {
        let provider = self.image_hosting.provider.ok_or_else(|| {
            HuginnError::Configuration(
                "image hosting is enabled but [image_hosting] provider is missing".to_string(),
            )
        })?;
        Ok(crate::providers::HostingSettings {
            provider,
            key: secrets.image_hosting_key(),
            url: self.image_hosting.url.clone(),
            auth_code: secrets.image_hosting_auth_code(),
        })
    }
}

/// Secrets configuration (tokens and keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub proxy_access_key: Option<String>,
    #[serde(default)]
    pub admin_token: Option<String>,
    /// Global bearer token for backends without their own.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// endpoint → bearer token.
    #[serde(default)]
    pub backend_tokens: HashMap<String, String>,
    #[serde(default)]
    pub llm_optimization_token: Option<String>,
    #[serde(default)]
    pub image_hosting_key: Option<String>,
    #[serde(default)]
    pub image_hosting_auth_code: Option<String>,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.huginn/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/huginn/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (env vars still apply).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".huginn").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/huginn/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load secrets from a specific file, checking its permissions first.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(HuginnError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    fn pick(value: &Option<String>, env_var: &str) -> Option<String> {
        value
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| std::env::var(env_var).ok().filter(|v| !v.is_empty()))
    }

    pub fn proxy_access_key(&self) -> Option<String> {
        Self::pick(&self.proxy_access_key, "PROXY_ACCESS_KEY")
    }

    pub fn admin_token(&self) -> Option<String> {
        Self::pick(&self.admin_token, "ADMIN_TOKEN")
    }

    pub fn auth_token(&self) -> Option<String> {
        Self::pick(&self.auth_token, "AUTH_TOKEN")
    }

    pub fn llm_optimization_token(&self) -> Option<String> {
        Self::pick(&self.llm_optimization_token, "LLM_OPTIMIZATION_TOKEN")
    }

    pub fn image_hosting_key(&self) -> Option<String> {
        Self::pick(&self.image_hosting_key, "IMAGE_HOSTING_KEY")
    }

    pub fn image_hosting_auth_code(&self) -> Option<String> {
        Self::pick(&self.image_hosting_auth_code, "IMAGE_HOSTING_AUTH_CODE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [backends]
        urls = ["http://gpu-1:8000"]
    "#;

    fn secrets_with_key() -> Secrets {
        Secrets {
            proxy_access_key: Some("proxy".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn parse_minimal_config() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.server.address, "0.0.0.0:8080");
        assert!(!config.server.dedupe_in_flight);
        assert_eq!(config.backends.blocked_retry_attempts, 2);
        assert_eq!(config.backends.timeout_secs, 120);
        assert_eq!(config.cache.dir, PathBuf::from("./image_file_cache"));
        assert!(!config.image_hosting.enabled);
        assert_eq!(config.llm_model(), "gpt-4.1-mini");
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            address = "127.0.0.1:9000"
            dedupe_in_flight = true

            [backends]
            urls = ["http://a", "http://b"]
            blocked_retry_attempts = 3

            [backends.weights]
            "http://a" = 2
            "http://b" = 0

            [backends.model_map."http://a"]
            flux = "flux-dev"

            [image_hosting]
            enabled = true
            provider = "cloudflare_imgbed"
            url = "https://img.example/upload"
            kv_backend = "redis"
            redis_url = "redis://127.0.0.1:6379"

            [llm_optimization]
            enabled = true
            api_url = "http://llm:8080"
            model = "small-model"
            template = "Improve: {ORIGINAL_PROMPT}"

            [safety_rewrite]
            enabled = true

            [fallback]
            base_url = "http://fallback"
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.backends.weights.get("http://a"), Some(&2));
        assert_eq!(
            config.backends.model_map["http://a"].get("flux").map(String::as_str),
            Some("flux-dev")
        );
        assert_eq!(
            config.image_hosting.provider,
            Some(HostingProvider::CloudflareImgbed)
        );
        assert_eq!(config.image_hosting.kv_backend, KvBackend::Redis);
        assert_eq!(config.safety_api_url(), Some("http://llm:8080"));
        assert_eq!(config.llm_model(), "small-model");
        assert!(config.validate(&secrets_with_key()).is_ok());
    }

    #[test]
    fn missing_backends_section_is_error() {
        assert!(Config::parse("[server]\naddress = \"x\"").is_err());
    }

    #[test]
    fn empty_backend_list_fails_validation() {
        let config = Config::parse("[backends]\nurls = []").unwrap();
        assert!(config.validate(&secrets_with_key()).is_err());
    }

    #[test]
    fn optimization_without_api_url_fails_validation() {
        let mut config = Config::parse(MINIMAL).unwrap();
        config.llm_optimization.enabled = true;
        assert!(config.validate(&secrets_with_key()).is_err());
    }

    #[test]
    fn hosting_without_provider_fails_validation() {
        let mut config = Config::parse(MINIMAL).unwrap();
        config.image_hosting.enabled = true;
        assert!(config.validate(&secrets_with_key()).is_err());
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            proxy_access_key = "pk"
            admin_token = "admin"

            [backend_tokens]
            "http://a" = "tok-a"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.proxy_access_key().as_deref(), Some("pk"));
        assert_eq!(secrets.admin_token().as_deref(), Some("admin"));
        assert_eq!(
            secrets.backend_tokens.get("http://a").map(String::as_str),
            Some("tok-a")
        );
    }

    #[cfg(unix)]
    #[test]
    fn insecure_secrets_file_rejected() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "proxy_access_key = \"pk\"").unwrap();
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o644)).unwrap();
        assert!(Secrets::load_from_file(file.path()).is_err());

        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600)).unwrap();
        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert_eq!(secrets.proxy_access_key.as_deref(), Some("pk"));
    }
}
