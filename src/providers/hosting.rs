//! Image hosting uploaders.
//!
//! | Provider            | Multipart field | Auth                      | Success shape                  |
//! |---------------------|-----------------|---------------------------|--------------------------------|
//! | `smms`              | `smfile`        | `Authorization: <key>`    | `{success: true, data.url}`    |
//! | `picgo`             | `source`        | `X-API-Key: <key>`        | `{status_code: 200, image.url}`|
//! | `cloudflare_imgbed` | `file`          | `?authCode=<code>`        | `[{src}]`, relative to the URL |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::ImageUploader;
use crate::{HuginnError, Result};

const SMMS_API_URL: &str = "https://sm.ms/api/v2/upload";

/// Supported hosting providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostingProvider {
    Smms,
    Picgo,
    CloudflareImgbed,
}

impl HostingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostingProvider::Smms => "smms",
            HostingProvider::Picgo => "picgo",
            HostingProvider::CloudflareImgbed => "cloudflare_imgbed",
        }
    }
}

/// Everything needed to construct an uploader.
#[derive(Debug, Clone)]
pub struct HostingSettings {
    pub provider: HostingProvider,
    /// API key (smms, picgo).
    pub key: Option<String>,
    /// Upload endpoint (picgo, cloudflare_imgbed).
    pub url: Option<String>,
    /// Auth code query parameter (cloudflare_imgbed, optional).
    pub auth_code: Option<String>,
}

impl HostingSettings {
    /// Check that the provider's required fields are present.
    pub fn validate(&self) -> Result<()> {
        let missing = |field: &str| {
            HuginnError::Configuration(format!(
                "image hosting provider '{}' requires {field}",
                self.provider.as_str()
            ))
        };
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

        match self.provider {
            HostingProvider::Smms if !present(&self.key) => Err(missing("an API key")),
            HostingProvider::Picgo if !present(&self.key) => Err(missing("an API key")),
            HostingProvider::Picgo | HostingProvider::CloudflareImgbed if !present(&self.url) => {
                Err(missing("an upload URL"))
            }
            _ => Ok(()),
        }
    }

    /// Build the configured uploader.
    pub fn build(&self) -> Result<Arc<dyn ImageUploader>> {
        self.validate()?;
        let key = self.key.clone().unwrap_or_default();
        let url = self.url.clone().unwrap_or_default();
        Ok(match self.provider {
            HostingProvider::Smms => Arc::new(SmMsUploader::new(key)),
            HostingProvider::Picgo => Arc::new(PicGoUploader::new(key, url)),
            HostingProvider::CloudflareImgbed => {
                Arc::new(CloudflareImgbedUploader::new(&url, self.auth_code.clone())?)
            }
        })
    }
}

fn upload_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .expect("failed to build HTTP client")
}

fn file_part(data: &[u8], filename: &str) -> Part {
    Part::bytes(data.to_vec()).file_name(filename.to_string())
}

/// Read a JSON body regardless of status, so provider error messages survive.
async fn read_json(response: reqwest::Response) -> Result<(reqwest::StatusCode, Value)> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| HuginnError::Upload(e.to_string()))?;
    let json = serde_json::from_str(&body).map_err(|e| {
        HuginnError::Upload(format!("unparseable response (HTTP {status}): {e}"))
    })?;
    Ok((status, json))
}

fn message_at(json: &Value, pointer: &str) -> String {
    json.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string()
}

// ============================================================================
// SM.MS
// ============================================================================

/// SM.MS uploader.
pub struct SmMsUploader {
    http: Client,
    api_key: String,
    api_url: String,
}

impl SmMsUploader {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, SMMS_API_URL)
    }

    /// Create an uploader posting to a custom URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            http: upload_client(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl ImageUploader for SmMsUploader {
    fn name(&self) -> &str {
        "smms"
    }

    async fn upload(&self, data: &[u8], filename: &str) -> Result<String> {
        let form = Form::new().part("smfile", file_part(data, filename));
        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| HuginnError::Upload(e.to_string()))?;

        let (status, json) = read_json(response).await?;
        let succeeded = json.get("success").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !succeeded {
            return Err(HuginnError::Upload(message_at(&json, "/message")));
        }
        json.pointer("/data/url")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| HuginnError::Upload("response missing data.url".into()))
    }
}

// ============================================================================
// PicGo / Chevereto
// ============================================================================

/// PicGo (Chevereto API) uploader.
pub struct PicGoUploader {
    http: Client,
    api_key: String,
    api_url: String,
}

impl PicGoUploader {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            http: upload_client(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl ImageUploader for PicGoUploader {
    fn name(&self) -> &str {
        "picgo"
    }

    async fn upload(&self, data: &[u8], filename: &str) -> Result<String> {
        let form = Form::new().part("source", file_part(data, filename));
        let response = self
            .http
            .post(&self.api_url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| HuginnError::Upload(e.to_string()))?;

        let (status, json) = read_json(response).await?;
        let code = json.get("status_code").and_then(Value::as_i64);
        if !status.is_success() || code != Some(200) {
            return Err(HuginnError::Upload(message_at(&json, "/error/message")));
        }
        json.pointer("/image/url")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| HuginnError::Upload("response missing image.url".into()))
    }
}

// ============================================================================
// Cloudflare Imgbed
// ============================================================================

/// Cloudflare Imgbed uploader. Returned paths are resolved against the
/// upload URL.
pub struct CloudflareImgbedUploader {
    http: Client,
    api_url: Url,
    auth_code: Option<String>,
}

impl CloudflareImgbedUploader {
    pub fn new(api_url: &str, auth_code: Option<String>) -> Result<Self> {
        let api_url = Url::parse(api_url).map_err(|e| {
            HuginnError::Configuration(format!("invalid image hosting URL '{api_url}': {e}"))
        })?;
        Ok(Self {
            http: upload_client(),
            api_url,
            auth_code: auth_code.filter(|c| !c.is_empty()),
        })
    }

    fn request_url(&self) -> Url {
        let mut url = self.api_url.clone();
        if let Some(code) = &self.auth_code {
            url.query_pairs_mut().append_pair("authCode", code);
        }
        url
    }
}

#[async_trait]
impl ImageUploader for CloudflareImgbedUploader {
    fn name(&self) -> &str {
        "cloudflare_imgbed"
    }

    async fn upload(&self, data: &[u8], filename: &str) -> Result<String> {
        let form = Form::new().part("file", file_part(data, filename));
        let response = self
            .http
            .post(self.request_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| HuginnError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HuginnError::Upload(format!(
                "upload failed with status {}",
                response.status()
            )));
        }
        let (_, json) = read_json(response).await?;
        let src = json
            .pointer("/0/src")
            .and_then(Value::as_str)
            .ok_or_else(|| HuginnError::Upload("response missing [0].src".into()))?;
        self.api_url
            .join(src)
            .map(String::from)
            .map_err(|e| HuginnError::Upload(format!("invalid src '{src}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: HostingProvider) -> HostingSettings {
        HostingSettings {
            provider,
            key: None,
            url: None,
            auth_code: None,
        }
    }

    #[test]
    fn provider_requirements() {
        assert!(settings(HostingProvider::Smms).validate().is_err());
        assert!(settings(HostingProvider::CloudflareImgbed).validate().is_err());

        let mut picgo = settings(HostingProvider::Picgo);
        picgo.key = Some("k".into());
        assert!(picgo.validate().is_err());
        picgo.url = Some("https://picgo.example/api/1/upload".into());
        assert!(picgo.validate().is_ok());

        let mut cf = settings(HostingProvider::CloudflareImgbed);
        cf.url = Some("https://img.example/upload".into());
        assert!(cf.validate().is_ok());
    }

    #[test]
    fn provider_names_deserialize() {
        let p: HostingProvider = serde_json::from_str(r#""cloudflare_imgbed""#).unwrap();
        assert_eq!(p, HostingProvider::CloudflareImgbed);
    }

    #[test]
    fn imgbed_appends_auth_code() {
        let uploader =
            CloudflareImgbedUploader::new("https://img.example/upload", Some("abc".into()))
                .unwrap();
        assert_eq!(
            uploader.request_url().as_str(),
            "https://img.example/upload?authCode=abc"
        );
    }
}
