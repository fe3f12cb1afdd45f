//! Pointer-based cache store.
//!
//! Raw image bytes never reach the key-value backend. A `Ready` record is
//! cached only after the image has been uploaded through an
//! [`ImageUploader`]; the entry then holds the hosted URL. `Blocked` and
//! `FallbackFailed` entries hold flags plus the prompt context.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CacheKey, CacheMode, CacheRecord, CacheStore, KeyValueStore, PromptContext, StoredImage};
use crate::providers::traits::ImageUploader;
use crate::types::GeneratedImage;
use crate::{HuginnError, Result};

/// Key namespace for image records inside the key-value backend.
const KEY_NAMESPACE: &str = "images";

/// Stored JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostedEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hosted_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revised_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    blocked: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    fallback_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    optimized_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rewritten_prompt: Option<String>,
}

/// Cache store that keeps hosted pointers in a [`KeyValueStore`].
pub struct HostedStore {
    kv: Arc<dyn KeyValueStore>,
    uploader: Arc<dyn ImageUploader>,
}

impl HostedStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, uploader: Arc<dyn ImageUploader>) -> Self {
        Self { kv, uploader }
    }

    fn entry_key(key: &CacheKey) -> String {
        format!("{KEY_NAMESPACE}:{key}")
    }

    fn upload_filename() -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}.png", &id[..12])
    }
}

fn to_entry(record: &CacheRecord) -> Result<HostedEntry> {
    let prompts = record.prompts();
    let mut entry = HostedEntry {
        optimized_prompt: prompts.optimized.clone(),
        rewritten_prompt: prompts.rewritten.clone(),
        ..Default::default()
    };
    match record {
        CacheRecord::Ready {
            image: StoredImage::Hosted { url },
            revised_prompt,
            ..
        } => {
            entry.hosted_url = Some(url.clone());
            entry.revised_prompt = revised_prompt.clone();
        }
        CacheRecord::Ready {
            image: StoredImage::Inline { .. },
            ..
        } => {
            return Err(HuginnError::UnsupportedRecord {
                store: "hosted",
                reason: "inline image bytes must be uploaded first".into(),
            });
        }
        CacheRecord::Blocked { .. } => entry.blocked = true,
        CacheRecord::FallbackFailed { .. } => entry.fallback_failed = true,
    }
    Ok(entry)
}

fn from_entry(entry: HostedEntry) -> Result<CacheRecord> {
    let prompts = PromptContext {
        optimized: entry.optimized_prompt,
        rewritten: entry.rewritten_prompt,
    };
    if entry.blocked {
        return Ok(CacheRecord::Blocked { prompts });
    }
    if entry.fallback_failed {
        return Ok(CacheRecord::FallbackFailed { prompts });
    }
    let url = entry
        .hosted_url
        .ok_or_else(|| HuginnError::DataError("hosted entry without URL or state flag".into()))?;
    Ok(CacheRecord::Ready {
        image: StoredImage::Hosted { url },
        revised_prompt: entry.revised_prompt,
        prompts,
    })
}

#[async_trait]
impl CacheStore for HostedStore {
    fn mode(&self) -> CacheMode {
        CacheMode::Hosted
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>> {
        match self.kv.get(&Self::entry_key(key)).await? {
            Some(raw) => {
                let entry: HostedEntry = serde_json::from_str(&raw)?;
                from_entry(entry).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, record: &CacheRecord) -> Result<()> {
        let entry = to_entry(record)?;
        self.kv
            .set(&Self::entry_key(key), serde_json::to_string(&entry)?)
            .await?;
        debug!(%key, state = record.state(), backend = self.kv.name(), "hosted cache write");
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.kv.delete(&Self::entry_key(key)).await
    }

    async fn persist_image(&self, image: &GeneratedImage) -> Result<StoredImage> {
        let url = self
            .uploader
            .upload(&image.bytes, &Self::upload_filename())
            .await?;
        debug!(uploader = self.uploader.name(), %url, "image uploaded");
        Ok(StoredImage::Hosted { url })
    }
}
