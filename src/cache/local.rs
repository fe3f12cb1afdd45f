//! Filesystem-backed cache store.
//!
//! Each key owns two files in the cache directory:
//!
//! - `{key}.meta.json`: pretty-printed sidecar describing the record state
//! - `{key}.data`: raw image bytes (only for inline `Ready` records)
//!
//! The sidecar is authoritative: no sidecar means no record. The blob is
//! written before the sidecar so a reader never sees a `Ready` sidecar whose
//! bytes have not landed yet.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CacheKey, CacheMode, CacheRecord, CacheStore, PromptContext, StoredImage};
use crate::Result;
use crate::types::GeneratedImage;

const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// On-disk sidecar format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hosted_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revised_prompt: Option<String>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    blocked: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    fallback_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    optimized_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rewritten_prompt: Option<String>,
}

impl SidecarMetadata {
    fn with_prompts(prompts: &PromptContext) -> Self {
        Self {
            created_at: Utc::now(),
            optimized_prompt: prompts.optimized.clone(),
            rewritten_prompt: prompts.rewritten.clone(),
            ..Default::default()
        }
    }

    fn prompts(&self) -> PromptContext {
        PromptContext {
            optimized: self.optimized_prompt.clone(),
            rewritten: self.rewritten_prompt.clone(),
        }
    }
}

/// Cache store keeping sidecar + blob files under one directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "local cache directory ready");
        Ok(Self { dir })
    }

    /// Directory holding the cache files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.data"))
    }

    fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.meta.json"))
    }

    /// Remove a file, reporting whether it existed.
    async fn remove_if_exists(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CacheStore for LocalStore {
    fn mode(&self) -> CacheMode {
        CacheMode::Local
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>> {
        let raw = match tokio::fs::read_to_string(self.meta_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: SidecarMetadata = serde_json::from_str(&raw)?;
        let prompts = meta.prompts();

        if meta.blocked {
            return Ok(Some(CacheRecord::Blocked { prompts }));
        }
        if meta.fallback_failed {
            return Ok(Some(CacheRecord::FallbackFailed { prompts }));
        }

        let image = match meta.hosted_url {
            Some(url) => StoredImage::Hosted { url },
            None => match tokio::fs::read(self.data_path(key)).await {
                Ok(bytes) => StoredImage::Inline {
                    bytes: Bytes::from(bytes),
                    content_type: meta
                        .content_type
                        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                },
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(%key, "sidecar present but image blob missing; treating as miss");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            },
        };

        Ok(Some(CacheRecord::Ready {
            image,
            revised_prompt: meta.revised_prompt,
            prompts,
        }))
    }

    async fn put(&self, key: &CacheKey, record: &CacheRecord) -> Result<()> {
        let mut meta = SidecarMetadata::with_prompts(record.prompts());

        match record {
            CacheRecord::Ready {
                image,
                revised_prompt,
                ..
            } => {
                meta.revised_prompt = revised_prompt.clone();
                match image {
                    StoredImage::Inline {
                        bytes,
                        content_type,
                    } => {
                        meta.content_type = Some(content_type.clone());
                        tokio::fs::write(self.data_path(key), bytes).await?;
                    }
                    StoredImage::Hosted { url } => {
                        meta.hosted_url = Some(url.clone());
                        meta.original_url = Some(url.clone());
                        Self::remove_if_exists(&self.data_path(key)).await?;
                    }
                }
            }
            CacheRecord::Blocked { .. } => {
                meta.blocked = true;
                Self::remove_if_exists(&self.data_path(key)).await?;
            }
            CacheRecord::FallbackFailed { .. } => {
                meta.fallback_failed = true;
                Self::remove_if_exists(&self.data_path(key)).await?;
            }
        }

        let json = serde_json::to_string_pretty(&meta)?;
        tokio::fs::write(self.meta_path(key), json).await?;
        debug!(%key, state = record.state(), "local cache write");
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let data = Self::remove_if_exists(&self.data_path(key)).await?;
        let meta = Self::remove_if_exists(&self.meta_path(key)).await?;
        Ok(data || meta)
    }

    async fn persist_image(&self, image: &GeneratedImage) -> Result<StoredImage> {
        Ok(StoredImage::Inline {
            bytes: image.bytes.clone(),
            content_type: image.content_type.clone(),
        })
    }
}
