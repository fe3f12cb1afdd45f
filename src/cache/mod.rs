//! Caching subsystem.
//!
//! Two independent layers:
//!
//! - [`CacheStore`]: durable, content-addressed store of resolved image
//!   requests, keyed by [`CacheKey`]. Two implementations are selected at
//!   startup:
//!   - [`LocalStore`] writes a JSON sidecar plus a raw blob per key on disk.
//!   - [`HostedStore`] uploads images to a hosting provider and keeps only
//!     the resulting pointer (or the permanent-state flags) in a
//!     [`KeyValueStore`].
//!
//! - [`PromptTransformCache`]: bounded in-memory memo of LLM prompt
//!   transformations (optimization, safety rewrite).
//!
//! # Record lifecycle
//!
//! ```text
//!   miss ──► Ready            (backend or fallback image)
//!     │
//!     ├───► Blocked          (all backends rejected the prompt)
//!     │
//!     └───► FallbackFailed   (fallback provider failed too)
//! ```
//!
//! A later write for the same key replaces the record. `Blocked` never
//! expires on its own; only [`CacheStore::delete`] (admin path) clears it.

mod hosted;
mod key;
pub mod kv;
mod local;
mod record;
pub mod transform;

pub use hosted::HostedStore;
pub use key::CacheKey;
pub use kv::{KeyValueStore, MemoryKeyValue};
pub use local::LocalStore;
pub use record::{CacheRecord, PromptContext, StoredImage};
pub use transform::PromptTransformCache;

#[cfg(feature = "redis")]
pub use kv::RedisKeyValue;

use async_trait::async_trait;

use crate::Result;
use crate::types::GeneratedImage;

/// Which storage strategy a [`CacheStore`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Sidecar + blob files on the local filesystem.
    Local,
    /// Hosted pointers in a key-value store.
    Hosted,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Local => "local",
            CacheMode::Hosted => "hosted",
        }
    }
}

/// Persistent store of resolved image requests.
///
/// Implementations must be safe under interleaved access; concurrent writes
/// for the same key resolve as last-write-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Storage strategy, for logging and the status endpoint.
    fn mode(&self) -> CacheMode;

    /// Look up a record. `Ok(None)` is a cache miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>>;

    /// Store (or replace) a record.
    async fn put(&self, key: &CacheKey, record: &CacheRecord) -> Result<()>;

    /// Remove a record. Returns whether anything existed.
    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// Convert freshly generated bytes into the representation this store
    /// keeps in a `Ready` record. Local stores keep bytes inline; hosted
    /// stores upload and return a pointer.
    async fn persist_image(&self, image: &GeneratedImage) -> Result<StoredImage>;
}
