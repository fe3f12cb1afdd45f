//! Bounded memo of LLM prompt transformations.
//!
//! Keys are normalized (`trim` + lowercase) input prompts. When the cache is
//! full, the entry inserted first is evicted before a new key goes in.
//! Eviction follows insertion order, not access order: a hit does not
//! refresh an entry's position.

use std::sync::Mutex;

use indexmap::IndexMap;

/// Default number of memoized transformations per cache.
pub const DEFAULT_TRANSFORM_CAPACITY: usize = 1_000;

/// Insertion-ordered, capacity-bounded prompt → transformed-prompt map.
pub struct PromptTransformCache {
    entries: Mutex<IndexMap<String, String>>,
    capacity: usize,
}

impl PromptTransformCache {
    /// Create a cache holding up to 1,000 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TRANSFORM_CAPACITY)
    }

    /// Create a cache with a custom bound. A zero bound is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn normalize(text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Look up the memoized transformation of `text`.
    pub fn get(&self, text: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&Self::normalize(text)).cloned()
    }

    /// Memoize `transformed` for `text`, evicting the oldest entry if full.
    pub fn insert(&self, text: &str, transformed: impl Into<String>) {
        let key = Self::normalize(text);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(key, transformed.into());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PromptTransformCache {
    fn default() -> Self {
        Self::new()
    }
}
