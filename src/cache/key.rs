//! Content-addressed cache keys.

use std::fmt;

use sha2::{Digest, Sha256};

/// Token substituted for any absent (or zero / empty) key field, so the same
/// logical request always hashes identically.
const PLACEHOLDER: &str = "def";

/// SHA-256 hex digest identifying one logical image request.
///
/// Derived only from `(description, width, height, model, seed)`. The
/// description is trimmed and lower-cased first, so requests differing only
/// in casing or surrounding whitespace share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        description: &str,
        width: Option<u32>,
        height: Option<u32>,
        model: Option<&str>,
        seed: Option<i64>,
    ) -> Self {
        let normalized = description.trim().to_lowercase();
        let width = field(width.filter(|w| *w != 0));
        let height = field(height.filter(|h| *h != 0));
        let model = field(model.filter(|m| !m.is_empty()));
        let seed = field(seed.filter(|s| *s != 0));

        let material = format!("{normalized}|{width}|{height}|{model}|{seed}");
        let digest = Sha256::digest(material.as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Hex digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn field<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |v| v.to_string())
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
