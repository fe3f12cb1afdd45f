//! Weighted upstream endpoint selection.
//!
//! The pool is built once from the configured endpoint list and an optional
//! weight table, then only read. Selection draws a point on the cumulative
//! weight line of the endpoints that are not excluded.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use rand::Rng;
use tracing::warn;

use crate::{HuginnError, Result};

/// Weighted, exclude-aware random selection over upstream endpoints.
#[derive(Debug, Clone)]
pub struct BackendPool {
    /// Unique endpoints in configuration order, with effective weights.
    weights: IndexMap<String, u32>,
}

impl BackendPool {
    /// Build a pool where every endpoint has weight 1.
    pub fn new<I, S>(endpoints: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_weights(endpoints, &HashMap::new())
    }

    /// Build a pool from endpoints plus a weight table.
    ///
    /// Endpoints missing from the table get weight 1. Negative weights are
    /// replaced with 1 and logged. Zero excludes the endpoint from selection,
    /// unless every endpoint ends up at zero, in which case all of them are
    /// weighted equally.
    pub fn from_weights<I, S>(endpoints: I, weights: &HashMap<String, i64>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = IndexMap::new();
        for endpoint in endpoints {
            let endpoint = normalize_endpoint(&endpoint.into());
            if endpoint.is_empty() || table.contains_key(&endpoint) {
                continue;
            }
            let weight = match weights.get(&endpoint).copied() {
                None => 1,
                Some(w) if w < 0 => {
                    warn!(endpoint = %endpoint, weight = w, "invalid backend weight, using 1");
                    1
                }
                Some(w) => u32::try_from(w).unwrap_or(u32::MAX),
            };
            table.insert(endpoint, weight);
        }

        if table.is_empty() {
            return Err(HuginnError::Configuration(
                "at least one backend endpoint is required".to_string(),
            ));
        }

        if table.values().all(|&w| w == 0) {
            warn!("all backend weights are zero, weighting endpoints equally");
            for weight in table.values_mut() {
                *weight = 1;
            }
        }

        Ok(Self { weights: table })
    }

    /// Pick an endpoint not in `exclude`, using the thread-local RNG.
    pub fn select(&self, exclude: &HashSet<String>) -> Option<&str> {
        self.select_with(exclude, &mut rand::thread_rng())
    }

    /// Pick an endpoint not in `exclude`, using the given RNG.
    pub fn select_with<R: Rng + ?Sized>(
        &self,
        exclude: &HashSet<String>,
        rng: &mut R,
    ) -> Option<&str> {
        let candidates = move || {
            self.weights
                .iter()
                .filter(move |(endpoint, weight)| **weight > 0 && !exclude.contains(*endpoint))
        };
        let total: u64 = candidates().map(|(_, &w)| u64::from(w)).sum();
        if total == 0 {
            return None;
        }

        let mut point = rng.gen_range(0..total);
        for (endpoint, &weight) in candidates() {
            let weight = u64::from(weight);
            if point < weight {
                return Some(endpoint.as_str());
            }
            point -= weight;
        }
        None
    }

    /// Effective weight per endpoint, in configuration order.
    pub fn weights(&self) -> &IndexMap<String, u32> {
        &self.weights
    }

    /// Number of distinct endpoints.
    pub fn unique_len(&self) -> usize {
        self.weights.len()
    }
}

/// Trim whitespace and trailing slashes so `http://a/` and `http://a` match.
pub(crate) fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}
