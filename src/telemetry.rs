//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `endpoint`: upstream backend base URL
//! - `outcome`: attempt or request outcome: "success", "blocked", "error"
//! - `state`: cache record state: "ready", "blocked", "fallback_failed"
//! - `operation`: prompt transform kind: "optimize" or "safety_rewrite"

/// Total image requests handled by the gateway.
///
/// Labels: `outcome` ("cache_hit" | "generated" | "fallback" | "failed").
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Total individual backend attempts made by the orchestrator.
///
/// Labels: `endpoint`, `outcome` ("success" | "blocked" | "error").
pub const BACKEND_ATTEMPTS_TOTAL: &str = "huginn_backend_attempts_total";

/// Total cache hits.
///
/// Labels: `state`.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache misses.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total fallback provider invocations.
///
/// Labels: `status` ("ok" | "error").
pub const FALLBACK_TOTAL: &str = "huginn_fallback_total";

/// Total prompt transform calls that reached the completion endpoint.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const TRANSFORM_TOTAL: &str = "huginn_transform_total";
