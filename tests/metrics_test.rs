//! Tests for metrics emitted during request handling.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

mod common;

use std::sync::Arc;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use tempfile::TempDir;

use common::{MockFallback, ScriptedBackend};
use huginn::cache::LocalStore;
use huginn::providers::BackendPool;
use huginn::telemetry;
use huginn::{ImageGateway, ImageRequest};

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a metric name and, optionally, one label.
fn counter_total(snapshot: &SnapshotVec, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| {
            label.is_none_or(|(k, v)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == k && l.value() == v)
            })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

async fn gateway(dir: &TempDir, backend: ScriptedBackend, fallback: MockFallback) -> ImageGateway {
    ImageGateway::builder()
        .store(Arc::new(LocalStore::open(dir.path()).await.unwrap()))
        .pool(BackendPool::new(["http://a", "http://b"]).unwrap())
        .backend(Arc::new(backend))
        .fallback(Arc::new(fallback))
        .build()
        .unwrap()
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
fn capture<F: std::future::Future>(recorder: &DebuggingRecorder, work: F) -> F::Output {
    metrics::with_local_recorder(recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(work))
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn miss_then_hit_records_cache_metrics() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, ScriptedBackend::succeeding(), MockFallback::failing()).await;

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    capture(&recorder, async {
        gateway.handle(ImageRequest::new("a fox")).await;
        gateway.handle(ImageRequest::new("a fox")).await;
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL, None), 1);
    assert_eq!(
        counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL, Some(("state", "ready"))),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::REQUESTS_TOTAL, Some(("outcome", "generated"))),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::REQUESTS_TOTAL, Some(("outcome", "cache_hit"))),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::BACKEND_ATTEMPTS_TOTAL, Some(("outcome", "success"))),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn blocked_request_records_attempts_and_fallback() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, ScriptedBackend::blocking(), MockFallback::failing()).await;

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    capture(&recorder, gateway.handle(ImageRequest::new("a fox")));

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_total(&snapshot, telemetry::BACKEND_ATTEMPTS_TOTAL, Some(("outcome", "blocked"))),
        2
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::FALLBACK_TOTAL, Some(("status", "error"))),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::REQUESTS_TOTAL, Some(("outcome", "failed"))),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, ScriptedBackend::succeeding(), MockFallback::failing()).await;
    gateway.handle(ImageRequest::new("a fox")).await;
}
