//! Tests for the bounded-retry attempt loop.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{ScriptedBackend, png};
use huginn::providers::{BackendPool, BackendSettings, GenerationOrchestrator, OpenAiImageBackend};
use huginn::{GenerationOutcome, ImageRequest};

const ENDPOINTS: [&str; 3] = ["http://a", "http://b", "http://c"];

fn orchestrator(
    backend: Arc<ScriptedBackend>,
    settings: BackendSettings,
) -> GenerationOrchestrator {
    GenerationOrchestrator::new(BackendPool::new(ENDPOINTS).unwrap(), backend, settings)
}

fn distinct_endpoints(backend: &ScriptedBackend) -> HashSet<String> {
    backend.calls().into_iter().map(|c| c.endpoint).collect()
}

#[tokio::test]
async fn first_success_stops_the_loop() {
    let backend = Arc::new(ScriptedBackend::succeeding());
    let summary = orchestrator(backend.clone(), BackendSettings::new())
        .attempt(&ImageRequest::new("a cat"), "a cat")
        .await;

    assert!(summary.outcome.is_success());
    assert!(!summary.was_blocked);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn blocked_budget_stops_before_trying_every_endpoint() {
    let backend = Arc::new(ScriptedBackend::blocking());
    let orchestrator = orchestrator(backend.clone(), BackendSettings::new());
    assert_eq!(orchestrator.max_attempts(), 3);

    let summary = orchestrator
        .attempt(&ImageRequest::new("a cat"), "a cat")
        .await;

    assert!(matches!(summary.outcome, GenerationOutcome::Blocked { .. }));
    assert!(summary.was_blocked);
    // Two blocked responses exhaust the default budget of two.
    assert_eq!(backend.call_count(), 2);
    assert_eq!(distinct_endpoints(&backend).len(), 2);
}

#[tokio::test]
async fn errors_try_every_endpoint_once() {
    let backend = Arc::new(ScriptedBackend::failing());
    let summary = orchestrator(backend.clone(), BackendSettings::new())
        .attempt(&ImageRequest::new("a cat"), "a cat")
        .await;

    assert!(matches!(summary.outcome, GenerationOutcome::Error { .. }));
    assert!(!summary.was_blocked);
    assert_eq!(backend.call_count(), 3);
    assert_eq!(distinct_endpoints(&backend).len(), 3);
}

#[tokio::test]
async fn blocked_then_error_still_reports_blocked_flag() {
    let backend = Arc::new(ScriptedBackend::new(|call| {
        if call.endpoint == "http://a" {
            GenerationOutcome::blocked("nsfw")
        } else {
            GenerationOutcome::error("down")
        }
    }));
    let summary = orchestrator(backend.clone(), BackendSettings::new().blocked_retry_attempts(5))
        .attempt(&ImageRequest::new("a cat"), "a cat")
        .await;

    assert!(!summary.outcome.is_success());
    assert!(summary.was_blocked);
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn success_after_block_keeps_blocked_flag() {
    let backend = Arc::new(ScriptedBackend::new(|call| {
        if call.endpoint == "http://a" {
            GenerationOutcome::blocked("nsfw")
        } else {
            GenerationOutcome::Success(png())
        }
    }));
    let pool = BackendPool::new(["http://a", "http://b"]).unwrap();
    let orchestrator = GenerationOrchestrator::new(pool, backend.clone(), BackendSettings::new());

    // Whichever endpoint goes first, the loop ends in success.
    let summary = orchestrator
        .attempt(&ImageRequest::new("a cat"), "a cat")
        .await;
    assert!(summary.outcome.is_success());
    let hit_a = distinct_endpoints(&backend).contains("http://a");
    assert_eq!(summary.was_blocked, hit_a);
}

#[tokio::test]
async fn budget_larger_than_pool_is_bounded_by_distinct_endpoints() {
    let backend = Arc::new(ScriptedBackend::blocking());
    let pool = BackendPool::new(["http://a"]).unwrap();
    let orchestrator = GenerationOrchestrator::new(
        pool,
        backend.clone(),
        BackendSettings::new().blocked_retry_attempts(4),
    );
    assert_eq!(orchestrator.max_attempts(), 4);

    let summary = orchestrator
        .attempt(&ImageRequest::new("a cat"), "a cat")
        .await;
    assert!(summary.was_blocked);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn model_alias_and_tokens_are_applied_per_endpoint() {
    let backend = Arc::new(ScriptedBackend::failing());
    let settings = BackendSettings::new()
        .global_token("global")
        .endpoint_token("http://a", "token-a")
        .model_alias("http://b", "flux", "flux-schnell");

    let request = ImageRequest::new("a cat").model("flux").seed(9);
    orchestrator(backend.clone(), settings)
        .attempt(&request, "an optimized cat")
        .await;

    for call in backend.calls() {
        assert_eq!(call.prompt, "an optimized cat");
        match call.endpoint.as_str() {
            "http://a" => {
                assert_eq!(call.token.as_deref(), Some("token-a"));
                assert_eq!(call.model.as_deref(), Some("flux"));
            }
            "http://b" => {
                assert_eq!(call.token.as_deref(), Some("global"));
                assert_eq!(call.model.as_deref(), Some("flux-schnell"));
            }
            "http://c" => {
                assert_eq!(call.token.as_deref(), Some("global"));
                assert_eq!(call.model.as_deref(), Some("flux"));
            }
            other => panic!("unexpected endpoint {other}"),
        }
    }
}

#[tokio::test]
async fn http_backends_rejecting_with_400_end_blocked() {
    let mut servers = Vec::new();
    for _ in 0..3 {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "detail": "bad prompt" })),
            )
            .mount(&server)
            .await;
        servers.push(server);
    }

    let pool = BackendPool::new(servers.iter().map(|s| s.uri())).unwrap();
    let orchestrator = GenerationOrchestrator::new(
        pool,
        Arc::new(OpenAiImageBackend::new()),
        BackendSettings::new(),
    );

    let summary = orchestrator
        .attempt(&ImageRequest::new("a cat"), "a cat")
        .await;
    assert!(matches!(summary.outcome, GenerationOutcome::Blocked { .. }));
    assert!(summary.was_blocked);

    let mut total = 0;
    for server in &servers {
        let received = server.received_requests().await.unwrap().len();
        assert!(received <= 1, "an endpoint was tried twice");
        total += received;
    }
    assert_eq!(total, 2);
}
