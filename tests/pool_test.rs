//! Tests for weighted backend selection.

use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;

use huginn::providers::BackendPool;

fn weights(entries: &[(&str, i64)]) -> HashMap<String, i64> {
    entries
        .iter()
        .map(|(endpoint, weight)| (endpoint.to_string(), *weight))
        .collect()
}

fn tally(pool: &BackendPool, draws: usize) -> HashMap<String, usize> {
    let mut rng = StdRng::seed_from_u64(7);
    let exclude = HashSet::new();
    let mut counts = HashMap::new();
    for _ in 0..draws {
        let endpoint = pool.select_with(&exclude, &mut rng).unwrap();
        *counts.entry(endpoint.to_string()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn selection_follows_weights() {
    let pool = BackendPool::from_weights(
        ["http://a", "http://b"],
        &weights(&[("http://a", 2), ("http://b", 1)]),
    )
    .unwrap();

    let counts = tally(&pool, 6_000);
    let ratio = counts["http://a"] as f64 / counts["http://b"] as f64;
    assert!((1.7..2.3).contains(&ratio), "ratio was {ratio}");
}

#[test]
fn zero_weight_is_never_selected() {
    let pool = BackendPool::from_weights(
        ["http://a", "http://b"],
        &weights(&[("http://a", 0), ("http://b", 3)]),
    )
    .unwrap();

    let counts = tally(&pool, 500);
    assert!(!counts.contains_key("http://a"));
    assert_eq!(counts["http://b"], 500);
    // Still reported with its configured weight.
    assert_eq!(pool.weights()["http://a"], 0);
}

#[test]
fn all_zero_weights_become_uniform() {
    let pool = BackendPool::from_weights(
        ["http://a", "http://b"],
        &weights(&[("http://a", 0), ("http://b", 0)]),
    )
    .unwrap();

    assert_eq!(pool.weights()["http://a"], 1);
    assert_eq!(pool.weights()["http://b"], 1);
    let counts = tally(&pool, 2_000);
    assert!(counts["http://a"] > 800);
    assert!(counts["http://b"] > 800);
}

#[test]
fn negative_weight_becomes_one() {
    let pool = BackendPool::from_weights(["http://a"], &weights(&[("http://a", -5)])).unwrap();
    assert_eq!(pool.weights()["http://a"], 1);
}

#[test]
fn endpoints_are_normalized_and_deduplicated() {
    let pool = BackendPool::new(["http://a/", " http://a", "http://b", ""]).unwrap();
    assert_eq!(pool.unique_len(), 2);
    let endpoints: Vec<&str> = pool.weights().keys().map(String::as_str).collect();
    assert_eq!(endpoints, ["http://a", "http://b"]);
}

#[test]
fn empty_pool_is_rejected() {
    assert!(BackendPool::new(Vec::<String>::new()).is_err());
    assert!(BackendPool::new([" ", ""]).is_err());
}

#[test]
fn excluded_endpoints_are_skipped() {
    let pool = BackendPool::new(["http://a", "http://b"]).unwrap();
    let mut rng = StdRng::seed_from_u64(1);

    let exclude: HashSet<String> = ["http://a".to_string()].into();
    for _ in 0..50 {
        assert_eq!(pool.select_with(&exclude, &mut rng), Some("http://b"));
    }

    let exclude: HashSet<String> = ["http://a".to_string(), "http://b".to_string()].into();
    assert_eq!(pool.select_with(&exclude, &mut rng), None);
}
