//! Engine Tests
//!
//! Async offload, batching, configuration loading and concurrent use of one
//! engine from many tasks.

use crate::catalog::CatalogSnapshot;
use crate::config::EngineConfig;
use crate::resolution::preferences::PreferenceStore;
use crate::resolution::{BannedMatchMode, ContextEngine, InMemoryPreferenceStore};
use serde_json::json;
use std::sync::Arc;

fn engine_with_workers(max_workers: usize) -> ContextEngine {
    let config = EngineConfig {
        max_workers,
        ..Default::default()
    };
    ContextEngine::new(config, Arc::new(InMemoryPreferenceStore::new()))
        .expect("config is valid")
}

fn descriptions() -> Vec<String> {
    [
        "Use FastAPI with PostgreSQL",
        "A serverless image pipeline on AWS",
        "Kafka streams into BigQuery for analytics",
        "Deploy Docker containers on Kubernetes",
        "Twilio SMS notifications for patients",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[tokio::test]
async fn test_batch_keeps_input_order() {
    let engine = engine_with_workers(2);
    let payloads = descriptions()
        .into_iter()
        .cycle()
        .take(20)
        .map(|d| json!({ "description": d }))
        .collect::<Vec<_>>();
    let expected: Vec<String> = descriptions().into_iter().cycle().take(20).collect();

    let reports = engine.resolve_batch(payloads).await;
    assert_eq!(reports.len(), 20);
    for (report, description) in reports.into_iter().zip(expected) {
        let report = report.expect("batch item resolves");
        assert_eq!(report.parsed.raw_text, description);
    }
    assert_eq!(engine.available_workers(), 2);
}

#[tokio::test]
async fn test_batch_matches_sequential_results() {
    let engine = engine_with_workers(3);
    let payloads: Vec<_> = descriptions()
        .into_iter()
        .map(|d| json!({ "description": d }))
        .collect();

    let sequential: Vec<_> = payloads.iter().map(|p| engine.resolve(p).weights).collect();
    let batched: Vec<_> = engine
        .resolve_batch(payloads)
        .await
        .into_iter()
        .map(|r| r.unwrap().weights)
        .collect();

    assert_eq!(sequential, batched);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_and_feedback() {
    let store = Arc::new(InMemoryPreferenceStore::new());
    let engine = ContextEngine::new(
        EngineConfig {
            max_workers: 2,
            ..Default::default()
        },
        store.clone(),
    )
    .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                engine.record_feedback(&["Redis".to_string()], &[], "general", &[]);
                None
            } else {
                let report = engine
                    .resolve_async(json!({ "description": "Cache sessions in Redis" }))
                    .await
                    .unwrap();
                Some(report.weights.contains_key("Redis"))
            }
        }));
    }

    for handle in handles {
        if let Some(found) = handle.await.unwrap() {
            assert!(found);
        }
    }

    let pref = store.preference("general", "Redis").unwrap();
    assert_eq!(pref.selection_count, 8);
    assert_eq!(engine.available_workers(), 2);
}

#[tokio::test]
async fn test_unknown_technologies_are_reported_not_registered() {
    let catalog = Arc::new(CatalogSnapshot::new(["FastAPI"]));
    let engine = engine_with_workers(1).with_catalog(catalog.clone());

    let report = engine
        .resolve_async(json!({ "description": "Use FastAPI with PostgreSQL and HubSpot" }))
        .await
        .unwrap();
    let unknown = engine.unknown_technologies(&report.weights).await;

    assert!(unknown.contains(&"PostgreSQL".to_string()));
    assert!(unknown.contains(&"HubSpot".to_string()));
    assert!(!unknown.contains(&"FastAPI".to_string()));
    assert_eq!(catalog.len(), 1);
}

#[test]
fn test_engine_from_environment() {
    temp_env::with_vars(
        [
            ("TECHCTX_MAX_WORKERS", Some("3")),
            ("TECHCTX_BANNED_MATCH", Some("token")),
            ("TECHCTX_FUZZY_MATCHING", Some("false")),
        ],
        || {
            let engine = ContextEngine::from_env().expect("env config is valid");
            assert_eq!(engine.config().max_workers, 3);
            assert_eq!(engine.config().banned_match_mode, BannedMatchMode::Token);
            assert!(!engine.config().fuzzy_matching);
            assert_eq!(engine.available_workers(), 3);
        },
    );
}

#[test]
fn test_engine_rejects_bad_environment() {
    temp_env::with_vars([("TECHCTX_MAX_WORKERS", Some("0"))], || {
        assert!(ContextEngine::from_env().is_err());
    });
}

#[test]
fn test_fuzzy_engine_recovers_typos_in_structured_fields() {
    let engine = engine_with_workers(1);
    let report = engine.resolve(&json!({
        "description": "Nightly sync job",
        "constraints": { "required_integrations": ["Salesforse"] }
    }));

    assert_eq!(report.tech_context.integration_requirements, vec!["Salesforce"]);
    assert!(report.weights.contains_key("Salesforce"));
}
