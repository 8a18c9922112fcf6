//! Scenario Tests
//!
//! End-to-end requirement scenarios run through the engine, plus the
//! invariants every report must hold.

use crate::config::EngineConfig;
use crate::resolution::{
    AmbiguityType, BannedMatchMode, ConflictDecision, ContextEngine, Ecosystem, ImpactLevel,
    InMemoryPreferenceStore,
};
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// Test Fixtures
// ============================================================================

const AWS_CONNECT: &str = "Integrate with Amazon Connect SDK to handle customer calls and use AWS Comprehend for sentiment analysis";

fn engine() -> ContextEngine {
    ContextEngine::new(EngineConfig::default(), Arc::new(InMemoryPreferenceStore::new()))
        .expect("default config is valid")
}

fn sample_requirements() -> Vec<serde_json::Value> {
    vec![
        json!({ "description": AWS_CONNECT }),
        json!({ "description": "use fastapi, postgres, redis, and docker" }),
        json!({ "description": "Run the ingestion on AWS Lambda and the reports on Azure Functions" }),
        json!({
            "description": "A containerized ecommerce backend with a REST API",
            "details": ["Orders in PostgreSQL", "Caching with Redis 7"],
            "constraints": { "banned_tools": ["mysql"], "compliance": ["pci dss"] }
        }),
        json!({ "summary": "Real-time dashboards fed by a nightly batch export, something like BigQuery" }),
        json!({ "notes": "" }),
    ]
}

// ============================================================================
// Scenarios
// ============================================================================

#[cfg(test)]
mod scenarios {
    use super::*;

    #[test]
    fn test_aws_connect_scenario() {
        let report = engine().resolve_text(AWS_CONNECT);

        for name in ["Amazon Connect SDK", "AWS Comprehend"] {
            let tech = report
                .parsed
                .explicit_technologies
                .iter()
                .find(|t| t.canonical_name == name)
                .unwrap_or_else(|| panic!("{} not extracted", name));
            assert!(tech.confidence >= 0.85, "{} confidence {}", name, tech.confidence);
        }
        assert_eq!(report.tech_context.ecosystem_preference, Some(Ecosystem::Aws));
        assert!(report.parsed.confidence_score > 0.7);
        assert_eq!(
            report.parsed.domain_context.primary_domain.as_deref(),
            Some("customer_service")
        );
    }

    #[test]
    fn test_alias_list_resolves_to_canonical_names() {
        let report = engine().resolve_text("use fastapi, postgres, redis, and docker");

        let names: Vec<&str> = report
            .tech_context
            .explicit_technologies
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, vec!["Docker", "FastAPI", "PostgreSQL", "Redis"]);
    }

    #[test]
    fn test_cross_cloud_serverless_is_high_impact() {
        let report =
            engine().resolve_text("Run the ingestion on AWS Lambda and the reports on Azure Functions");

        let mismatch = report
            .ambiguities
            .iter()
            .find(|a| {
                a.ambiguity_type == AmbiguityType::EcosystemMismatch
                    && a.impact_level == ImpactLevel::High
            });
        assert!(mismatch.is_some(), "ambiguities: {:?}", report.ambiguities);
        assert!(report.high_impact_ambiguities().count() >= 1);
        assert_eq!(report.tech_context.ecosystem_preference, None);
    }

    #[test]
    fn test_conflicts_are_annotated_not_removed() {
        let report = engine().resolve_text("Store orders in PostgreSQL or MongoDB");

        let selected: Vec<&String> = report
            .resolutions
            .iter()
            .filter(|(_, d)| matches!(d, ConflictDecision::Selected { .. }))
            .map(|(t, _)| t)
            .collect();
        assert_eq!(selected.len(), 1);

        let winner = selected[0].clone();
        let loser = if winner == "PostgreSQL" { "MongoDB" } else { "PostgreSQL" };
        assert_eq!(
            report.resolutions[loser].to_string(),
            format!("deprioritized in favor of {}", winner)
        );
        assert!(report.weights.contains_key("PostgreSQL"));
        assert!(report.weights.contains_key("MongoDB"));
    }

    #[test]
    fn test_unlisted_cloud_services_keep_their_names() {
        for (text, name) in [
            ("Use Amazon Polly for voice prompts on AWS", "Amazon Polly"),
            ("Search with Amazon Kendra", "Amazon Kendra"),
        ] {
            let report = engine().resolve_text(text);
            let explicit = &report.tech_context.explicit_technologies;
            assert!(explicit.contains_key(name), "{}: {:?}", text, explicit);
            assert!(!explicit.contains_key("Amazon Lex"), "{}: {:?}", text, explicit);
            assert!(!explicit.contains_key("Amazon Textract"), "{}: {:?}", text, explicit);
        }
    }

    #[test]
    fn test_free_text_constraints_field() {
        let report = engine().resolve(&json!({
            "description": "Store orders in MySQL or PostgreSQL",
            "constraints": "Do not use MySQL"
        }));

        assert!(report.tech_context.banned_tools.contains("MySQL"));
        assert!(!report.weights.contains_key("MySQL"));
        assert!(report.weights.contains_key("PostgreSQL"));
    }

    #[test]
    fn test_structured_payload() {
        let report = engine().resolve(&json!({
            "description": "Patient intake portal for a hospital network",
            "requirements": ["Store records in Postgres", "Expose a REST API"],
            "constraints": {
                "compliance": ["hipaa"],
                "sensitivity": "PHI",
                "deployment": "on-premise"
            }
        }));

        assert_eq!(report.parsed.constraints.compliance_requirements, vec!["HIPAA"]);
        assert_eq!(report.parsed.constraints.data_sensitivity.as_deref(), Some("PHI"));
        assert_eq!(
            report.parsed.domain_context.primary_domain.as_deref(),
            Some("healthcare")
        );
        assert!(report.weights.contains_key("PostgreSQL"));
        // Healthcare marks PostgreSQL as critical
        assert_eq!(report.weights["PostgreSQL"].domain_boost, 0.3);
    }
}

// ============================================================================
// Invariants
// ============================================================================

#[cfg(test)]
mod invariants {
    use super::*;

    #[test]
    fn test_weights_and_confidences_are_bounded() {
        let engine = engine();
        for payload in sample_requirements() {
            let report = engine.resolve(&payload);
            for weight in report.weights.values() {
                assert!(
                    (0.0..=1.0).contains(&weight.final_weight),
                    "{} weight {}",
                    weight.technology,
                    weight.final_weight
                );
            }
            for tech in &report.parsed.explicit_technologies {
                assert!((0.0..=1.0).contains(&tech.confidence));
            }
            assert!((0.0..=1.0).contains(&report.parsed.confidence_score));
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let engine = engine();
        for payload in sample_requirements() {
            let first = engine.resolve(&payload);
            let second = engine.resolve(&payload);
            assert_eq!(first.weights, second.weights);
            assert_eq!(first.ranked, second.ranked);
            assert_eq!(first.resolutions, second.resolutions);
            assert_ne!(first.request_id, second.request_id);
        }
    }

    #[test]
    fn test_banned_tools_never_reach_the_weight_map() {
        for mode in [BannedMatchMode::Substring, BannedMatchMode::Token] {
            let config = EngineConfig {
                banned_match_mode: mode,
                ..Default::default()
            };
            let engine =
                ContextEngine::new(config, Arc::new(InMemoryPreferenceStore::new())).unwrap();
            let report = engine.resolve(&json!({
                "description": "A containerized ecommerce backend on PostgreSQL and MySQL with Docker and Redis caching",
                "constraints": { "banned_tools": ["sql", "Docker"] }
            }));

            for key in report.weights.keys() {
                for banned in &report.tech_context.banned_tools {
                    assert!(
                        !mode.is_banned(key, banned),
                        "{} survived ban on {} ({:?})",
                        key,
                        banned,
                        mode
                    );
                }
            }
            assert!(!report.weights.contains_key("Docker"));
            assert!(report.weights.contains_key("Redis"));
        }

        // Substring mode is the documented default and removes partial names too
        let report = engine().resolve(&json!({
            "description": "PostgreSQL, MySQL and Redis",
            "constraints": { "banned_tools": ["SQL"] }
        }));
        for key in report.weights.keys() {
            let key = key.to_lowercase();
            assert!(!key.contains("sql") && !"sql".contains(key.as_str()));
        }
    }

    #[test]
    fn test_explicit_outranks_contextual() {
        let report = engine().resolve_text("Use Redis for sessions and store time-series telemetry");

        let redis = &report.weights["Redis"];
        let influx = &report.weights["InfluxDB"];
        assert!(report.tech_context.explicit_technologies.contains_key("Redis"));
        assert!(report.tech_context.contextual_technologies.contains_key("InfluxDB"));
        assert!(redis.final_weight >= influx.final_weight);
        assert_eq!(report.ranked.first().map(String::as_str), Some("Redis"));
    }

    #[test]
    fn test_every_weight_explains_itself() {
        let report = engine().resolve_text(AWS_CONNECT);
        for weight in report.weights.values() {
            assert!(!weight.reasoning.is_empty());
            assert_eq!(weight.source_weights.len(), 1);
        }
    }
}
