//! Context Prioritizer
//!
//! Computes an explainable `ContextWeight` for every explicit and contextual
//! technology. Boosts are additive and recorded with a reason string; banned
//! technologies are removed last, regardless of weight.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::aliases::AliasRegistry;
use super::preferences::PreferenceStore;
use super::types::{
    clamp_unit, BannedMatchMode, ContextWeight, ParsedRequirements, SourceOrigin, TechContext,
};

const CRITICAL_BOOST: f32 = 0.3;
const HIGH_BOOST: f32 = 0.2;
const MEDIUM_BOOST: f32 = 0.1;
const ECOSYSTEM_BOOST: f32 = 0.15;
const PREFERENCE_FACTOR: f32 = 0.1;

/// Domain fallback when no domain was identified
pub const GENERAL_DOMAIN: &str = "general";

/// Technology tiers per domain: critical, high, medium.
struct DomainTiers {
    domain: &'static str,
    critical: &'static [&'static str],
    high: &'static [&'static str],
    medium: &'static [&'static str],
}

const DOMAIN_TIERS: &[DomainTiers] = &[
    DomainTiers {
        domain: "customer_service",
        critical: &["Amazon Connect", "Amazon Connect SDK", "Twilio"],
        high: &["AWS Comprehend", "Amazon Lex", "Salesforce", "Azure Communication Services", "Dialogflow"],
        medium: &["Redis", "PostgreSQL", "Slack", "Amazon Transcribe"],
    },
    DomainTiers {
        domain: "ml_ai",
        critical: &["Amazon Bedrock", "Vertex AI", "Azure OpenAI", "OpenAI API"],
        high: &["LangChain", "AWS Comprehend", "Azure Cognitive Services", "Python"],
        medium: &["Apache Spark", "pandas", "Redis"],
    },
    DomainTiers {
        domain: "data_processing",
        critical: &["Apache Airflow", "Apache Spark", "BigQuery"],
        high: &["Apache Kafka", "AWS Glue", "PostgreSQL"],
        medium: &["pandas", "Redis", "Amazon S3"],
    },
    DomainTiers {
        domain: "ecommerce",
        critical: &["PostgreSQL", "Redis"],
        high: &["Elasticsearch", "React", "Amazon S3"],
        medium: &["RabbitMQ", "Docker"],
    },
    DomainTiers {
        domain: "finance",
        critical: &["PostgreSQL"],
        high: &["Apache Kafka", "Java", "Spring Boot"],
        medium: &["Redis", "Docker"],
    },
    DomainTiers {
        domain: "healthcare",
        critical: &["PostgreSQL"],
        high: &["Azure Cosmos DB", "Azure Cognitive Services"],
        medium: &["Redis", "Docker"],
    },
    DomainTiers {
        domain: "document_processing",
        critical: &["Amazon Textract"],
        high: &["Azure Cognitive Services", "Python"],
        medium: &["Amazon S3", "Azure Blob Storage", "Elasticsearch"],
    },
    DomainTiers {
        domain: "communication",
        critical: &["Twilio", "Azure Communication Services"],
        high: &["Slack", "Amazon SNS"],
        medium: &["Redis", "RabbitMQ"],
    },
    DomainTiers {
        domain: "devops",
        critical: &["Docker", "Kubernetes", "Terraform"],
        high: &["GitHub Actions", "Jenkins", "Prometheus"],
        medium: &["Grafana", "Ansible", "Helm"],
    },
    DomainTiers {
        domain: "hr",
        critical: &[],
        high: &["Salesforce"],
        medium: &["Slack", "PostgreSQL"],
    },
];

/// Tier boost and tier name for `technology` in `domain`.
fn domain_tier(domain: &str, technology: &str) -> Option<(f32, &'static str)> {
    let tiers = DOMAIN_TIERS.iter().find(|t| t.domain == domain)?;
    let contains = |list: &[&str]| list.iter().any(|t| t.eq_ignore_ascii_case(technology));

    if contains(tiers.critical) {
        Some((CRITICAL_BOOST, "critical"))
    } else if contains(tiers.high) {
        Some((HIGH_BOOST, "high"))
    } else if contains(tiers.medium) {
        Some((MEDIUM_BOOST, "medium"))
    } else {
        None
    }
}

pub struct ContextPrioritizer {
    registry: Arc<AliasRegistry>,
    preferences: Arc<dyn PreferenceStore>,
    banned_mode: BannedMatchMode,
}

impl ContextPrioritizer {
    pub fn new(
        registry: Arc<AliasRegistry>,
        preferences: Arc<dyn PreferenceStore>,
        banned_mode: BannedMatchMode,
    ) -> Self {
        Self {
            registry,
            preferences,
            banned_mode,
        }
    }

    pub fn prioritize(
        &self,
        parsed: &ParsedRequirements,
        ctx: &TechContext,
    ) -> BTreeMap<String, ContextWeight> {
        let domain = ctx
            .domain_context
            .primary_domain
            .as_deref()
            .or(parsed.domain_context.primary_domain.as_deref())
            .unwrap_or(GENERAL_DOMAIN);

        let mut weights = BTreeMap::new();

        for (tech, confidence) in &ctx.explicit_technologies {
            let weight = self.weigh(tech, *confidence, SourceOrigin::ExplicitUserInput, domain, ctx);
            weights.insert(tech.clone(), weight);
        }

        for (tech, confidence) in &ctx.contextual_technologies {
            if weights.contains_key(tech) {
                continue;
            }
            let origin = ctx
                .contextual_sources
                .get(tech)
                .copied()
                .unwrap_or(SourceOrigin::PatternInference);
            let weight = self.weigh(tech, *confidence, origin, domain, ctx);
            weights.insert(tech.clone(), weight);
        }

        // Absolute filter, applied after every boost
        let before = weights.len();
        weights.retain(|tech, _| {
            !self
                .banned_mode
                .is_banned_by_any(tech, ctx.banned_tools.iter().chain(&parsed.constraints.banned_tools))
        });

        debug!(
            domain = %domain,
            weighted = weights.len(),
            banned_removed = before - weights.len(),
            "Technologies prioritized"
        );

        weights
    }

    fn weigh(
        &self,
        tech: &str,
        confidence: f32,
        origin: SourceOrigin,
        domain: &str,
        ctx: &TechContext,
    ) -> ContextWeight {
        let source_weight = origin.weight();
        let base_priority = clamp_unit(source_weight * confidence);
        let mut reasoning = vec![format!(
            "{} source (weight {:.2}) x confidence {:.2} = {:.2}",
            origin.label(),
            source_weight,
            confidence,
            base_priority
        )];

        let domain_boost = match domain_tier(domain, tech) {
            Some((boost, tier)) => {
                reasoning.push(format!("{} for {} domain (+{:.2})", tier, domain, boost));
                boost
            }
            None => 0.0,
        };

        let ecosystem_boost = match ctx.ecosystem_preference {
            Some(preferred) if self.registry.ecosystem_of(tech) == Some(preferred) => {
                reasoning.push(format!("matches preferred {} ecosystem (+{:.2})", preferred, ECOSYSTEM_BOOST));
                ECOSYSTEM_BOOST
            }
            _ => 0.0,
        };

        let learned = self.preferences.get(domain, tech);
        let user_preference_boost = learned * PREFERENCE_FACTOR;
        if user_preference_boost != 0.0 {
            reasoning.push(format!(
                "learned preference {:.2} in {} ({:+.2})",
                learned, domain, user_preference_boost
            ));
        }

        let final_weight =
            clamp_unit(base_priority + domain_boost + ecosystem_boost + user_preference_boost);

        ContextWeight {
            technology: tech.to_string(),
            base_priority,
            source_weights: BTreeMap::from([(origin.label().to_string(), source_weight)]),
            domain_boost,
            ecosystem_boost,
            user_preference_boost,
            final_weight,
            reasoning,
        }
    }
}

/// Technologies ordered by final weight, heaviest first; ties by name.
pub fn rank(weights: &BTreeMap<String, ContextWeight>) -> Vec<String> {
    let mut ranked: Vec<&ContextWeight> = weights.values().collect();
    ranked.sort_by(|a, b| {
        b.final_weight
            .total_cmp(&a.final_weight)
            .then_with(|| a.technology.cmp(&b.technology))
    });
    ranked.into_iter().map(|w| w.technology.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::preferences::InMemoryPreferenceStore;
    use crate::resolution::types::{DomainContext, Ecosystem};
    use std::collections::BTreeSet;

    fn prioritizer(store: Arc<InMemoryPreferenceStore>) -> ContextPrioritizer {
        ContextPrioritizer::new(
            Arc::new(AliasRegistry::with_defaults()),
            store,
            BannedMatchMode::Substring,
        )
    }

    fn context(explicit: &[(&str, f32)], contextual: &[(&str, f32, SourceOrigin)]) -> TechContext {
        TechContext {
            explicit_technologies: explicit.iter().map(|(t, c)| (t.to_string(), *c)).collect(),
            contextual_technologies: contextual.iter().map(|(t, c, _)| (t.to_string(), *c)).collect(),
            contextual_sources: contextual.iter().map(|(t, _, o)| (t.to_string(), *o)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_explicit_outweighs_contextual() {
        let p = prioritizer(Arc::new(InMemoryPreferenceStore::new()));
        let ctx = context(
            &[("MongoDB", 0.8)],
            &[("PostgreSQL", 0.8, SourceOrigin::BusinessRequirement)],
        );
        let weights = p.prioritize(&ParsedRequirements::default(), &ctx);

        assert!(weights["MongoDB"].final_weight >= weights["PostgreSQL"].final_weight);
        assert!((weights["PostgreSQL"].base_priority - 0.64).abs() < 1e-6);
    }

    #[test]
    fn test_boosts_are_recorded() {
        let p = prioritizer(Arc::new(InMemoryPreferenceStore::new()));
        let mut ctx = context(&[("Amazon Connect", 0.6), ("Redis", 0.5)], &[]);
        ctx.domain_context = DomainContext {
            primary_domain: Some("customer_service".to_string()),
            ..Default::default()
        };
        ctx.ecosystem_preference = Some(Ecosystem::Aws);

        let weights = p.prioritize(&ParsedRequirements::default(), &ctx);
        let connect = &weights["Amazon Connect"];
        assert_eq!(connect.domain_boost, CRITICAL_BOOST);
        assert_eq!(connect.ecosystem_boost, ECOSYSTEM_BOOST);
        assert!((connect.final_weight - 1.0).abs() < 1e-6);
        assert_eq!(connect.reasoning.len(), 3);

        let redis = &weights["Redis"];
        assert_eq!(redis.domain_boost, MEDIUM_BOOST);
        assert_eq!(redis.ecosystem_boost, 0.0);
        assert!((redis.final_weight - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_learned_preference_applies_in_both_directions() {
        let store = Arc::new(InMemoryPreferenceStore::new());
        for _ in 0..10 {
            store.update(&["Redis".to_string()], &["Memcached".to_string()], GENERAL_DOMAIN, &[]);
        }
        let p = prioritizer(store);
        let ctx = context(&[("Redis", 0.5), ("Memcached", 0.5)], &[]);
        let weights = p.prioritize(&ParsedRequirements::default(), &ctx);

        assert!((weights["Redis"].user_preference_boost - 0.1).abs() < 1e-6);
        assert!((weights["Memcached"].user_preference_boost + 0.1).abs() < 1e-6);
        assert!(weights["Redis"].final_weight > weights["Memcached"].final_weight);
    }

    #[test]
    fn test_banned_removed_regardless_of_weight() {
        let p = prioritizer(Arc::new(InMemoryPreferenceStore::new()));
        let mut ctx = context(
            &[("PostgreSQL", 1.0), ("Redis", 0.9)],
            &[("MySQL", 0.6, SourceOrigin::PatternInference)],
        );
        ctx.banned_tools = BTreeSet::from(["sql".to_string()]);

        let weights = p.prioritize(&ParsedRequirements::default(), &ctx);
        assert_eq!(weights.keys().collect::<Vec<_>>(), vec!["Redis"]);
    }

    #[test]
    fn test_token_mode_keeps_partial_words() {
        let p = ContextPrioritizer::new(
            Arc::new(AliasRegistry::with_defaults()),
            Arc::new(InMemoryPreferenceStore::new()),
            BannedMatchMode::Token,
        );
        let mut ctx = context(&[("PostgreSQL", 1.0), ("Amazon S3", 0.9)], &[]);
        ctx.banned_tools = BTreeSet::from(["sql".to_string(), "s3".to_string()]);

        let weights = p.prioritize(&ParsedRequirements::default(), &ctx);
        assert!(weights.contains_key("PostgreSQL"));
        assert!(!weights.contains_key("Amazon S3"));
    }

    #[test]
    fn test_weights_bounded_and_idempotent() {
        let p = prioritizer(Arc::new(InMemoryPreferenceStore::new()));
        let mut ctx = context(
            &[("Docker", 1.0), ("Kubernetes", 0.95)],
            &[("Terraform", 1.0, SourceOrigin::TechnicalSpecification)],
        );
        ctx.domain_context.primary_domain = Some("devops".to_string());

        let first = p.prioritize(&ParsedRequirements::default(), &ctx);
        let second = p.prioritize(&ParsedRequirements::default(), &ctx);
        assert_eq!(first, second);
        for w in first.values() {
            assert!((0.0..=1.0).contains(&w.final_weight));
        }
    }

    #[test]
    fn test_rank_orders_by_weight_then_name() {
        let p = prioritizer(Arc::new(InMemoryPreferenceStore::new()));
        let ctx = context(
            &[("Redis", 0.9), ("Kafka", 0.9)],
            &[("Istio", 0.7, SourceOrigin::PatternInference)],
        );
        let weights = p.prioritize(&ParsedRequirements::default(), &ctx);
        assert_eq!(rank(&weights), vec!["Kafka", "Redis", "Istio"]);
    }
}
