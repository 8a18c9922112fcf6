//! Context Builder - turns parsed requirements into a `TechContext`.
//!
//! Explicit technologies are normalised through the resolver. Contextual
//! technologies come from fixed lookup tables keyed by clue labels, and the
//! preferred ecosystem is picked by a scored vote that abstains under weak
//! signal.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::aliases::AliasRegistry;
use super::resolver::Resolver;
use super::types::{
    clamp_unit, BannedMatchMode, ContextClues, Ecosystem, ExtractionMethod, ParsedRequirements,
    SourceOrigin, TechContext,
};

type Suggestions = &'static [(&'static str, f32)];

/// Integration pattern -> technologies (pattern inference)
const INTEGRATION_TECH: &[(&str, Suggestions)] = &[
    ("rest_api", &[("FastAPI", 0.5), ("Express", 0.45)]),
    ("graphql", &[("GraphQL", 0.7)]),
    ("message_queue", &[("RabbitMQ", 0.6)]),
    ("event_driven", &[("Apache Kafka", 0.6)]),
    ("batch", &[("Apache Airflow", 0.5)]),
    ("streaming", &[("Apache Kafka", 0.7)]),
    ("service_mesh", &[("Istio", 0.7)]),
    ("rpc", &[("gRPC", 0.7)]),
];

/// Language -> runtime/framework (technical specification)
const LANGUAGE_TECH: &[(&str, Suggestions)] = &[
    ("python", &[("Python", 0.8), ("FastAPI", 0.5)]),
    ("javascript", &[("Node.js", 0.6), ("Express", 0.4)]),
    ("typescript", &[("TypeScript", 0.8), ("Node.js", 0.6)]),
    ("java", &[("Java", 0.8), ("Spring Boot", 0.6)]),
    ("go", &[("Go", 0.8)]),
    ("rust", &[("Rust", 0.8)]),
    ("csharp", &[(".NET", 0.7)]),
    ("ruby", &[("Ruby on Rails", 0.6)]),
    ("php", &[("PHP", 0.8)]),
];

/// Deployment style -> tooling (technical specification)
const DEPLOYMENT_TECH: &[(&str, Suggestions)] = &[
    ("containerized", &[("Docker", 0.7), ("Kubernetes", 0.5)]),
    ("on_premise", &[("Ansible", 0.4), ("Kubernetes", 0.4)]),
    ("hybrid", &[("Terraform", 0.5)]),
    ("multi_cloud", &[("Terraform", 0.6)]),
];

/// Data shape -> store (pattern inference)
const DATA_TECH: &[(&str, Suggestions)] = &[
    ("relational", &[("PostgreSQL", 0.6)]),
    ("document", &[("MongoDB", 0.6)]),
    ("time_series", &[("InfluxDB", 0.5)]),
    ("key_value", &[("Redis", 0.6)]),
    ("graph", &[("Neo4j", 0.6)]),
    ("search", &[("Elasticsearch", 0.6)]),
];

/// Domains and the clouds they lean towards
const DOMAIN_ECOSYSTEMS: &[(&str, &[Ecosystem])] = &[
    ("customer_service", &[Ecosystem::Aws]),
    ("ml_ai", &[Ecosystem::Aws, Ecosystem::Gcp]),
    ("data_processing", &[Ecosystem::Gcp]),
    ("ecommerce", &[Ecosystem::Aws]),
    ("finance", &[Ecosystem::Azure, Ecosystem::Aws]),
    ("healthcare", &[Ecosystem::Azure, Ecosystem::Gcp]),
    ("document_processing", &[Ecosystem::Azure, Ecosystem::Aws]),
    ("communication", &[Ecosystem::Azure]),
    ("devops", &[Ecosystem::Azure]),
    ("hr", &[Ecosystem::Azure]),
];

const PROVIDER_VOTE: f32 = 2.0;
const DOMAIN_VOTE: f32 = 0.5;
const SERVERLESS_VOTE: (Ecosystem, f32) = (Ecosystem::Aws, 1.5);
const CONTAINER_VOTE: (Ecosystem, f32) = (Ecosystem::Gcp, 1.2);
const MIN_ECOSYSTEM_SCORE: f32 = 1.0;

/// Managed services a cloud offers for a generic need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagedService {
    Functions,
    ObjectStorage,
    Analytics,
    Kubernetes,
}

fn managed_service(ecosystem: Ecosystem, service: ManagedService) -> Option<&'static str> {
    use ManagedService::*;
    match (ecosystem, service) {
        (Ecosystem::Aws, Functions) => Some("AWS Lambda"),
        (Ecosystem::Aws, ObjectStorage) => Some("Amazon S3"),
        (Ecosystem::Aws, Analytics) => Some("AWS Glue"),
        (Ecosystem::Aws, Kubernetes) => Some("Amazon EKS"),
        (Ecosystem::Azure, Functions) => Some("Azure Functions"),
        (Ecosystem::Azure, ObjectStorage) => Some("Azure Blob Storage"),
        (Ecosystem::Azure, Kubernetes) => Some("Azure Kubernetes Service"),
        (Ecosystem::Gcp, Functions) => Some("Google Cloud Functions"),
        (Ecosystem::Gcp, Analytics) => Some("BigQuery"),
        (Ecosystem::Gcp, Kubernetes) => Some("Google Kubernetes Engine"),
        _ => None,
    }
}

/// Context window with the mention itself blanked out, so a name cannot
/// vouch for its own ecosystem.
fn without_mention(window: &str, mention: &str) -> String {
    if mention.is_empty() {
        return window.to_string();
    }
    window.replace(mention, " ")
}

fn lookup(table: &'static [(&'static str, Suggestions)], label: &str) -> Suggestions {
    table
        .iter()
        .find(|(key, _)| *key == label)
        .map(|(_, techs)| *techs)
        .unwrap_or(&[])
}

/// Scored ecosystem vote. Returns the strictly highest provider when its
/// score exceeds the minimum, otherwise abstains.
pub fn infer_ecosystem(clues: &ContextClues) -> Option<Ecosystem> {
    let mut scores: BTreeMap<Ecosystem, f32> = BTreeMap::new();

    for provider in &clues.cloud_providers {
        *scores.entry(*provider).or_default() += PROVIDER_VOTE;
    }

    for domain in &clues.domains {
        if let Some((_, preferred)) = DOMAIN_ECOSYSTEMS.iter().find(|(d, _)| d == domain) {
            for eco in preferred.iter() {
                *scores.entry(*eco).or_default() += DOMAIN_VOTE;
            }
        }
    }

    for style in &clues.deployment_preferences {
        let vote = match style.as_str() {
            "serverless" => Some(SERVERLESS_VOTE),
            "containerized" => Some(CONTAINER_VOTE),
            _ => None,
        };
        if let Some((eco, weight)) = vote {
            *scores.entry(eco).or_default() += weight;
        }
    }

    trace!(?scores, "ecosystem vote");

    let mut ranked: Vec<(Ecosystem, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    match ranked.as_slice() {
        [] => None,
        [(eco, score)] => (*score > MIN_ECOSYSTEM_SCORE).then_some(*eco),
        [(eco, top), (_, second), ..] => {
            (*top > MIN_ECOSYSTEM_SCORE && top > second).then_some(*eco)
        }
    }
}

/// Contextual candidates keyed by name, remembering the strongest source.
#[derive(Default)]
struct Suggested {
    confidence: BTreeMap<String, f32>,
    origin: BTreeMap<String, SourceOrigin>,
}

impl Suggested {
    fn offer(&mut self, tech: &str, confidence: f32, origin: SourceOrigin) {
        let current = self.confidence.get(tech).copied().unwrap_or(-1.0);
        if confidence > current {
            self.confidence.insert(tech.to_string(), clamp_unit(confidence));
            self.origin.insert(tech.to_string(), origin);
        }
    }
}

pub struct ContextBuilder {
    registry: Arc<AliasRegistry>,
    resolver: Arc<dyn Resolver>,
    banned_mode: BannedMatchMode,
}

impl ContextBuilder {
    pub fn new(
        registry: Arc<AliasRegistry>,
        resolver: Arc<dyn Resolver>,
        banned_mode: BannedMatchMode,
    ) -> Self {
        Self {
            registry,
            resolver,
            banned_mode,
        }
    }

    pub fn build(&self, parsed: &ParsedRequirements) -> TechContext {
        let clues = &parsed.context_clues;
        let banned = &parsed.constraints.banned_tools;

        // 1. Normalise explicit technologies
        let explicit_technologies = self.explicit(parsed);

        // 2. Ecosystem vote
        let ecosystem_preference = infer_ecosystem(clues);

        // 3. Contextual technologies from clue tables
        let mut suggested = Suggested::default();
        for label in &clues.integration_patterns {
            for (tech, conf) in lookup(INTEGRATION_TECH, label) {
                suggested.offer(tech, *conf, SourceOrigin::PatternInference);
            }
        }
        for label in &clues.data_patterns {
            for (tech, conf) in lookup(DATA_TECH, label) {
                suggested.offer(tech, *conf, SourceOrigin::PatternInference);
            }
        }
        for label in &clues.languages {
            for (tech, conf) in lookup(LANGUAGE_TECH, label) {
                suggested.offer(tech, *conf, SourceOrigin::TechnicalSpecification);
            }
        }
        for label in &clues.deployment_preferences {
            for (tech, conf) in lookup(DEPLOYMENT_TECH, label) {
                suggested.offer(tech, *conf, SourceOrigin::TechnicalSpecification);
            }
        }
        if let Some(eco) = ecosystem_preference {
            self.ecosystem_services(eco, clues, &mut suggested);
        }

        // 4. Required integrations are business requirements
        let mut integration_requirements = Vec::new();
        for integration in &parsed.constraints.required_integrations {
            let name = self
                .resolver
                .resolve(integration, &parsed.raw_text)
                .map(|r| r.canonical_name)
                .unwrap_or_else(|| integration.clone());
            suggested.offer(&name, 0.8, SourceOrigin::BusinessRequirement);
            if !integration_requirements.contains(&name) {
                integration_requirements.push(name);
            }
        }

        // 5. Drop explicit and banned names from the contextual side
        let Suggested { confidence, origin } = suggested;
        let mut contextual_technologies = BTreeMap::new();
        let mut contextual_sources = BTreeMap::new();
        for (tech, conf) in confidence {
            if explicit_technologies.contains_key(&tech)
                || self.banned_mode.is_banned_by_any(&tech, banned)
            {
                continue;
            }
            if let Some(o) = origin.get(&tech) {
                contextual_sources.insert(tech.clone(), *o);
            }
            contextual_technologies.insert(tech, conf);
        }

        // 6. Baseline weights
        let mut priority_weights = BTreeMap::new();
        for (tech, conf) in &explicit_technologies {
            priority_weights.insert(tech.clone(), clamp_unit(conf * SourceOrigin::ExplicitUserInput.weight()));
        }
        for (tech, conf) in &contextual_technologies {
            let origin = contextual_sources
                .get(tech)
                .copied()
                .unwrap_or(SourceOrigin::PatternInference);
            priority_weights.insert(tech.clone(), clamp_unit(conf * origin.weight()));
        }
        priority_weights.retain(|tech, _| !self.banned_mode.is_banned_by_any(tech, banned));

        debug!(
            explicit = explicit_technologies.len(),
            contextual = contextual_technologies.len(),
            ecosystem = ?ecosystem_preference,
            "Technology context built"
        );

        TechContext {
            explicit_technologies,
            contextual_technologies,
            contextual_sources,
            domain_context: parsed.domain_context.clone(),
            ecosystem_preference,
            integration_requirements,
            banned_tools: banned.clone(),
            priority_weights,
        }
    }

    /// Canonical name -> confidence, keeping the maximum per name.
    fn explicit(&self, parsed: &ParsedRequirements) -> BTreeMap<String, f32> {
        let mut explicit: BTreeMap<String, f32> = BTreeMap::new();

        for tech in &parsed.explicit_technologies {
            let vendor_named = tech.extraction_method == ExtractionMethod::PatternMatch
                && Ecosystem::infer_from_name(&tech.canonical_name).is_some();

            let (name, confidence) = if self.registry.is_canonical(&tech.canonical_name) {
                (tech.canonical_name.clone(), tech.confidence)
            } else if vendor_named {
                // "Amazon Polly" already names its vendor; only an exact alias may rename it
                match self.registry.exact(&tech.canonical_name) {
                    Some(resolution) => (resolution.canonical_name, tech.confidence),
                    None => (tech.canonical_name.clone(), tech.confidence),
                }
            } else {
                let context = without_mention(&tech.context_window, &tech.source_text);
                match self.resolver.resolve(&tech.canonical_name, &context) {
                    Some(resolution) => (
                        resolution.canonical_name,
                        tech.confidence * resolution.confidence,
                    ),
                    // Unknown names stay as written for the catalog step
                    None => (tech.canonical_name.clone(), tech.confidence),
                }
            };

            let confidence = clamp_unit(confidence);
            let slot = explicit.entry(name).or_insert(confidence);
            if confidence > *slot {
                *slot = confidence;
            }
        }

        explicit
    }

    /// Managed services of the preferred cloud for the clues seen.
    fn ecosystem_services(&self, eco: Ecosystem, clues: &ContextClues, suggested: &mut Suggested) {
        let has = |labels: &[String], label: &str| labels.iter().any(|l| l == label);

        if has(&clues.deployment_preferences, "serverless") {
            if let Some(tech) = managed_service(eco, ManagedService::Functions) {
                suggested.offer(tech, 0.6, SourceOrigin::TechnicalSpecification);
            }
        }
        if has(&clues.deployment_preferences, "containerized") {
            if let Some(tech) = managed_service(eco, ManagedService::Kubernetes) {
                suggested.offer(tech, 0.5, SourceOrigin::TechnicalSpecification);
            }
        }
        if has(&clues.data_patterns, "unstructured") {
            if let Some(tech) = managed_service(eco, ManagedService::ObjectStorage) {
                suggested.offer(tech, 0.6, SourceOrigin::PatternInference);
            }
        }
        if has(&clues.data_patterns, "analytics") {
            if let Some(tech) = managed_service(eco, ManagedService::Analytics) {
                suggested.offer(tech, 0.5, SourceOrigin::PatternInference);
            }
        }
        if has(&clues.technology_categories, "storage") {
            if let Some(tech) = managed_service(eco, ManagedService::ObjectStorage) {
                suggested.offer(tech, 0.3, SourceOrigin::SystemDefault);
            }
        }
    }
}
