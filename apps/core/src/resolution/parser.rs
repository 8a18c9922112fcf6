//! Requirement Parser - orchestrates extraction over a requirement payload.
//!
//! Flattens the payload into one corpus, runs the extractor and the clue
//! identifier on it, extracts constraints, derives the domain context and
//! scores overall parse confidence.

use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tracing::debug;

use super::aliases::AliasRegistry;
use super::clues::ContextClueIdentifier;
use super::constraints::{flatten_corpus, ConstraintExtractor};
use super::extractor::TechnologyExtractor;
use super::types::{clamp_unit, ContextClues, DomainContext, ExplicitTech, ParsedRequirements};
use crate::config::EngineConfig;

static INDUSTRY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("healthcare", Regex::new(r"(?i)\b(healthcare|hospitals?|clinics?|patients?|pharma\w*)\b").expect("Invalid regex: healthcare industry")),
        ("financial_services", Regex::new(r"(?i)\b(bank(s|ing)?|fintech|insurance|lending|brokerage)\b").expect("Invalid regex: financial industry")),
        ("retail", Regex::new(r"(?i)\b(retail|e-?commerce|online\s+store|shoppers?)\b").expect("Invalid regex: retail industry")),
        ("telecommunications", Regex::new(r"(?i)\b(telecom\w*|carriers?|mobile\s+operators?)\b").expect("Invalid regex: telecom industry")),
        ("education", Regex::new(r"(?i)\b(education|students?|schools?|universit(y|ies)|e-?learning)\b").expect("Invalid regex: education industry")),
        ("manufacturing", Regex::new(r"(?i)\b(manufacturing|factory|factories|production\s+lines?)\b").expect("Invalid regex: manufacturing industry")),
        ("logistics", Regex::new(r"(?i)\b(logistics|shipping|fleet|warehouses?|supply\s+chain)\b").expect("Invalid regex: logistics industry")),
        ("government", Regex::new(r"(?i)\b(government|public\s+sector|municipal\w*|agency)\b").expect("Invalid regex: government industry")),
        ("media", Regex::new(r"(?i)\b(media|streaming\s+video|publishing|broadcast\w*)\b").expect("Invalid regex: media industry")),
    ]
});

static USE_CASE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("automation", Regex::new(r"(?i)\b(automat(e|es|ed|ion|ing))\b").expect("Invalid regex: automation use case")),
        ("real_time_processing", Regex::new(r"(?i)\b(real[- ]?time|live\s+updates?)\b").expect("Invalid regex: real-time use case")),
        ("analytics", Regex::new(r"(?i)\b(analytics|reporting|insights|dashboards?)\b").expect("Invalid regex: analytics use case")),
        ("integration", Regex::new(r"(?i)\b(integrat(e|es|ion|ing)|sync(hroni[sz]e)?)\b").expect("Invalid regex: integration use case")),
        ("migration", Regex::new(r"(?i)\b(migrat(e|es|ion|ing))\b").expect("Invalid regex: migration use case")),
        ("conversational", Regex::new(r"(?i)\b(chat\s?bots?|virtual\s+agents?|conversational)\b").expect("Invalid regex: conversational use case")),
        ("notification", Regex::new(r"(?i)\b(notif(y|ication|ications)|alerts?)\b").expect("Invalid regex: notification use case")),
        ("search", Regex::new(r"(?i)\bsearch\b").expect("Invalid regex: search use case")),
        ("recommendation", Regex::new(r"(?i)\brecommend(ation|ations|er)?s?\b").expect("Invalid regex: recommendation use case")),
        ("monitoring", Regex::new(r"(?i)\b(monitor(ing)?|observability)\b").expect("Invalid regex: monitoring use case")),
    ]
});

static COMPLEXITY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("high_availability", Regex::new(r"(?i)\b(high\s+availability|failover|redundan(t|cy)|99\.9+%?)").expect("Invalid regex: high availability")),
        ("scalability", Regex::new(r"(?i)\b(scal(e|able|ability|ing)|millions\s+of|high\s+traffic)\b").expect("Invalid regex: scalability")),
        ("multi_region", Regex::new(r"(?i)\b(multi[- ]region|global(ly)?|geo[- ]distributed)\b").expect("Invalid regex: multi-region")),
        ("security", Regex::new(r"(?i)\b(encrypt\w*|security|secure|compliance|gdpr|hipaa)\b").expect("Invalid regex: security")),
        ("low_latency", Regex::new(r"(?i)\b(low[- ]latency|real[- ]?time|sub-second)\b").expect("Invalid regex: low latency")),
        ("multi_tenant", Regex::new(r"(?i)\bmulti[- ]tenan(t|cy)\b").expect("Invalid regex: multi-tenant")),
        ("legacy_integration", Regex::new(r"(?i)\b(legacy|mainframe)\b").expect("Invalid regex: legacy integration")),
        ("microservices", Regex::new(r"(?i)\bmicro-?services?\b").expect("Invalid regex: microservices")),
    ]
});

/// Industry implied by a domain when the text names none.
fn industry_for_domain(domain: &str) -> Option<&'static str> {
    match domain {
        "healthcare" => Some("healthcare"),
        "finance" => Some("financial_services"),
        "ecommerce" => Some("retail"),
        "customer_service" | "communication" => Some("customer_experience"),
        _ => None,
    }
}

fn labels(patterns: &[(&'static str, Regex)], text: &str) -> Vec<String> {
    patterns
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(label, _)| label.to_string())
        .collect()
}

/// Turns a requirement payload into `ParsedRequirements`
pub struct RequirementParser {
    extractor: TechnologyExtractor,
    clue_identifier: ContextClueIdentifier,
    constraint_extractor: ConstraintExtractor,
    max_depth: usize,
}

impl RequirementParser {
    pub fn new(registry: Arc<AliasRegistry>, config: &EngineConfig) -> Self {
        Self {
            extractor: TechnologyExtractor::new(registry.clone(), config.context_window),
            clue_identifier: ContextClueIdentifier::new(),
            constraint_extractor: ConstraintExtractor::new(registry, config.max_payload_depth),
            max_depth: config.max_payload_depth,
        }
    }

    /// Parse a free-form payload. Never fails; empty input yields confidence 0.0.
    pub fn parse(&self, payload: &Value) -> ParsedRequirements {
        let start = Instant::now();

        // 1. Flatten text-bearing fields
        let corpus = flatten_corpus(payload, self.max_depth);

        // 2. Explicit technologies and context clues
        let explicit_technologies = self.extractor.extract_with_context(&corpus);
        let context_clues = self.clue_identifier.identify(&corpus);

        // 3. Constraints: structured first, then free text
        let constraints = self.constraint_extractor.extract(payload, &corpus);

        // 4. Domain context
        let domain_context = self.domain_context(&context_clues, &corpus);

        // 5. Confidence
        let constraint_presence = if constraints.is_empty() { 0.0 } else { 1.0 };
        let confidence_score = if corpus.trim().is_empty() {
            0.0
        } else {
            parse_confidence(&explicit_technologies, &context_clues, constraint_presence)
        };

        let extraction_metadata =
            extraction_metadata(&corpus, &explicit_technologies, &context_clues, constraint_presence);

        debug!(
            technologies = explicit_technologies.len(),
            confidence = confidence_score,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Requirements parsed"
        );

        ParsedRequirements {
            explicit_technologies,
            context_clues,
            constraints,
            domain_context,
            raw_text: corpus,
            confidence_score,
            extraction_metadata,
        }
    }

    /// Parse a bare requirement sentence.
    pub fn parse_text(&self, text: &str) -> ParsedRequirements {
        self.parse(&json!({ "description": text }))
    }

    fn domain_context(&self, clues: &ContextClues, text: &str) -> DomainContext {
        let primary_domain = clues.domains.first().cloned();
        let sub_domains = clues.domains.iter().skip(1).cloned().collect();

        let industry = INDUSTRY_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(label, _)| label.to_string())
            .or_else(|| {
                primary_domain
                    .as_deref()
                    .and_then(industry_for_domain)
                    .map(str::to_string)
            });

        DomainContext {
            primary_domain,
            sub_domains,
            industry,
            use_case_patterns: labels(&USE_CASE_PATTERNS, text),
            complexity_indicators: labels(&COMPLEXITY_PATTERNS, text),
        }
    }
}

/// With explicit technologies: `0.8·mean + 0.15·density + 0.05·constraints`;
/// without: `0.8·density + 0.2·constraints`.
pub fn parse_confidence(explicit: &[ExplicitTech], clues: &ContextClues, constraint_presence: f32) -> f32 {
    let density = clues.density();
    if explicit.is_empty() {
        return clamp_unit(0.8 * density + 0.2 * constraint_presence);
    }
    let mean = explicit.iter().map(|t| t.confidence).sum::<f32>() / explicit.len() as f32;
    clamp_unit(0.8 * mean + 0.15 * density + 0.05 * constraint_presence)
}

fn extraction_metadata(
    corpus: &str,
    explicit: &[ExplicitTech],
    clues: &ContextClues,
    constraint_presence: f32,
) -> BTreeMap<String, Value> {
    let mut methods: BTreeMap<&str, usize> = BTreeMap::new();
    for tech in explicit {
        *methods.entry(tech.extraction_method.label()).or_default() += 1;
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("text_length".to_string(), json!(corpus.chars().count()));
    metadata.insert("technology_count".to_string(), json!(explicit.len()));
    metadata.insert("methods".to_string(), json!(methods));
    metadata.insert("context_density".to_string(), json!(clues.density()));
    metadata.insert("has_constraints".to_string(), json!(constraint_presence > 0.0));
    metadata
}
