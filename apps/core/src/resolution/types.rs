//! Typed records shared by every stage of the resolution pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Clamp a score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A cloud/vendor technology family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ecosystem {
    Aws,
    Azure,
    Gcp,
    OpenSource,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Ecosystem {
    /// Cloud providers that take part in ecosystem voting.
    pub const CLOUDS: [Ecosystem; 3] = [Ecosystem::Aws, Ecosystem::Azure, Ecosystem::Gcp];

    pub fn label(&self) -> &'static str {
        match self {
            Ecosystem::Aws => "aws",
            Ecosystem::Azure => "azure",
            Ecosystem::Gcp => "gcp",
            Ecosystem::OpenSource => "open_source",
        }
    }

    /// Lowercase keywords that signal this ecosystem in free text or names.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Ecosystem::Aws => &["aws", "amazon"],
            Ecosystem::Azure => &["azure", "microsoft"],
            Ecosystem::Gcp => &["gcp", "google", "bigquery", "firebase"],
            Ecosystem::OpenSource => &[],
        }
    }

    /// Guess the ecosystem from a technology name ("AWS Lambda", "Azure Functions").
    pub fn infer_from_name(name: &str) -> Option<Ecosystem> {
        let lower = name.to_ascii_lowercase();
        Self::CLOUDS.into_iter().find(|eco| {
            eco.keywords()
                .iter()
                .any(|kw| lower.split(|c: char| !c.is_ascii_alphanumeric()).any(|t| t == *kw))
        })
    }
}

/// Broad technology category carried by alias entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechCategory {
    Language,
    Framework,
    Database,
    Cache,
    Messaging,
    Container,
    Compute,
    Storage,
    AiService,
    Communication,
    Integration,
    Observability,
    Workflow,
    Infrastructure,
}

/// How an `ExplicitTech` candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// The canonical name itself appeared in the text.
    ExplicitMention,
    /// An alias or abbreviation from the registry appeared in the text.
    AliasMatch,
    /// Capitalization/punctuation heuristics (CamelCase, dotted, hyphenated).
    EntityHeuristic,
    /// Cloud naming conventions and generic suffix patterns.
    PatternMatch,
    /// Inferred from a higher-level integration phrase.
    IntegrationInference,
}

impl ExtractionMethod {
    pub fn base_confidence(&self) -> f32 {
        match self {
            ExtractionMethod::ExplicitMention => 1.0,
            ExtractionMethod::AliasMatch => 0.9,
            ExtractionMethod::EntityHeuristic => 0.8,
            ExtractionMethod::PatternMatch => 0.7,
            ExtractionMethod::IntegrationInference => 0.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMethod::ExplicitMention => "explicit_mention",
            ExtractionMethod::AliasMatch => "alias_match",
            ExtractionMethod::EntityHeuristic => "entity_heuristic",
            ExtractionMethod::PatternMatch => "pattern_match",
            ExtractionMethod::IntegrationInference => "integration_inference",
        }
    }
}

/// A technology candidate extracted from requirement text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplicitTech {
    /// Surface form as it appeared (or was inferred)
    pub name: String,
    /// Canonical name after registry resolution
    pub canonical_name: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    pub extraction_method: ExtractionMethod,
    /// Matched text, or the triggering phrase for inferred candidates
    pub source_text: String,
    /// Byte offset of the match in the corpus
    pub position: usize,
    /// Every surface form merged into this record
    pub aliases: Vec<String>,
    /// Text surrounding the match
    pub context_window: String,
}

/// Context clues classified from the corpus. Each axis is set-like.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextClues {
    pub cloud_providers: Vec<Ecosystem>,
    pub domains: Vec<String>,
    pub integration_patterns: Vec<String>,
    pub languages: Vec<String>,
    pub deployment_preferences: Vec<String>,
    pub data_patterns: Vec<String>,
    pub technology_categories: Vec<String>,
}

impl ContextClues {
    pub fn is_empty(&self) -> bool {
        self.cloud_providers.is_empty()
            && self.domains.is_empty()
            && self.integration_patterns.is_empty()
            && self.languages.is_empty()
            && self.deployment_preferences.is_empty()
            && self.data_patterns.is_empty()
            && self.technology_categories.is_empty()
    }

    /// Saturating density of clues: providers ×0.3, domains ×0.2,
    /// integrations ×0.1, languages ×0.1, capped at 1.0.
    pub fn density(&self) -> f32 {
        let raw = self.cloud_providers.len() as f32 * 0.3
            + self.domains.len() as f32 * 0.2
            + self.integration_patterns.len() as f32 * 0.1
            + self.languages.len() as f32 * 0.1;
        raw.min(1.0)
    }
}

/// Constraints stated by the requester, structured or inferred from text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementConstraints {
    pub banned_tools: BTreeSet<String>,
    pub required_integrations: Vec<String>,
    pub compliance_requirements: Vec<String>,
    pub data_sensitivity: Option<String>,
    pub budget_constraints: Option<String>,
    pub deployment_preference: Option<String>,
    pub performance_requirements: BTreeMap<String, String>,
}

impl RequirementConstraints {
    pub fn is_empty(&self) -> bool {
        self.banned_tools.is_empty()
            && self.required_integrations.is_empty()
            && self.compliance_requirements.is_empty()
            && self.data_sensitivity.is_none()
            && self.budget_constraints.is_none()
            && self.deployment_preference.is_none()
            && self.performance_requirements.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainContext {
    pub primary_domain: Option<String>,
    pub sub_domains: Vec<String>,
    pub industry: Option<String>,
    pub use_case_patterns: Vec<String>,
    pub complexity_indicators: Vec<String>,
}

/// Output of the requirement parser; the sole input of the context builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedRequirements {
    pub explicit_technologies: Vec<ExplicitTech>,
    pub context_clues: ContextClues,
    pub constraints: RequirementConstraints,
    pub domain_context: DomainContext,
    pub raw_text: String,
    /// Overall parse confidence (0.0 - 1.0)
    pub confidence_score: f32,
    pub extraction_metadata: BTreeMap<String, serde_json::Value>,
}

/// Where a technology candidate came from, ranked by trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    ExplicitUserInput,
    BusinessRequirement,
    TechnicalSpecification,
    PatternInference,
    SystemDefault,
}

impl SourceOrigin {
    pub fn weight(&self) -> f32 {
        match self {
            SourceOrigin::ExplicitUserInput => 1.0,
            SourceOrigin::BusinessRequirement => 0.8,
            SourceOrigin::TechnicalSpecification => 0.7,
            SourceOrigin::PatternInference => 0.5,
            SourceOrigin::SystemDefault => 0.3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceOrigin::ExplicitUserInput => "explicit_user_input",
            SourceOrigin::BusinessRequirement => "business_requirement",
            SourceOrigin::TechnicalSpecification => "technical_specification",
            SourceOrigin::PatternInference => "pattern_inference",
            SourceOrigin::SystemDefault => "system_default",
        }
    }
}

/// Resolved technology context for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechContext {
    pub explicit_technologies: BTreeMap<String, f32>,
    pub contextual_technologies: BTreeMap<String, f32>,
    /// Origin of every contextual technology
    pub contextual_sources: BTreeMap<String, SourceOrigin>,
    pub domain_context: DomainContext,
    pub ecosystem_preference: Option<Ecosystem>,
    pub integration_requirements: Vec<String>,
    pub banned_tools: BTreeSet<String>,
    /// Baseline weights before domain/ecosystem/preference boosts
    pub priority_weights: BTreeMap<String, f32>,
}

/// Explainable weight computation for one technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextWeight {
    pub technology: String,
    pub base_priority: f32,
    pub source_weights: BTreeMap<String, f32>,
    pub domain_boost: f32,
    pub ecosystem_boost: f32,
    pub user_preference_boost: f32,
    /// Final weight (0.0 - 1.0)
    pub final_weight: f32,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityType {
    TechnologyConflict,
    EcosystemMismatch,
    IncompleteSpecification,
    ContradictoryRequirements,
    UnclearDomain,
}

impl AmbiguityType {
    pub fn label(&self) -> &'static str {
        match self {
            AmbiguityType::TechnologyConflict => "technology_conflict",
            AmbiguityType::EcosystemMismatch => "ecosystem_mismatch",
            AmbiguityType::IncompleteSpecification => "incomplete_specification",
            AmbiguityType::ContradictoryRequirements => "contradictory_requirements",
            AmbiguityType::UnclearDomain => "unclear_domain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

impl ImpactLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ImpactLevel::High => "high",
            ImpactLevel::Medium => "medium",
            ImpactLevel::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityDetection {
    pub ambiguity_type: AmbiguityType,
    pub description: String,
    pub conflicting_elements: Vec<String>,
    pub suggested_clarifications: Vec<String>,
    /// Detection confidence (0.0 - 1.0)
    pub confidence: f32,
    pub impact_level: ImpactLevel,
}

/// Annotation produced by conflict resolution. Candidates are never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ConflictDecision {
    Selected { score: f32 },
    Deprioritized { in_favor_of: String, score: f32 },
}

impl fmt::Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictDecision::Selected { .. } => write!(f, "selected"),
            ConflictDecision::Deprioritized { in_favor_of, .. } => {
                write!(f, "deprioritized in favor of {}", in_favor_of)
            }
        }
    }
}

/// Learned acceptance history of one technology within one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub technology: String,
    pub domain: String,
    pub selection_count: u32,
    pub rejection_count: u32,
    /// Learned signal (-1.0 - 1.0)
    pub preference_score: f32,
    pub last_updated: DateTime<Utc>,
    pub context_patterns: Vec<String>,
}

/// How banned tool names are compared with candidate technologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannedMatchMode {
    /// Case-insensitive containment in either direction.
    Substring,
    /// Case-insensitive match on whole word tokens only.
    Token,
}

impl FromStr for BannedMatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "substring" => Ok(BannedMatchMode::Substring),
            "token" => Ok(BannedMatchMode::Token),
            other => Err(format!("unknown banned match mode '{}' (substring|token)", other)),
        }
    }
}

impl BannedMatchMode {
    /// True when `technology` must be removed because of the `banned` term.
    pub fn is_banned(&self, technology: &str, banned: &str) -> bool {
        let tech = technology.trim().to_lowercase();
        let ban = banned.trim().to_lowercase();
        if tech.is_empty() || ban.is_empty() {
            return false;
        }

        match self {
            BannedMatchMode::Substring => tech.contains(&ban) || ban.contains(&tech),
            BannedMatchMode::Token => {
                let tech_tokens = tokens(&tech);
                let ban_tokens = tokens(&ban);
                contains_run(&tech_tokens, &ban_tokens) || contains_run(&ban_tokens, &tech_tokens)
            }
        }
    }

    pub fn is_banned_by_any<'a>(
        &self,
        technology: &str,
        banned: impl IntoIterator<Item = &'a String>,
    ) -> bool {
        banned.into_iter().any(|b| self.is_banned(technology, b))
    }
}

fn tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| !c.is_alphanumeric() && c != '#' && c != '+')
        .filter(|t| !t.is_empty())
        .collect()
}

fn contains_run(haystack: &[&str], needle: &[&str]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}
