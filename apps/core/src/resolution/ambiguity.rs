//! Ambiguity detection and conflict resolution.
//!
//! Three independent passes flag ambiguity: textual regex families over the
//! raw corpus, mutually exclusive technology groups over the explicit list,
//! and a cross-ecosystem check over the explicit list. Conflict resolution
//! only annotates decisions; it never removes candidates.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::aliases::AliasRegistry;
use super::types::{
    AmbiguityDetection, AmbiguityType, ConflictDecision, Ecosystem, ImpactLevel,
    ParsedRequirements, TechContext,
};

const EXPLICIT_FACTOR: f32 = 0.5;
const CONTEXTUAL_FACTOR: f32 = 0.3;
const ALIGNMENT_FACTOR: f32 = 0.2;

/// A textual ambiguity family with fixed confidence and impact.
struct AmbiguityFamily {
    kind: AmbiguityType,
    confidence: f32,
    impact: ImpactLevel,
    description: &'static str,
    clarifications: &'static [&'static str],
    patterns: Vec<Regex>,
}

fn family(
    kind: AmbiguityType,
    confidence: f32,
    impact: ImpactLevel,
    description: &'static str,
    clarifications: &'static [&'static str],
    patterns: &[&str],
) -> AmbiguityFamily {
    AmbiguityFamily {
        kind,
        confidence,
        impact,
        description,
        clarifications,
        patterns: patterns
            .iter()
            .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("Invalid regex: {} ({})", kind.label(), e)))
            .collect(),
    }
}

static FAMILIES: LazyLock<Vec<AmbiguityFamily>> = LazyLock::new(|| {
    vec![
        family(
            AmbiguityType::TechnologyConflict,
            0.7,
            ImpactLevel::Medium,
            "Requirements leave a choice between alternative technologies open",
            &[
                "Which of the mentioned alternatives should be used?",
                "Is there an existing standard the choice must follow?",
            ],
            &[
                r"(?i)\beither\s+[\w.#+-]+(?:\s+[\w.#+-]+)?\s+or\s+[\w.#+-]+",
                r"(?i)\b(vs\.?|versus)\s",
                r"(?i)\b(not\s+sure|undecided|haven't\s+decided|can't\s+decide)\b",
                r"(?i)\b(choose|pick|decide)\s+between\b",
            ],
        ),
        family(
            AmbiguityType::EcosystemMismatch,
            0.8,
            ImpactLevel::High,
            "More than one cloud provider is referenced",
            &[
                "Which cloud provider is the primary deployment target?",
                "Is a multi-cloud architecture intended?",
            ],
            &[
                r"(?is)\b(aws|amazon)\b.{0,80}\b(azure|gcp|google\s+cloud)\b",
                r"(?is)\bazure\b.{0,80}\b(aws|amazon|gcp|google\s+cloud)\b",
                r"(?is)\b(gcp|google\s+cloud)\b.{0,80}\b(aws|amazon|azure)\b",
            ],
        ),
        family(
            AmbiguityType::IncompleteSpecification,
            0.6,
            ImpactLevel::Medium,
            "Some requirements are stated vaguely",
            &[
                "Can the vague parts be replaced with concrete technologies or limits?",
                "Are there expected volumes, latencies or budgets?",
            ],
            &[
                r"(?i)\b(some\s+(kind|sort)\s+of|something\s+like|tbd|to\s+be\s+determined|and\s+so\s+on|somehow)\b",
                r"(?i)\b(some|a)\s+(database|cloud|queue|framework)\b",
                r"(?i)\betc\b",
            ],
        ),
        family(
            AmbiguityType::ContradictoryRequirements,
            0.75,
            ImpactLevel::High,
            "Requirements pull in opposite directions",
            &[
                "Which of the conflicting requirements takes precedence?",
                "Can the requirements apply to different parts of the system?",
            ],
            &[
                r"(?is)\b(real[- ]?time|low[- ]latency)\b.{0,120}\b(batch|nightly|once\s+a\s+day)\b",
                r"(?is)\bon[- ]prem\w*\b.{0,120}\b(serverless|fully\s+managed|saas)\b",
                r"(?is)\b(low[- ]cost|cheap|minimal\s+budget|tight\s+budget)\b.{0,120}\b(enterprise[- ]grade|premium|multi[- ]region|high\s+availability)\b",
                r"(?is)\bno\s+vendor\s+lock-?in\b.{0,120}\b(proprietary|aws|azure|gcp)\b",
            ],
        ),
        family(
            AmbiguityType::UnclearDomain,
            0.5,
            ImpactLevel::Low,
            "The business domain is not clear",
            &[
                "What business problem does the system solve?",
                "Who are the primary users?",
            ],
            &[r"(?i)\b(general[- ]purpose|various\s+things|any\s+kind\s+of|multi-?purpose|all\s+sorts\s+of)\b"],
        ),
    ]
});

/// Technologies that normally fill the same slot.
const EXCLUSIVE_GROUPS: &[(&str, &[&str])] = &[
    ("primary database", &["PostgreSQL", "MySQL", "MongoDB"]),
    ("frontend framework", &["React", "Vue.js", "Angular"]),
    ("python web framework", &["Django", "Flask", "FastAPI"]),
    ("serverless compute", &["AWS Lambda", "Azure Functions", "Google Cloud Functions"]),
    ("managed kubernetes", &["Amazon EKS", "Azure Kubernetes Service", "Google Kubernetes Engine"]),
    ("object storage", &["Amazon S3", "Azure Blob Storage"]),
];

/// The sentence of `text` that contains byte offset `at`.
fn sentence_around(text: &str, at: usize) -> &str {
    let is_break = |c: char| matches!(c, '.' | '!' | '?' | '\n');
    let start = text[..at].rfind(is_break).map(|i| i + 1).unwrap_or(0);
    let end = text[at..].find(is_break).map(|i| at + i).unwrap_or(text.len());
    &text[start..end]
}

pub struct AmbiguityDetector {
    registry: Arc<AliasRegistry>,
}

impl AmbiguityDetector {
    pub fn new(registry: Arc<AliasRegistry>) -> Self {
        Self { registry }
    }

    pub fn detect(&self, parsed: &ParsedRequirements) -> Vec<AmbiguityDetection> {
        let mut found = self.textual(parsed);
        found.extend(self.exclusive_groups(parsed));
        found.extend(self.cross_ecosystem(parsed));

        debug!(count = found.len(), "Ambiguities detected");
        found
    }

    /// Regex families over the raw corpus, one detection per family.
    fn textual(&self, parsed: &ParsedRequirements) -> Vec<AmbiguityDetection> {
        let text = &parsed.raw_text;
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        for family in FAMILIES.iter() {
            let Some(m) = family.patterns.iter().find_map(|re| re.find(text)) else {
                continue;
            };

            let conflicting_elements = match family.kind {
                AmbiguityType::TechnologyConflict => {
                    let sentence = sentence_around(text, m.start());
                    let sentence_lower = sentence.to_lowercase();
                    let mut names: Vec<String> = Vec::new();
                    for tech in &parsed.explicit_technologies {
                        let mentioned = std::iter::once(&tech.name)
                            .chain(&tech.aliases)
                            .any(|s| sentence_lower.contains(&s.to_lowercase()));
                        if mentioned && !names.contains(&tech.canonical_name) {
                            names.push(tech.canonical_name.clone());
                        }
                    }
                    names
                }
                _ => vec![m.as_str().trim().to_string()],
            };

            out.push(AmbiguityDetection {
                ambiguity_type: family.kind,
                description: family.description.to_string(),
                conflicting_elements,
                suggested_clarifications: family.clarifications.iter().map(|s| s.to_string()).collect(),
                confidence: family.confidence,
                impact_level: family.impact,
            });
        }
        out
    }

    /// Any exclusive group with more than one explicit member.
    fn exclusive_groups(&self, parsed: &ParsedRequirements) -> Vec<AmbiguityDetection> {
        let explicit: BTreeSet<&str> = parsed
            .explicit_technologies
            .iter()
            .map(|t| t.canonical_name.as_str())
            .collect();

        EXCLUSIVE_GROUPS
            .iter()
            .filter_map(|(label, members)| {
                let present: Vec<String> = members
                    .iter()
                    .filter(|m| explicit.contains(*m))
                    .map(|m| m.to_string())
                    .collect();
                (present.len() > 1).then(|| AmbiguityDetection {
                    ambiguity_type: AmbiguityType::TechnologyConflict,
                    description: format!("Several {} choices mentioned: {}", label, present.join(", ")),
                    suggested_clarifications: vec![format!("Which single {} should be used?", label)],
                    conflicting_elements: present,
                    confidence: 0.85,
                    impact_level: ImpactLevel::Medium,
                })
            })
            .collect()
    }

    /// Explicit technologies spanning more than one cloud ecosystem.
    fn cross_ecosystem(&self, parsed: &ParsedRequirements) -> Option<AmbiguityDetection> {
        let mut by_ecosystem: BTreeMap<Ecosystem, Vec<String>> = BTreeMap::new();
        for tech in &parsed.explicit_technologies {
            let Some(eco) = self
                .registry
                .ecosystem_of(&tech.canonical_name)
                .filter(|e| Ecosystem::CLOUDS.contains(e))
            else {
                continue;
            };
            let names = by_ecosystem.entry(eco).or_default();
            if !names.contains(&tech.canonical_name) {
                names.push(tech.canonical_name.clone());
            }
        }

        if by_ecosystem.len() < 2 {
            return None;
        }

        let labels: Vec<&str> = by_ecosystem.keys().map(|e| e.label()).collect();
        Some(AmbiguityDetection {
            ambiguity_type: AmbiguityType::EcosystemMismatch,
            description: format!("Explicit technologies span several clouds: {}", labels.join(", ")),
            conflicting_elements: by_ecosystem.into_values().flatten().collect(),
            suggested_clarifications: vec![
                "Should the solution standardise on one cloud provider?".to_string(),
                "Are the cross-cloud services meant to interoperate?".to_string(),
            ],
            confidence: 0.9,
            impact_level: ImpactLevel::High,
        })
    }

    /// Picks one candidate per technology conflict and annotates the rest.
    /// The first decision recorded for a technology wins.
    pub fn resolve(
        &self,
        ambiguities: &[AmbiguityDetection],
        ctx: &TechContext,
    ) -> BTreeMap<String, ConflictDecision> {
        let mut decisions = BTreeMap::new();

        for ambiguity in ambiguities
            .iter()
            .filter(|a| a.ambiguity_type == AmbiguityType::TechnologyConflict)
        {
            let mut scored: Vec<(String, f32)> = ambiguity
                .conflicting_elements
                .iter()
                .filter(|t| {
                    ctx.explicit_technologies.contains_key(*t)
                        || ctx.contextual_technologies.contains_key(*t)
                })
                .map(|t| (t.clone(), self.conflict_score(t, ctx)))
                .collect();
            if scored.len() < 2 {
                continue;
            }

            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let winner = scored[0].0.clone();

            for (i, (tech, score)) in scored.into_iter().enumerate() {
                let decision = if i == 0 {
                    ConflictDecision::Selected { score }
                } else {
                    ConflictDecision::Deprioritized {
                        in_favor_of: winner.clone(),
                        score,
                    }
                };
                decisions.entry(tech).or_insert(decision);
            }
        }

        decisions
    }

    fn conflict_score(&self, tech: &str, ctx: &TechContext) -> f32 {
        let explicit = ctx.explicit_technologies.get(tech).copied().unwrap_or(0.0);
        let contextual = ctx.contextual_technologies.get(tech).copied().unwrap_or(0.0);
        let alignment = match ctx.ecosystem_preference {
            None => 0.5,
            Some(preferred) if self.registry.ecosystem_of(tech) == Some(preferred) => 1.0,
            Some(_) => 0.0,
        };
        explicit * EXPLICIT_FACTOR + contextual * CONTEXTUAL_FACTOR + alignment * ALIGNMENT_FACTOR
    }
}
