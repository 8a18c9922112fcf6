//! Technology Extractor
//!
//! Four independent passes over the same text, unioned before deduplication:
//!
//! 1. alias pass: every alias occurrence, longest alias first
//! 2. pattern pass: cloud service naming, `X framework`-style suffixes, bare languages
//! 3. heuristic-entity pass: CamelCase, dotted and hyphenated names
//! 4. integration pass: higher-level phrases mapped to candidate technologies
//!
//! Scanning runs on an ASCII-lowercased copy so byte offsets line up with
//! the original text.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::aliases::{AliasRegistry, AliasTable};
use super::types::{clamp_unit, Ecosystem, ExplicitTech, ExtractionMethod};

/// Integration-inferred candidates below this confidence are dropped.
const MIN_INFERENCE_CONFIDENCE: f32 = 0.3;

const AMBIGUOUS_PENALTY: f32 = 0.6;
const ECOSYSTEM_BOOST_STEP: f32 = 0.1;
const ECOSYSTEM_BOOST_CAP: f32 = 0.2;
const KEYWORD_BOOST_STEP: f32 = 0.05;
const KEYWORD_BOOST_CAP: f32 = 0.15;
const VERSION_BOOST: f32 = 0.05;
const SIBLING_BOOST_STEP: f32 = 0.05;
const SIBLING_BOOST_CAP: f32 = 0.15;
const FREQUENCY_BOOST_CAP: f32 = 0.08;
const AFFINITY_BOOST: f32 = 0.1;

/// Leading words after a vendor name that do not start a service name.
const CLOUD_NOISE: &[&str] = &[
    "web", "services", "cloud", "platform", "account", "accounts", "console", "region", "regions",
    "marketplace", "partner", "certified", "free", "tier", "support", "team", "teams", "customer",
    "customers", "prime", "and", "or",
];

/// Words that precede `framework`, `database` etc. without naming a product.
const SUFFIX_STOPWORDS: &[&str] = &[
    "a", "an", "the", "our", "your", "their", "this", "that", "new", "custom", "internal",
    "existing", "relational", "nosql", "sql", "graph", "vector", "web", "rest", "restful",
    "public", "private", "main", "central", "shared", "legacy", "mobile", "open", "third-party",
    "reporting", "analytics", "customer", "user", "data", "search", "rules", "workflow",
    "payment", "any", "some", "one", "same", "own", "simple", "small", "big", "large", "single",
    "document", "in-memory", "cloud", "backend", "frontend", "http", "json", "external",
    "partner", "client", "server", "modern", "popular", "good", "proper", "testing", "ui",
    "orm", "central", "production", "secure", "scalable", "managed",
];

/// Capitalised or punctuated words that are ordinary language.
const ENTITY_STOPWORDS: &[&str] = &[
    "real-time", "end-to-end", "e-mail", "follow-up", "on-premise", "on-premises", "on-prem",
    "self-hosted", "third-party", "built-in", "opt-in", "sign-in", "log-in", "multi-tenant",
    "high-level", "low-level", "low-latency", "cost-effective", "state-of-the-art",
    "user-friendly", "open-source", "cross-platform", "front-end", "back-end", "event-driven",
    "time-series", "key-value", "in-memory", "e-commerce", "long-term", "short-term",
    "well-known", "read-only", "full-text", "multi-cloud", "non-functional", "phd", "ceo",
    "cto", "cfo", "mvp", "faq", "ios", "macos", "e-signature", "co-pilot", "pre-built",
    "rest", "crm", "erp", "http", "https", "json", "xml", "sql", "nosql", "saas", "etl", "url",
];

/// Lowercase keywords that corroborate a technology when found nearby.
const TECH_KEYWORDS: &[(&str, &[&str])] = &[
    ("Amazon Connect", &["call", "calls", "contact center", "agent", "ivr", "telephony"]),
    ("Amazon Connect SDK", &["call", "calls", "contact center", "agent", "ivr", "telephony"]),
    ("AWS Comprehend", &["sentiment", "entity", "entities", "nlp", "language"]),
    ("AWS Lambda", &["serverless", "function", "functions", "event", "trigger"]),
    ("Azure Functions", &["serverless", "function", "trigger", "event"]),
    ("Google Cloud Functions", &["serverless", "function", "trigger", "event"]),
    ("Amazon S3", &["bucket", "object", "storage", "upload"]),
    ("Amazon DynamoDB", &["table", "nosql", "key-value"]),
    ("Amazon Lex", &["bot", "chatbot", "intent", "conversation"]),
    ("Amazon Transcribe", &["speech", "transcription", "audio"]),
    ("PostgreSQL", &["relational", "sql", "database", "schema"]),
    ("MySQL", &["relational", "sql", "database"]),
    ("MongoDB", &["document", "nosql", "collection"]),
    ("Redis", &["cache", "caching", "session", "pub/sub"]),
    ("Docker", &["container", "containers", "image", "compose"]),
    ("Kubernetes", &["cluster", "pod", "pods", "orchestration", "helm"]),
    ("Apache Kafka", &["stream", "streaming", "topic", "topics", "event", "events"]),
    ("RabbitMQ", &["queue", "queues", "broker", "amqp"]),
    ("FastAPI", &["api", "endpoint", "endpoints", "python", "async"]),
    ("Django", &["python", "orm", "admin", "web"]),
    ("Flask", &["python", "api", "web"]),
    ("React", &["component", "components", "frontend", "ui", "hooks"]),
    ("Elasticsearch", &["search", "index", "full-text"]),
    ("Apache Airflow", &["dag", "pipeline", "schedule", "etl"]),
    ("Terraform", &["infrastructure", "iac", "provision"]),
    ("Twilio", &["sms", "voice", "call", "calls"]),
];

// Compiled once; a malformed pattern is a programming error
static CLOUD_SERVICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\b(?:Amazon|AWS)\s+([A-Z][A-Za-z0-9]*(?:\s+[A-Z][A-Za-z0-9]*){0,2})").expect("Invalid regex: Amazon service"),
        Regex::new(r"\b(?:Microsoft\s+)?Azure\s+([A-Z][A-Za-z0-9]*(?:\s+[A-Z][A-Za-z0-9]*){0,2})").expect("Invalid regex: Azure service"),
        Regex::new(r"\bGoogle\s+Cloud\s+([A-Z][A-Za-z0-9/]*(?:\s+[A-Z][A-Za-z0-9]*){0,2})").expect("Invalid regex: Google Cloud service"),
    ]
});

static SUFFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([A-Za-z][A-Za-z0-9.+#-]{1,30})\s+(framework|database|db|sdk|library|api|platform|engine)\b")
        .expect("Invalid regex: technology suffix")
});

static LANGUAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(python|javascript|typescript|java|golang|kotlin|scala|ruby|php|node\.js|deno|elixir)\b")
        .expect("Invalid regex: language names")
});

static ENTITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // CamelCase: PostgreSQL, HubSpot, DynamoDB
        Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]*)+\b").expect("Invalid regex: CamelCase entity"),
        // lowerCamel: gRPC, eBay
        Regex::new(r"\b[a-z]+[A-Z][A-Za-z0-9]*\b").expect("Invalid regex: lowerCamel entity"),
        // Dotted: Node.js, Socket.io
        Regex::new(r"\b[A-Za-z][A-Za-z0-9]*\.(?:js|io|net|py|ai)\b").expect("Invalid regex: dotted entity"),
        // Hyphenated proper names: Spring-Boot, Scikit-learn
        Regex::new(r"\b[A-Z][A-Za-z0-9]*-[A-Za-z0-9]+(?:-[A-Za-z0-9]+)?\b").expect("Invalid regex: hyphenated entity"),
    ]
});

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s{0,2}(?:v\d+(?:\.\d+)*|\d+(?:\.\d+)+)\b").expect("Invalid regex: version suffix")
});

/// Phrase family mapped to candidate technologies and their affinity keywords.
struct IntegrationRule {
    key: &'static str,
    regex: Regex,
    multiplier: f32,
    candidates: &'static [(&'static str, &'static [&'static str])],
}

fn rule(
    key: &'static str,
    pattern: &str,
    multiplier: f32,
    candidates: &'static [(&'static str, &'static [&'static str])],
) -> IntegrationRule {
    IntegrationRule {
        key,
        regex: Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid regex: {} integration ({})", key, e)),
        multiplier,
        candidates,
    }
}

static INTEGRATION_RULES: LazyLock<Vec<IntegrationRule>> = LazyLock::new(|| {
    vec![
        rule("rest_api", r"(?i)\b(rest(ful)?\s+apis?|rest\s+endpoints?|http\s+apis?)\b", 0.9, &[
            ("FastAPI", &["python"]),
            ("Express", &["node", "javascript", "typescript"]),
            ("Spring Boot", &["java", "kotlin"]),
            ("Amazon API Gateway", &["serverless", "lambda"]),
        ]),
        rule("message_queue", r"(?i)\b(message\s+(queues?|brokers?)|work\s+queues?|queue-based)\b", 0.9, &[
            ("RabbitMQ", &["amqp", "worker"]),
            ("Amazon SQS", &["serverless", "lambda"]),
            ("Azure Service Bus", &["functions"]),
            ("Google Cloud Pub/Sub", &["cloud run"]),
        ]),
        rule("event_streaming", r"(?i)\b(event\s+stream(ing|s)?|event-driven|event\s+bus|stream\s+processing)\b", 0.85, &[
            ("Apache Kafka", &["topic", "topics", "throughput"]),
            ("Google Cloud Pub/Sub", &["bigquery"]),
            ("Amazon SNS", &["lambda", "notification"]),
        ]),
        rule("service_mesh", r"(?i)\bservice\s+mesh\b", 1.0, &[("Istio", &["kubernetes", "k8s"])]),
        rule("rpc", r"(?i)\b(remote\s+procedure\s+calls?|rpc\s+calls?)\b", 0.8, &[("gRPC", &["protobuf", "microservices"])]),
        rule("workflow_orchestration", r"(?i)\b(workflow\s+orchestration|scheduled\s+jobs?|job\s+scheduler|data\s+pipelines?)\b", 0.8, &[
            ("Apache Airflow", &["python", "etl", "dag"]),
            ("AWS Step Functions", &["lambda", "serverless"]),
            ("Azure Logic Apps", &["office", "connectors"]),
        ]),
        rule("caching", r"(?i)\b(caching\s+layer|in-memory\s+cache|cache\s+layer|session\s+store|response\s+cach(e|ing))\b", 0.9, &[
            ("Redis", &["session", "latency"]),
        ]),
        rule("object_storage", r"(?i)\b(object\s+storage|file\s+storage|blob\s+store)\b", 0.8, &[
            ("Amazon S3", &["bucket"]),
            ("Azure Blob Storage", &["blob"]),
        ]),
        rule("container_orchestration", r"(?i)\b(containeri[sz]ed|container\s+orchestration)\b", 0.8, &[
            ("Docker", &["image", "compose"]),
            ("Kubernetes", &["cluster", "scaling", "orchestration"]),
        ]),
        rule("monitoring", r"(?i)\b(metrics\s+dashboards?|monitoring\s+and\s+alerting|observability)\b", 0.7, &[
            ("Prometheus", &["metrics", "kubernetes"]),
            ("Grafana", &["dashboard", "dashboards"]),
        ]),
        rule("speech", r"(?i)\b(speech[- ]to[- ]text|transcriptions?|call\s+recordings?)\b", 0.8, &[
            ("Amazon Transcribe", &["call", "calls"]),
        ]),
        rule("chatbot", r"(?i)\b(chat\s?bots?|conversational\s+(ai|agents?|interfaces?)|virtual\s+agents?)\b", 0.8, &[
            ("Amazon Lex", &["connect", "call"]),
            ("Dialogflow", &["google"]),
        ]),
        rule("sentiment", r"(?i)\bsentiment\s+analysis\b", 0.9, &[
            ("AWS Comprehend", &["text", "reviews"]),
            ("Azure Cognitive Services", &["text", "reviews"]),
        ]),
        rule("document_ocr", r"(?i)\b(ocr|extract\s+text\s+from\s+(scanned\s+)?(documents?|pdfs?|invoices?))\b", 0.8, &[
            ("Amazon Textract", &["forms", "invoices"]),
        ]),
    ]
});

/// A raw hit before scoring and deduplication.
#[derive(Debug, Clone)]
struct Candidate {
    surface: String,
    canonical: String,
    method: ExtractionMethod,
    start: usize,
    end: usize,
    base: f32,
}

/// Extracts explicit technologies from free text
pub struct TechnologyExtractor {
    registry: Arc<AliasRegistry>,
    context_window: usize,
}

impl TechnologyExtractor {
    pub fn new(registry: Arc<AliasRegistry>, context_window: usize) -> Self {
        Self {
            registry,
            context_window,
        }
    }

    /// Extract, score and deduplicate technology mentions.
    pub fn extract(&self, text: &str) -> Vec<ExplicitTech> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let lower = text.to_ascii_lowercase();
        let table = self.registry.snapshot();

        let mut candidates = self.alias_pass(&lower, text, &table);
        let alias_hits = candidates.len();
        candidates.extend(self.pattern_pass(text));
        candidates.extend(self.entity_pass(text));
        let direct_hits = candidates.len();
        candidates.extend(self.integration_pass(&lower));

        debug!(
            alias = alias_hits,
            pattern_and_entity = direct_hits - alias_hits,
            inferred = candidates.len() - direct_hits,
            "Extraction passes complete"
        );

        candidates.retain(|c| {
            let valid = !c.canonical.trim().is_empty() && c.start <= c.end && c.end <= text.len();
            if !valid {
                warn!("Skipping malformed candidate '{}'", c.surface);
            }
            valid
        });

        let scored = self.score_all(&candidates, text, &lower, &table);
        let kept = suppress_nested(scored);
        dedupe(kept)
    }

    /// Extract and fill each record's surrounding-text window.
    pub fn extract_with_context(&self, text: &str) -> Vec<ExplicitTech> {
        let mut techs = self.extract(text);
        for tech in &mut techs {
            let end = tech.position + tech.source_text.len();
            if end <= text.len() && text.is_char_boundary(end) {
                tech.context_window = self.window_text(text, tech.position, end);
            }
        }
        techs
    }

    fn alias_pass(&self, lower: &str, text: &str, table: &AliasTable) -> Vec<Candidate> {
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut out = Vec::new();

        for entry in table.entries() {
            for (start, _) in lower.match_indices(entry.alias.as_str()) {
                let end = start + entry.alias.len();
                if !is_word_span(lower, start, end) {
                    continue;
                }
                if claimed.iter().any(|(s, e)| start < *e && *s < end) {
                    continue;
                }
                if entry.context_required {
                    let around = surrounding(lower, start, end, self.context_window);
                    if !entry.context_keywords.iter().any(|k| contains_word(&around, k)) {
                        debug!(alias = %entry.alias, "Ambiguous alias without context, discarded");
                        continue;
                    }
                }

                claimed.push((start, end));
                let method = if entry.alias == entry.canonical_name.to_lowercase() {
                    ExtractionMethod::ExplicitMention
                } else {
                    ExtractionMethod::AliasMatch
                };
                out.push(Candidate {
                    surface: text[start..end].to_string(),
                    canonical: entry.canonical_name.clone(),
                    method,
                    start,
                    end,
                    base: method.base_confidence(),
                });
            }
        }
        out
    }

    fn pattern_pass(&self, text: &str) -> Vec<Candidate> {
        let mut out = Vec::new();
        let base = ExtractionMethod::PatternMatch.base_confidence();

        for pattern in CLOUD_SERVICE_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let (Some(full), Some(service)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let first_word = service.as_str().split_whitespace().next().unwrap_or_default();
                if CLOUD_NOISE.contains(&first_word.to_lowercase().as_str()) {
                    continue;
                }
                let (canonical, end) = self.resolve_cloud_service(text, full.start(), full.end());
                out.push(Candidate {
                    surface: text[full.start()..end].to_string(),
                    canonical,
                    method: ExtractionMethod::PatternMatch,
                    start: full.start(),
                    end,
                    base,
                });
            }
        }

        for caps in SUFFIX_PATTERN.captures_iter(text) {
            let (Some(word), Some(suffix)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if SUFFIX_STOPWORDS.contains(&word.as_str().to_lowercase().as_str()) {
                continue;
            }
            if let Some(candidate) = self.suffix_candidate(text, word, suffix, base) {
                out.push(candidate);
            }
        }

        for m in LANGUAGE_PATTERN.find_iter(text) {
            let canonical = self
                .registry
                .exact(m.as_str())
                .map(|r| r.canonical_name)
                .unwrap_or_else(|| title_case(m.as_str()));
            out.push(Candidate {
                surface: m.as_str().to_string(),
                canonical,
                method: ExtractionMethod::PatternMatch,
                start: m.start(),
                end: m.end(),
                base,
            });
        }

        out
    }

    /// Longest known prefix of a vendor-prefixed service name, else the whole match.
    fn resolve_cloud_service(&self, text: &str, start: usize, end: usize) -> (String, usize) {
        let phrase = &text[start..end];
        let words: Vec<(usize, &str)> = phrase
            .split_whitespace()
            .map(|w| (w.as_ptr() as usize - phrase.as_ptr() as usize, w))
            .collect();

        for take in (2..=words.len()).rev() {
            let (offset, last) = words[take - 1];
            let sub_end = start + offset + last.len();
            let sub = &text[start..sub_end];
            if let Some(hit) = self.registry.exact(sub) {
                return (hit.canonical_name, sub_end);
            }
        }
        (phrase.to_string(), end)
    }

    fn suffix_candidate(
        &self,
        text: &str,
        word: regex::Match<'_>,
        suffix: regex::Match<'_>,
        base: f32,
    ) -> Option<Candidate> {
        let suffix_lower = suffix.as_str().to_lowercase();
        let names_product = matches!(suffix_lower.as_str(), "sdk" | "api");

        // "Connect SDK", "OpenAI API": the suffix belongs to the product name
        if names_product {
            let full = &text[word.start()..suffix.end()];
            if let Some(hit) = self.registry.exact(full) {
                return Some(Candidate {
                    surface: full.to_string(),
                    canonical: hit.canonical_name,
                    method: ExtractionMethod::PatternMatch,
                    start: word.start(),
                    end: suffix.end(),
                    base,
                });
            }
        }

        if let Some(hit) = self
            .registry
            .exact(word.as_str())
            .or_else(|| self.registry.abbreviation(word.as_str()))
        {
            return Some(Candidate {
                surface: word.as_str().to_string(),
                canonical: hit.canonical_name,
                method: ExtractionMethod::PatternMatch,
                start: word.start(),
                end: word.end(),
                base,
            });
        }

        // Unknown names must look like a product, not a capitalised verb or noun
        if !looks_like_product(word.as_str())
            || ENTITY_STOPWORDS.contains(&word.as_str().to_lowercase().as_str())
        {
            return None;
        }

        let (canonical, end) = if names_product {
            (
                format!("{} {}", word.as_str(), suffix.as_str().to_uppercase()),
                suffix.end(),
            )
        } else {
            (word.as_str().to_string(), word.end())
        };
        Some(Candidate {
            surface: text[word.start()..end].to_string(),
            canonical,
            method: ExtractionMethod::PatternMatch,
            start: word.start(),
            end,
            base,
        })
    }

    fn entity_pass(&self, text: &str) -> Vec<Candidate> {
        let base = ExtractionMethod::EntityHeuristic.base_confidence();
        let mut out = Vec::new();

        for pattern in ENTITY_PATTERNS.iter() {
            for m in pattern.find_iter(text) {
                let surface = m.as_str();
                if ENTITY_STOPWORDS.contains(&surface.to_lowercase().as_str()) {
                    continue;
                }
                let canonical = self
                    .registry
                    .exact(surface)
                    .or_else(|| self.registry.abbreviation(surface))
                    .map(|r| r.canonical_name)
                    .unwrap_or_else(|| surface.to_string());
                out.push(Candidate {
                    surface: surface.to_string(),
                    canonical,
                    method: ExtractionMethod::EntityHeuristic,
                    start: m.start(),
                    end: m.end(),
                    base,
                });
            }
        }
        out
    }

    fn integration_pass(&self, lower: &str) -> Vec<Candidate> {
        let base = ExtractionMethod::IntegrationInference.base_confidence();
        let mut out = Vec::new();

        for rule in INTEGRATION_RULES.iter() {
            let Some(m) = rule.regex.find(lower) else {
                continue;
            };

            for (tech, affinity) in rule.candidates {
                // Cloud-specific candidates need their provider in the text
                let ecosystem = self.registry.ecosystem_of(tech);
                if let Some(eco) = ecosystem.filter(|e| Ecosystem::CLOUDS.contains(e)) {
                    if !eco.keywords().iter().any(|k| contains_word(lower, k)) {
                        continue;
                    }
                }

                let mut confidence = base * rule.multiplier;
                if affinity.iter().any(|k| contains_word(lower, k)) {
                    confidence += AFFINITY_BOOST;
                }
                if confidence < MIN_INFERENCE_CONFIDENCE {
                    continue;
                }

                debug!(pattern = rule.key, technology = %tech, "Integration inference");
                out.push(Candidate {
                    surface: m.as_str().to_string(),
                    canonical: tech.to_string(),
                    method: ExtractionMethod::IntegrationInference,
                    start: m.start(),
                    end: m.end(),
                    base: confidence,
                });
            }
        }
        out
    }

    fn score_all(
        &self,
        candidates: &[Candidate],
        text: &str,
        lower: &str,
        table: &AliasTable,
    ) -> Vec<(Candidate, f32)> {
        let ecosystems: HashMap<&str, Option<Ecosystem>> = candidates
            .iter()
            .map(|c| (c.canonical.as_str(), self.registry.ecosystem_of(&c.canonical)))
            .collect();
        let mentions = mention_counts(candidates);

        candidates
            .iter()
            .map(|c| {
                let around = surrounding(lower, c.start, c.end, self.context_window);
                let mut confidence = c.base;

                // Known alias override
                let alias_entry = table.get(&c.surface);
                if let Some(entry) = alias_entry {
                    if c.method != ExtractionMethod::IntegrationInference {
                        confidence = confidence.max(entry.base_confidence);
                    }
                }

                // Ecosystem context
                let ecosystem = ecosystems.get(c.canonical.as_str()).copied().flatten();
                if let Some(eco) = ecosystem.filter(|e| Ecosystem::CLOUDS.contains(e)) {
                    let hits = eco.keywords().iter().filter(|k| contains_word(&around, k)).count();
                    confidence += (ECOSYSTEM_BOOST_STEP * hits as f32).min(ECOSYSTEM_BOOST_CAP);
                }

                // Ambiguous term without its required context
                if let Some(entry) = alias_entry.filter(|e| e.context_required) {
                    if !entry.context_keywords.iter().any(|k| contains_word(&around, k)) {
                        confidence *= AMBIGUOUS_PENALTY;
                    }
                }

                // Technology-specific keywords
                if let Some((_, keywords)) = TECH_KEYWORDS.iter().find(|(name, _)| *name == c.canonical) {
                    let hits = keywords.iter().filter(|k| contains_word(&around, k)).count();
                    confidence += (KEYWORD_BOOST_STEP * hits as f32).min(KEYWORD_BOOST_CAP);
                }

                // Version number right after the mention
                if c.method != ExtractionMethod::IntegrationInference
                    && VERSION_PATTERN.is_match(&text[c.end..])
                {
                    confidence += VERSION_BOOST;
                }

                // Siblings from the same cloud ecosystem
                if let Some(eco) = ecosystem.filter(|e| Ecosystem::CLOUDS.contains(e)) {
                    let mut siblings: Vec<&str> = ecosystems
                        .iter()
                        .filter(|(name, other)| **name != c.canonical && **other == Some(eco))
                        .map(|(name, _)| *name)
                        .collect();
                    siblings.sort_unstable();
                    siblings.dedup();
                    confidence += (SIBLING_BOOST_STEP * siblings.len() as f32).min(SIBLING_BOOST_CAP);
                }

                // Repeated mentions, diminishing
                let n = mentions.get(c.canonical.as_str()).copied().unwrap_or(1).max(1);
                confidence += FREQUENCY_BOOST_CAP * (1.0 - 1.0 / n as f32);

                (c.clone(), clamp_unit(confidence))
            })
            .collect()
    }

    /// Text around a match in the original casing, for `ExplicitTech::context_window`.
    fn window_text(&self, text: &str, start: usize, end: usize) -> String {
        let (a, b) = window_bounds(text, start, end, self.context_window);
        text[a..b].trim().to_string()
    }
}

/// Internal uppercase or digits: "HubSpot", "SAP", "Neo4j".
fn looks_like_product(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest: Vec<char> = chars.collect();
    if rest.iter().any(char::is_ascii_digit) {
        return true;
    }
    first.is_uppercase() && rest.iter().any(|c| c.is_uppercase())
}

/// Distinct mention spans per canonical name, ignoring inferred candidates.
fn mention_counts(candidates: &[Candidate]) -> HashMap<&str, usize> {
    let mut spans: HashMap<&str, Vec<(usize, usize)>> = HashMap::new();
    for c in candidates {
        if c.method == ExtractionMethod::IntegrationInference {
            continue;
        }
        spans.entry(c.canonical.as_str()).or_default().push((c.start, c.end));
    }

    spans
        .into_iter()
        .map(|(name, mut list)| {
            list.sort_unstable();
            let mut merged = 0usize;
            let mut current_end = 0usize;
            for (i, (s, e)) in list.iter().enumerate() {
                if i == 0 || *s >= current_end {
                    merged += 1;
                    current_end = *e;
                } else {
                    current_end = current_end.max(*e);
                }
            }
            (name, merged)
        })
        .collect()
}

/// Drops a candidate lying inside a larger span that names a different,
/// more confident technology.
fn suppress_nested(scored: Vec<(Candidate, f32)>) -> Vec<(Candidate, f32)> {
    let keep: Vec<bool> = scored
        .iter()
        .map(|(inner, inner_conf)| {
            if inner.method == ExtractionMethod::IntegrationInference {
                return true;
            }
            !scored.iter().any(|(outer, outer_conf)| {
                outer.method != ExtractionMethod::IntegrationInference
                    && outer.canonical != inner.canonical
                    && outer.start <= inner.start
                    && inner.end <= outer.end
                    && (outer.end - outer.start) > (inner.end - inner.start)
                    && outer_conf > inner_conf
            })
        })
        .collect();

    scored
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

/// One record per canonical name: highest confidence wins, surfaces are unioned.
fn dedupe(scored: Vec<(Candidate, f32)>) -> Vec<ExplicitTech> {
    let mut groups: BTreeMap<String, Vec<(Candidate, f32)>> = BTreeMap::new();
    for item in scored {
        groups.entry(item.0.canonical.clone()).or_default().push(item);
    }

    let mut out: Vec<ExplicitTech> = groups
        .into_values()
        .filter_map(|mut group| {
            group.sort_by_key(|(c, _)| c.start);
            let mut aliases: Vec<String> = Vec::new();
            for (c, _) in &group {
                if !aliases.iter().any(|a| a.eq_ignore_ascii_case(&c.surface)) {
                    aliases.push(c.surface.clone());
                }
            }

            let (best, confidence) = group
                .into_iter()
                .reduce(|a, b| if b.1 > a.1 { b } else { a })?;

            Some(ExplicitTech {
                name: best.surface.clone(),
                canonical_name: best.canonical.clone(),
                confidence,
                extraction_method: best.method,
                source_text: best.surface.clone(),
                position: best.start,
                aliases,
                context_window: String::new(),
            })
        })
        .collect();

    out.sort_by_key(|t| t.position);
    out
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// True when `[start, end)` is not glued to neighbouring word characters.
fn is_word_span(s: &str, start: usize, end: usize) -> bool {
    let bytes = s.as_bytes();
    let before_ok = start == 0 || !is_word_byte(bytes[start - 1]);
    let after_ok = end >= bytes.len() || !is_word_byte(bytes[end]);
    before_ok && after_ok
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    !needle.is_empty()
        && haystack
            .match_indices(needle)
            .any(|(i, _)| is_word_span(haystack, i, i + needle.len()))
}

fn floor_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn window_bounds(s: &str, start: usize, end: usize, radius: usize) -> (usize, usize) {
    (
        floor_boundary(s, start.saturating_sub(radius)),
        ceil_boundary(s, end.saturating_add(radius)),
    )
}

/// Text on both sides of a match, excluding the match itself.
fn surrounding(s: &str, start: usize, end: usize, radius: usize) -> String {
    let (a, b) = window_bounds(s, start, end, radius);
    format!("{} {}", &s[a..start], &s[end..b])
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> TechnologyExtractor {
        TechnologyExtractor::new(Arc::new(AliasRegistry::with_defaults()), 100)
    }

    fn names(techs: &[ExplicitTech]) -> Vec<&str> {
        techs.iter().map(|t| t.canonical_name.as_str()).collect()
    }

    #[test]
    fn test_empty_text() {
        assert!(extractor().extract("").is_empty());
        assert!(extractor().extract("   \n ").is_empty());
    }

    #[test]
    fn test_plain_alias_list() {
        let techs = extractor().extract("use fastapi, postgres, redis, and docker");
        assert_eq!(names(&techs), vec!["FastAPI", "PostgreSQL", "Redis", "Docker"]);
        let pg = techs.iter().find(|t| t.canonical_name == "PostgreSQL").unwrap();
        assert_eq!(pg.extraction_method, ExtractionMethod::AliasMatch);
        assert_eq!(pg.name, "postgres");
    }

    #[test]
    fn test_cloud_services_with_high_confidence() {
        let techs = extractor().extract(
            "Integrate with Amazon Connect SDK to handle customer calls and use AWS Comprehend for sentiment analysis",
        );
        assert_eq!(names(&techs), vec!["Amazon Connect SDK", "AWS Comprehend"]);
        assert!(techs.iter().all(|t| t.confidence >= 0.85));
    }

    #[test]
    fn test_context_required_alias_discarded_without_context() {
        let techs = extractor().extract("Sort the list with a lambda expression before rendering");
        assert!(!names(&techs).contains(&"AWS Lambda"));

        let techs = extractor().extract("Run the resize job as a serverless lambda on AWS");
        assert!(names(&techs).contains(&"AWS Lambda"));
    }

    #[test]
    fn test_dedupe_unions_surfaces() {
        let techs = extractor().extract("Postgres today, PostgreSQL tomorrow, postgres forever");
        assert_eq!(names(&techs), vec!["PostgreSQL"]);
        let aliases = &techs[0].aliases;
        assert!(aliases.iter().any(|a| a == "Postgres"));
        assert!(aliases.iter().any(|a| a == "PostgreSQL"));
        assert_eq!(techs[0].confidence, 1.0);
    }

    #[test]
    fn test_version_number_boosts_confidence() {
        let plain = extractor().extract("Store orders in postgres");
        let versioned = extractor().extract("Store orders in postgres 15.2");
        assert!(versioned[0].confidence > plain[0].confidence);
    }

    #[test]
    fn test_unknown_camel_case_entity() {
        let techs = extractor().extract("Sync deals nightly into HubSpot");
        let hubspot = techs.iter().find(|t| t.canonical_name == "HubSpot").unwrap();
        assert_eq!(hubspot.extraction_method, ExtractionMethod::EntityHeuristic);
        assert!((hubspot.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_stopwords_are_not_entities() {
        let techs = extractor().extract("Real-time dashboards with end-to-end encryption");
        assert!(techs.is_empty(), "unexpected: {:?}", names(&techs));
    }

    #[test]
    fn test_capitalised_words_before_suffix_are_not_products() {
        for text in [
            "Migrate database records to the new schema",
            "Build API endpoints for the mobile team",
            "Inventory database must stay consistent",
        ] {
            let techs = extractor().extract(text);
            for word in ["Migrate", "Build API", "Build", "Inventory"] {
                assert!(!names(&techs).contains(&word), "{}: {:?}", text, names(&techs));
            }
        }
    }

    #[test]
    fn test_product_shaped_names_before_suffix_are_kept() {
        let techs = extractor().extract("Graph queries go to the ArangoDB database");
        assert!(names(&techs).contains(&"ArangoDB"), "{:?}", names(&techs));
    }

    #[test]
    fn test_nested_span_suppressed() {
        let techs = extractor().extract("Backend on the Spring Boot framework");
        assert_eq!(names(&techs), vec!["Spring Boot"]);
    }

    #[test]
    fn test_unknown_cloud_service_kept_by_pattern() {
        let techs = extractor().extract("Ingest clickstream through Amazon Kinesis");
        let kinesis = techs.iter().find(|t| t.canonical_name == "Amazon Kinesis").unwrap();
        assert_eq!(kinesis.extraction_method, ExtractionMethod::PatternMatch);
    }

    #[test]
    fn test_integration_inference() {
        let techs = extractor().extract("Expose a REST API to partners in Python");
        let fastapi = techs.iter().find(|t| t.canonical_name == "FastAPI").unwrap();
        assert_eq!(fastapi.extraction_method, ExtractionMethod::IntegrationInference);
        assert!(fastapi.confidence < 0.85);
        // No cloud named, so no cloud gateway is inferred
        assert!(!names(&techs).contains(&"Amazon API Gateway"));
    }

    #[test]
    fn test_sibling_services_reinforce_each_other() {
        let alone = extractor().extract("Use textract for scanned forms");
        let together = extractor().extract("Use textract for scanned forms and store them in s3");
        let a = alone.iter().find(|t| t.canonical_name == "Amazon Textract").unwrap();
        let b = together.iter().find(|t| t.canonical_name == "Amazon Textract").unwrap();
        assert!(b.confidence > a.confidence);
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let techs = TechnologyExtractor::new(Arc::new(AliasRegistry::with_defaults()), 10)
            .extract_with_context("Déployez vite ☕ avec docker — très rapide, é à ü ß 🚀 kafka");
        assert!(names(&techs).contains(&"Docker"));
        assert!(names(&techs).contains(&"Apache Kafka"));
        assert!(techs.iter().all(|t| !t.context_window.is_empty()));
    }

    #[test]
    fn test_confidences_are_bounded() {
        let text = "AWS Lambda, AWS Lambda 2.0, aws lambda, serverless AWS Lambda with Amazon S3, \
                    Amazon SQS, Amazon SNS and Amazon DynamoDB on AWS";
        for tech in extractor().extract(text) {
            assert!((0.0..=1.0).contains(&tech.confidence), "{:?}", tech);
        }
    }
}
