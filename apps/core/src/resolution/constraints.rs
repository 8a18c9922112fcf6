//! Payload flattening and constraint extraction.
//!
//! Requirement payloads are free-form JSON. Text is collected with an
//! explicit stack bounded by a maximum depth; anything nested deeper is
//! dropped. Constraints come from the structured `constraints` object
//! (authoritative) and from free-text heuristics (additive, lower trust).

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::aliases::AliasRegistry;
use super::types::RequirementConstraints;

/// Well-known text fields, read first and in this order.
pub const KNOWN_TEXT_FIELDS: &[&str] = &["description", "details", "requirements", "notes", "summary"];

/// Key holding the structured constraints object.
pub const CONSTRAINTS_FIELD: &str = "constraints";

const BANNED_KEYS: &[&str] = &["banned_tools", "banned", "excluded_tools", "forbidden"];
const INTEGRATION_KEYS: &[&str] = &["required_integrations", "integrations"];
const COMPLIANCE_KEYS: &[&str] = &["compliance_requirements", "compliance"];
const SENSITIVITY_KEYS: &[&str] = &["data_sensitivity", "sensitivity"];
const BUDGET_KEYS: &[&str] = &["budget_constraints", "budget"];
const DEPLOYMENT_KEYS: &[&str] = &["deployment_preference", "deployment"];
const PERFORMANCE_KEYS: &[&str] = &["performance_requirements", "performance"];

/// Strings reachable from `value`, depth-first in document order.
///
/// `value` itself sits at `start_depth`; nodes deeper than `max_depth` are
/// skipped together with everything below them.
pub fn collect_strings(value: &Value, start_depth: usize, max_depth: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut truncated = 0usize;
    let mut stack: Vec<(&Value, usize)> = vec![(value, start_depth)];

    while let Some((node, depth)) = stack.pop() {
        if depth > max_depth {
            truncated += 1;
            continue;
        }
        match node {
            Value::String(s) => {
                let s = s.trim();
                if !s.is_empty() {
                    out.push(s.to_string());
                }
            }
            Value::Array(items) => {
                for item in items.iter().rev() {
                    stack.push((item, depth + 1));
                }
            }
            Value::Object(map) => {
                for item in map.values().rev() {
                    stack.push((item, depth + 1));
                }
            }
            _ => {}
        }
    }

    if truncated > 0 {
        debug!("Truncated {} payload node(s) nested beyond depth {}", truncated, max_depth);
    }
    out
}

/// Builds the text corpus from a payload: known fields first, then any
/// leftover string or list-of-string fields. `constraints` is excluded.
pub fn flatten_corpus(payload: &Value, max_depth: usize) -> String {
    let parts: Vec<String> = match payload {
        Value::Object(map) => {
            let mut parts = Vec::new();
            for field in KNOWN_TEXT_FIELDS {
                if let Some(value) = map.get(*field) {
                    parts.extend(collect_strings(value, 1, max_depth));
                }
            }
            for (key, value) in map {
                if KNOWN_TEXT_FIELDS.contains(&key.as_str()) || key == CONSTRAINTS_FIELD {
                    continue;
                }
                match value {
                    Value::String(s) if !s.trim().is_empty() => parts.push(s.trim().to_string()),
                    Value::Array(items) if items.iter().all(Value::is_string) => {
                        parts.extend(collect_strings(value, 1, max_depth));
                    }
                    _ => {}
                }
            }
            parts
        }
        other => collect_strings(other, 0, max_depth),
    };

    parts.join("\n")
}

static BANNED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:do\s+not|don't|dont|must\s+not|cannot|can't|should\s+not|shouldn't)\s+use\s+([A-Za-z0-9.+#/ -]{2,40}?)(?:[,.;!)]|\s+(?:and|or|for|because|since|as|in|on)\b|$)")
            .expect("Invalid regex: do-not-use pattern"),
        Regex::new(r"(?i)\bavoid(?:ing)?\s+(?:using\s+)?([A-Za-z0-9.+#/ -]{2,40}?)(?:[,.;!)]|\s+(?:and|or|for|because|since|as|in|on)\b|$)")
            .expect("Invalid regex: avoid pattern"),
        Regex::new(r"(?i)\bno\s+([A-Za-z0-9.+#-]{2,30})\s+(?:allowed|permitted)\b")
            .expect("Invalid regex: not-allowed pattern"),
        Regex::new(r"(?i)\bwithout\s+using\s+([A-Za-z0-9.+#/ -]{2,40}?)(?:[,.;!)]|\s+(?:and|or|for|because)\b|$)")
            .expect("Invalid regex: without-using pattern"),
    ]
});

static COMPLIANCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(gdpr|hipaa|pci[- ]?dss|soc\s?2|iso\s?27001|fedramp|ccpa|sox)\b")
        .expect("Invalid regex: compliance frameworks")
});

static SENSITIVITY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("phi", Regex::new(r"(?i)\b(phi|protected\s+health\s+information)\b").expect("Invalid regex: phi")),
        ("pii", Regex::new(r"(?i)\b(pii|personal\s+data|personally\s+identifiable)\b").expect("Invalid regex: pii")),
        ("restricted", Regex::new(r"(?i)\b(classified|restricted\s+data)\b").expect("Invalid regex: restricted")),
        ("confidential", Regex::new(r"(?i)\b(confidential|sensitive\s+data)\b").expect("Invalid regex: confidential")),
        ("public", Regex::new(r"(?i)\bpublic\s+data\b").expect("Invalid regex: public data")),
    ]
});

static BUDGET_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:budget\s+(?:of|is)\s+|under\s+|below\s+)\$\s?(\d[\d,]*(?:\.\d+)?\s*[km]?)")
        .expect("Invalid regex: budget amount")
});

static BUDGET_LEVELS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        ("low", Regex::new(r"(?i)\b(low[- ]cost|cost[- ]effective|budget[- ]friendly|tight\s+budget|limited\s+budget|minimi[sz]e\s+costs?|cheap)\b").expect("Invalid regex: low budget")),
        ("high", Regex::new(r"(?i)\b(enterprise[- ]grade|premium\s+tier|unlimited\s+budget)\b").expect("Invalid regex: high budget")),
    ]
});

static DEPLOYMENT_REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:must|should|needs?\s+to|has\s+to)\s+(?:be\s+)?(?:run|deployed|hosted|running)\s+(on[- ]prem(?:ise|ises)?|in\s+the\s+cloud|serverless(?:ly)?|on\s+kubernetes|in\s+containers?|at\s+the\s+edge)")
        .expect("Invalid regex: deployment requirement")
});

static LATENCY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:latency|response\s+times?)\s+(?:under|below|<|less\s+than|of|within)\s*(\d+(?:\.\d+)?\s*(?:ms|milliseconds|s|seconds))\b")
        .expect("Invalid regex: latency requirement")
});

static THROUGHPUT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*)\s*(?:requests|req|transactions|tx)\s*(?:/|per\s+)\s*(?:s|sec|second)\b")
        .expect("Invalid regex: throughput requirement")
});

static AVAILABILITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{2}(?:\.\d+)?)\s*%\s*(?:uptime|availability)\b")
        .expect("Invalid regex: availability requirement")
});

// Case-sensitive: integration targets are proper nouns
static INTEGRATION_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[Ii]ntegrat(?:e|es|ion|ing)\s+with|[Cc]onnect(?:s|ing)?\s+to|[Ss]ync(?:s|ing)?\s+with)\s+(?:the\s+|our\s+|an?\s+|existing\s+)?([A-Z][A-Za-z0-9.]*(?:\s+[A-Z][A-Za-z0-9.]*){0,3})")
        .expect("Invalid regex: integration target")
});

/// Extracts `RequirementConstraints` from a payload and its text corpus.
pub struct ConstraintExtractor {
    registry: Arc<AliasRegistry>,
    max_depth: usize,
}

impl ConstraintExtractor {
    pub fn new(registry: Arc<AliasRegistry>, max_depth: usize) -> Self {
        Self { registry, max_depth }
    }

    pub fn extract(&self, payload: &Value, corpus: &str) -> RequirementConstraints {
        let mut constraints = RequirementConstraints::default();

        match payload.get(CONSTRAINTS_FIELD) {
            Some(Value::Object(structured)) => self.apply_structured(structured, &mut constraints),
            // "constraints": "Do not use MySQL" is free text under a known key
            Some(value @ (Value::String(_) | Value::Array(_))) => {
                for text in collect_strings(value, 1, self.max_depth) {
                    self.apply_free_text(&text, &mut constraints);
                }
            }
            _ => {}
        }
        self.apply_free_text(corpus, &mut constraints);

        debug!(
            banned = constraints.banned_tools.len(),
            integrations = constraints.required_integrations.len(),
            compliance = constraints.compliance_requirements.len(),
            "Constraints extracted"
        );
        constraints
    }

    fn apply_structured(&self, map: &Map<String, Value>, out: &mut RequirementConstraints) {
        if let Some(value) = first_present(map, BANNED_KEYS) {
            out.banned_tools
                .extend(self.string_items(value).into_iter().map(|s| s.trim().to_string()));
        }
        if let Some(value) = first_present(map, INTEGRATION_KEYS) {
            for item in self.string_items(value) {
                push_unique(&mut out.required_integrations, item);
            }
        }
        if let Some(value) = first_present(map, COMPLIANCE_KEYS) {
            for item in self.string_items(value) {
                push_unique(&mut out.compliance_requirements, normalize_compliance(&item));
            }
        }
        if let Some(value) = first_present(map, SENSITIVITY_KEYS) {
            out.data_sensitivity = scalar_text(value);
        }
        if let Some(value) = first_present(map, BUDGET_KEYS) {
            out.budget_constraints = scalar_text(value);
        }
        if let Some(value) = first_present(map, DEPLOYMENT_KEYS) {
            out.deployment_preference = scalar_text(value);
        }
        if let Some(value) = first_present(map, PERFORMANCE_KEYS) {
            out.performance_requirements = self.flatten_performance(value);
        }
    }

    fn apply_free_text(&self, text: &str, out: &mut RequirementConstraints) {
        for pattern in BANNED_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let Some(phrase) = caps.get(1).map(|m| m.as_str().trim()) else {
                    continue;
                };
                if let Some(name) = self.banned_name(phrase) {
                    out.banned_tools.insert(name);
                }
            }
        }

        for m in COMPLIANCE_PATTERN.find_iter(text) {
            push_unique(&mut out.compliance_requirements, normalize_compliance(m.as_str()));
        }

        if out.data_sensitivity.is_none() {
            out.data_sensitivity = SENSITIVITY_PATTERNS
                .iter()
                .find(|(_, re)| re.is_match(text))
                .map(|(level, _)| level.to_string());
        }

        if out.budget_constraints.is_none() {
            out.budget_constraints = BUDGET_AMOUNT
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| format!("${}", m.as_str().trim()))
                .or_else(|| {
                    BUDGET_LEVELS
                        .iter()
                        .find(|(_, re)| re.is_match(text))
                        .map(|(level, _)| level.to_string())
                });
        }

        if out.deployment_preference.is_none() {
            out.deployment_preference = DEPLOYMENT_REQUIREMENT
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| normalize_deployment(m.as_str()));
        }

        let perf = &mut out.performance_requirements;
        if let Some(m) = LATENCY_PATTERN.captures(text).and_then(|c| c.get(1)) {
            perf.entry("latency".to_string())
                .or_insert_with(|| m.as_str().replace(' ', ""));
        }
        if let Some(m) = THROUGHPUT_PATTERN.captures(text).and_then(|c| c.get(1)) {
            perf.entry("throughput".to_string())
                .or_insert_with(|| format!("{} req/s", m.as_str().replace(',', "")));
        }
        if let Some(m) = AVAILABILITY_PATTERN.captures(text).and_then(|c| c.get(1)) {
            perf.entry("availability".to_string())
                .or_insert_with(|| format!("{}%", m.as_str()));
        }

        for caps in INTEGRATION_TARGET.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let raw = m.as_str().trim_end_matches('.').trim();
                let name = self.registry.resolve(raw).unwrap_or_else(|| raw.to_string());
                push_unique(&mut out.required_integrations, name);
            }
        }
    }

    /// Free-text bans only count when the phrase names something concrete.
    fn banned_name(&self, phrase: &str) -> Option<String> {
        let phrase = phrase.trim_matches(|c: char| c.is_whitespace() || c == '-');
        if phrase.is_empty() {
            return None;
        }
        if let Some(canonical) = self.registry.exact(phrase).or_else(|| self.registry.abbreviation(phrase)) {
            return Some(canonical.canonical_name);
        }
        let single_token = !phrase.contains(' ');
        let proper_noun = phrase.chars().next().is_some_and(char::is_uppercase);
        (single_token && proper_noun).then(|| phrase.to_string())
    }

    /// Strings from a scalar, a comma-separated string, or a nested list.
    fn string_items(&self, value: &Value) -> Vec<String> {
        collect_strings(value, 1, self.max_depth)
            .into_iter()
            .flat_map(|s| {
                s.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Performance targets as flat `key -> value`, nested keys joined by dots.
    fn flatten_performance(&self, value: &Value) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut stack: Vec<(String, &Value, usize)> = vec![(String::new(), value, 1)];

        while let Some((prefix, node, depth)) = stack.pop() {
            if depth > self.max_depth {
                continue;
            }
            match node {
                Value::Object(map) => {
                    for (key, child) in map {
                        let path = if prefix.is_empty() {
                            key.clone()
                        } else {
                            format!("{}.{}", prefix, key)
                        };
                        stack.push((path, child, depth + 1));
                    }
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        let key = if prefix.is_empty() { "target".to_string() } else { prefix };
                        out.insert(key, text);
                    }
                }
            }
        }
        out
    }
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key)).filter(|v| !v.is_null())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(scalar_text).collect();
            (!joined.is_empty()).then(|| joined.join(", "))
        }
        _ => None,
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.iter().any(|existing| existing.eq_ignore_ascii_case(&item)) {
        list.push(item);
    }
}

fn normalize_compliance(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase();
    match compact.as_str() {
        "PCIDSS" => "PCI-DSS".to_string(),
        "SOC2" => "SOC2".to_string(),
        "ISO27001" => "ISO27001".to_string(),
        _ if compact.is_empty() => raw.trim().to_string(),
        _ => compact,
    }
}

fn normalize_deployment(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("prem") {
        "on_premise"
    } else if lower.contains("serverless") {
        "serverless"
    } else if lower.contains("kubernetes") || lower.contains("container") {
        "containerized"
    } else if lower.contains("edge") {
        "edge"
    } else {
        "cloud"
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extractor() -> ConstraintExtractor {
        ConstraintExtractor::new(Arc::new(AliasRegistry::with_defaults()), 8)
    }

    #[test]
    fn test_collect_strings_keeps_document_order() {
        let value = json!(["a", {"b": "b", "c": ["c"]}, "d"]);
        assert_eq!(collect_strings(&value, 0, 8), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_collect_strings_depth_boundary() {
        // "keep" sits at depth 2, "drop" at depth 3
        let value = json!({"x": {"y": "keep", "z": {"w": "drop"}}});
        assert_eq!(collect_strings(&value, 0, 2), vec!["keep"]);
        assert_eq!(collect_strings(&value, 0, 3), vec!["keep", "drop"]);
    }

    #[test]
    fn test_collect_strings_survives_deep_nesting() {
        let mut value = json!("bottom");
        for _ in 0..500 {
            value = json!({ "n": value });
        }
        assert!(collect_strings(&value, 0, 8).is_empty());
        assert_eq!(collect_strings(&value, 0, 1_000), vec!["bottom"]);
    }

    #[test]
    fn test_flatten_corpus_known_fields_first() {
        let payload = json!({
            "zzz_extra": "leftover text",
            "summary": "summary text",
            "description": "description text",
            "priority": 3,
            "tags": ["alpha", "beta"],
            "constraints": {"banned_tools": ["MySQL"]}
        });
        let corpus = flatten_corpus(&payload, 8);
        let lines: Vec<&str> = corpus.lines().collect();
        assert_eq!(lines[0], "description text");
        assert_eq!(lines[1], "summary text");
        assert!(corpus.contains("alpha"));
        assert!(corpus.contains("leftover text"));
        assert!(!corpus.contains("MySQL"));
    }

    #[test]
    fn test_flatten_corpus_empty_payload() {
        assert!(flatten_corpus(&json!({}), 8).is_empty());
        assert!(flatten_corpus(&Value::Null, 8).is_empty());
    }

    #[test]
    fn test_structured_constraints() {
        let payload = json!({
            "constraints": {
                "banned_tools": ["Oracle", "MySQL"],
                "required_integrations": "Salesforce, Slack",
                "compliance": ["hipaa", "PCI DSS"],
                "data_sensitivity": "phi",
                "budget": 5000,
                "deployment": "on_premise",
                "performance": {"latency": "200ms", "throughput": {"peak": 1000}}
            }
        });
        let c = extractor().extract(&payload, "");
        assert!(c.banned_tools.contains("Oracle") && c.banned_tools.contains("MySQL"));
        assert_eq!(c.required_integrations, vec!["Salesforce", "Slack"]);
        assert_eq!(c.compliance_requirements, vec!["HIPAA", "PCI-DSS"]);
        assert_eq!(c.data_sensitivity.as_deref(), Some("phi"));
        assert_eq!(c.budget_constraints.as_deref(), Some("5000"));
        assert_eq!(c.deployment_preference.as_deref(), Some("on_premise"));
        assert_eq!(c.performance_requirements.get("latency").map(String::as_str), Some("200ms"));
        assert_eq!(
            c.performance_requirements.get("throughput.peak").map(String::as_str),
            Some("1000")
        );
    }

    #[test]
    fn test_free_text_bans_resolve_to_canonical_names() {
        let c = extractor().extract(
            &json!({}),
            "Do not use mongo for this. Avoid Oracle, and please avoid the usual suspects.",
        );
        assert!(c.banned_tools.contains("MongoDB"));
        assert!(c.banned_tools.contains("Oracle"));
        assert_eq!(c.banned_tools.len(), 2);
    }

    #[test]
    fn test_structured_values_win_over_free_text() {
        let payload = json!({"constraints": {"data_sensitivity": "public"}});
        let c = extractor().extract(&payload, "The dataset contains PII.");
        assert_eq!(c.data_sensitivity.as_deref(), Some("public"));
    }

    #[test]
    fn test_free_text_heuristics() {
        let text = "Must be GDPR and SOC 2 compliant, handle 1,500 requests per second \
                    with latency under 200 ms and 99.9% uptime. It must be deployed on-prem \
                    on a tight budget. Integrate with Amazon Connect SDK to route calls.";
        let c = extractor().extract(&json!({}), text);
        assert_eq!(c.compliance_requirements, vec!["GDPR", "SOC2"]);
        assert_eq!(c.performance_requirements.get("throughput").map(String::as_str), Some("1500 req/s"));
        assert_eq!(c.performance_requirements.get("latency").map(String::as_str), Some("200ms"));
        assert_eq!(c.performance_requirements.get("availability").map(String::as_str), Some("99.9%"));
        assert_eq!(c.deployment_preference.as_deref(), Some("on_premise"));
        assert_eq!(c.budget_constraints.as_deref(), Some("low"));
        assert_eq!(c.required_integrations, vec!["Amazon Connect SDK"]);
    }

    #[test]
    fn test_free_text_under_constraints_key() {
        let extractor = extractor();
        for payload in [
            json!({ "description": "Store orders in MySQL or PostgreSQL", "constraints": "Do not use MySQL" }),
            json!({ "description": "Store orders in MySQL or PostgreSQL", "constraints": ["Do not use MySQL", "must be HIPAA compliant"] }),
        ] {
            let corpus = flatten_corpus(&payload, 8);
            assert!(!corpus.contains("Do not use"));
            let constraints = extractor.extract(&payload, &corpus);
            assert!(constraints.banned_tools.contains("MySQL"), "{:?}", constraints.banned_tools);
        }

        let payload = json!({ "constraints": ["Do not use MySQL", "must be HIPAA compliant"] });
        let constraints = extractor.extract(&payload, "");
        assert_eq!(constraints.compliance_requirements, vec!["HIPAA"]);
    }

    #[test]
    fn test_no_constraints_in_plain_text() {
        let c = extractor().extract(&json!({}), "Build a dashboard for the sales team");
        assert!(c.is_empty());
    }
}
