//! Context Clue Identifier
//!
//! Independent regex families per axis: cloud provider, domain, integration
//! pattern, language, deployment style, data shape and technology category.
//! Axes never look at each other; every axis may yield any number of labels,
//! reported in order of first appearance in the text.

use regex::Regex;
use std::sync::LazyLock;

use super::types::{ContextClues, Ecosystem};

/// A labelled regex within one axis family
#[derive(Debug, Clone)]
struct CluePattern {
    label: &'static str,
    regex: Regex,
}

fn clue(label: &'static str, pattern: &str) -> CluePattern {
    CluePattern {
        label,
        regex: Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid regex: {} clue ({})", label, e)),
    }
}

// Compiled once; a malformed pattern is a programming error
static CLOUD_PATTERNS: LazyLock<Vec<(Ecosystem, Regex)>> = LazyLock::new(|| {
    vec![
        (Ecosystem::Aws, Regex::new(r"(?i)\b(aws|amazon\s+web\s+services|amazon)\b").expect("Invalid regex: aws provider")),
        (Ecosystem::Azure, Regex::new(r"(?i)\b(azure|microsoft\s+cloud)\b").expect("Invalid regex: azure provider")),
        (Ecosystem::Gcp, Regex::new(r"(?i)\b(gcp|google\s+cloud|bigquery|firebase)\b").expect("Invalid regex: gcp provider")),
    ]
});

static DOMAIN_PATTERNS: LazyLock<Vec<CluePattern>> = LazyLock::new(|| {
    vec![
        clue("customer_service", r"(?i)\b(customer\s+(service|support|calls?|experience|inquiries)|contact\s+cent(er|re)|call\s+cent(er|re)|help\s*desk|support\s+tickets?)\b"),
        clue("ml_ai", r"(?i)\b(machine\s+learning|ml\s+models?|artificial\s+intelligence|ai|sentiment\s+analysis|nlp|natural\s+language\s+processing|llms?|computer\s+vision|recommendation\s+engine)\b"),
        clue("data_processing", r"(?i)\b(etl|data\s+pipelines?|data\s+processing|data\s+warehouse|data\s+lake|batch\s+processing|analytics)\b"),
        clue("ecommerce", r"(?i)\b(e-?commerce|online\s+store|shopping\s+cart|checkout|product\s+catalog|order\s+management)\b"),
        clue("finance", r"(?i)\b(payments?|banking|fintech|invoicing|accounting|trading|financial)\b"),
        clue("healthcare", r"(?i)\b(healthcare|patients?|medical|clinical|hospitals?|ehr)\b"),
        clue("document_processing", r"(?i)\b(document\s+processing|ocr|pdfs?|scanned\s+documents?|document\s+management|invoice\s+extraction)\b"),
        clue("communication", r"(?i)\b(email|sms|chat|notifications?|voice\s+calls?|messaging\s+platform)\b"),
        clue("devops", r"(?i)\b(ci/cd|devops|deployment\s+pipelines?|infrastructure\s+as\s+code|release\s+automation)\b"),
        clue("hr", r"(?i)\b(recruiting|hiring|onboarding|payroll|human\s+resources)\b"),
    ]
});

static INTEGRATION_PATTERNS: LazyLock<Vec<CluePattern>> = LazyLock::new(|| {
    vec![
        clue("rest_api", r"(?i)\b(rest(ful)?\s*apis?|rest\s+endpoints?|http\s+apis?)\b"),
        clue("graphql", r"(?i)\bgraphql\b"),
        clue("message_queue", r"(?i)\b(message\s+(queues?|brokers?)|work\s+queues?|queue-based)\b"),
        clue("event_driven", r"(?i)\b(event[- ]driven|event\s+bus|pub/?sub)\b"),
        clue("webhook", r"(?i)\bwebhooks?\b"),
        clue("batch", r"(?i)\b(batch\s+(jobs?|processing)|nightly\s+jobs?|scheduled\s+jobs?)\b"),
        clue("streaming", r"(?i)\b(stream(ing)?\s+(data|processing|events?)|real[- ]time\s+(data|events|streaming))\b"),
        clue("service_mesh", r"(?i)\bservice\s+mesh\b"),
        clue("rpc", r"(?i)\b(grpc|rpc)\b"),
        clue("file_transfer", r"(?i)\b(sftp|ftp|file\s+transfer|file\s+uploads?)\b"),
        clue("api_integration", r"(?i)\b(integrat(e|es|ing)\s+with|third[- ]party\s+apis?|sdk)\b"),
    ]
});

static LANGUAGE_PATTERNS: LazyLock<Vec<CluePattern>> = LazyLock::new(|| {
    vec![
        clue("python", r"(?i)\b(python|django|flask|fastapi|pandas)\b"),
        clue("javascript", r"(?i)\b(javascript|node\.?js|react|vue|angular|npm)\b"),
        clue("typescript", r"(?i)\btypescript\b"),
        clue("java", r"(?i)\b(java|spring\s+boot|jvm)\b"),
        clue("go", r"(?i)\b(golang|go\s+(language|service|services|backend))\b"),
        clue("rust", r"(?i)\b(rust|cargo\s+crate)\b"),
        clue("csharp", r"(?i)(c#|\.net\b|\bcsharp\b|\bdotnet\b)"),
        clue("ruby", r"(?i)\b(ruby|rails)\b"),
        clue("php", r"(?i)\b(php|laravel)\b"),
        clue("kotlin", r"(?i)\bkotlin\b"),
    ]
});

static DEPLOYMENT_PATTERNS: LazyLock<Vec<CluePattern>> = LazyLock::new(|| {
    vec![
        clue("serverless", r"(?i)\b(serverless|faas|functions?\s+as\s+a\s+service)\b"),
        clue("containerized", r"(?i)\b(containeri[sz]ed|containers?|docker|kubernetes|k8s)\b"),
        clue("on_premise", r"(?i)\b(on[- ]prem(ise|ises)?|self[- ]hosted|private\s+data\s*cent(er|re))\b"),
        clue("hybrid", r"(?i)\bhybrid(\s+cloud)?\b"),
        clue("multi_cloud", r"(?i)\bmulti[- ]cloud\b"),
        clue("edge", r"(?i)\b(edge\s+(computing|devices?|locations?)|iot)\b"),
    ]
});

static DATA_PATTERNS: LazyLock<Vec<CluePattern>> = LazyLock::new(|| {
    vec![
        clue("relational", r"(?i)\b(relational|sql|transactional|acid)\b"),
        clue("document", r"(?i)\b(json\s+documents?|document\s+store|nosql|schemaless)\b"),
        clue("time_series", r"(?i)\b(time[- ]series|telemetry|sensor\s+data)\b"),
        clue("key_value", r"(?i)\b(key[- ]value|caching|cache|session\s+store)\b"),
        clue("graph", r"(?i)\b(graph\s+(data|database)|knowledge\s+graph)\b"),
        clue("search", r"(?i)\b(full[- ]text\s+search|search\s+(index|engine)|faceted\s+search)\b"),
        clue("unstructured", r"(?i)\b(file\s+storage|images?|videos?|attachments|media\s+files?|blobs?)\b"),
        clue("analytics", r"(?i)\b(analytics|reporting|dashboards?|olap)\b"),
    ]
});

static CATEGORY_PATTERNS: LazyLock<Vec<CluePattern>> = LazyLock::new(|| {
    vec![
        clue("database", r"(?i)\b(databases?|datastore|db)\b"),
        clue("frontend", r"(?i)\b(frontend|front-end|ui|web\s+app)\b"),
        clue("backend", r"(?i)\b(backend|back-end|api\s+server|microservices?)\b"),
        clue("messaging", r"(?i)\b(queues?|messaging|brokers?)\b"),
        clue("ai", r"(?i)\b(ai|ml|machine\s+learning|llm|nlp|sentiment)\b"),
        clue("storage", r"(?i)\b(storage|buckets?|blobs?)\b"),
        clue("monitoring", r"(?i)\b(monitoring|logging|observability|alerting)\b"),
        clue("auth", r"(?i)\b(authentication|authorization|sso|oauth|login)\b"),
        clue("workflow", r"(?i)\b(workflows?|orchestration|automation)\b"),
    ]
});

/// Labels whose pattern matches, ordered by earliest match position.
fn scan(patterns: &[CluePattern], text: &str) -> Vec<String> {
    let mut hits: Vec<(usize, &'static str)> = patterns
        .iter()
        .filter_map(|p| p.regex.find(text).map(|m| (m.start(), p.label)))
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);
    hits.into_iter().map(|(_, label)| label.to_string()).collect()
}

/// Classifies requirement text into context clues
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextClueIdentifier;

impl ContextClueIdentifier {
    pub fn new() -> Self {
        Self
    }

    /// Identify clues on every axis
    pub fn identify(&self, text: &str) -> ContextClues {
        if text.trim().is_empty() {
            return ContextClues::default();
        }

        let mut providers: Vec<(usize, Ecosystem)> = CLOUD_PATTERNS
            .iter()
            .filter_map(|(eco, re)| re.find(text).map(|m| (m.start(), *eco)))
            .collect();
        providers.sort_by_key(|(pos, _)| *pos);

        ContextClues {
            cloud_providers: providers.into_iter().map(|(_, eco)| eco).collect(),
            domains: scan(&DOMAIN_PATTERNS, text),
            integration_patterns: scan(&INTEGRATION_PATTERNS, text),
            languages: scan(&LANGUAGE_PATTERNS, text),
            deployment_preferences: scan(&DEPLOYMENT_PATTERNS, text),
            data_patterns: scan(&DATA_PATTERNS, text),
            technology_categories: scan(&CATEGORY_PATTERNS, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_no_clues() {
        let clues = ContextClueIdentifier::new().identify("   ");
        assert!(clues.is_empty());
        assert_eq!(clues.density(), 0.0);
    }

    #[test]
    fn test_cloud_and_domains_in_order() {
        let clues = ContextClueIdentifier::new().identify(
            "Integrate with Amazon Connect SDK to handle customer calls and use AWS Comprehend for sentiment analysis",
        );
        assert_eq!(clues.cloud_providers, vec![Ecosystem::Aws]);
        assert_eq!(clues.domains.first().map(String::as_str), Some("customer_service"));
        assert!(clues.domains.contains(&"ml_ai".to_string()));
        assert!(clues.integration_patterns.contains(&"api_integration".to_string()));
    }

    #[test]
    fn test_multiple_providers_are_sets() {
        let clues = ContextClueIdentifier::new()
            .identify("Migrate from Azure to AWS, with analytics landing in BigQuery");
        assert_eq!(
            clues.cloud_providers,
            vec![Ecosystem::Azure, Ecosystem::Aws, Ecosystem::Gcp]
        );
    }

    #[test]
    fn test_deployment_and_language_axes() {
        let clues = ContextClueIdentifier::new()
            .identify("A serverless Python service, containerized for local testing, exposing a REST API");
        assert_eq!(clues.deployment_preferences, vec!["serverless", "containerized"]);
        assert_eq!(clues.languages, vec!["python"]);
        assert_eq!(clues.integration_patterns, vec!["rest_api"]);
    }

    #[test]
    fn test_data_patterns() {
        let clues = ContextClueIdentifier::new()
            .identify("Store sensor data as time-series and keep a session store for caching");
        assert!(clues.data_patterns.contains(&"time_series".to_string()));
        assert!(clues.data_patterns.contains(&"key_value".to_string()));
    }

    #[test]
    fn test_density_saturates() {
        let clues = ContextClueIdentifier::new().identify(
            "AWS and Azure and GCP for healthcare payments ecommerce checkout with a REST API and webhooks in Python and Java",
        );
        assert!(clues.density() <= 1.0);
        assert!(clues.density() > 0.9);
    }
}
