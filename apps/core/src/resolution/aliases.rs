//! Alias Registry.
//!
//! Static table mapping technology aliases, abbreviations and canonical names
//! to canonical technologies with ecosystem/category metadata. The table is
//! immutable during request handling; `reload` swaps it atomically.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::types::{Ecosystem, TechCategory};
use crate::error::{EngineError, Result};

/// Shorter side of a partial match must be at least this long.
const MIN_PARTIAL_LEN: usize = 3;

/// Partial matches below this length ratio are rejected as spurious.
const MIN_PARTIAL_RATIO: f32 = 0.5;

/// One alias entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyAlias {
    /// Lowercase surface form
    pub alias: String,
    pub canonical_name: String,
    /// Confidence of a hit on this alias (0.0 - 1.0)
    pub base_confidence: f32,
    /// Ambiguous standalone word: only valid near one of `context_keywords`
    pub context_required: bool,
    pub category: TechCategory,
    pub ecosystem: Ecosystem,
    /// Lowercase keywords that disambiguate a `context_required` alias
    #[serde(default)]
    pub context_keywords: Vec<String>,
}

impl TechnologyAlias {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.alias.trim().is_empty() {
            return Err(format!("empty alias for '{}'", self.canonical_name));
        }
        if self.canonical_name.trim().is_empty() {
            return Err(format!("empty canonical name for alias '{}'", self.alias));
        }
        if !(0.0..=1.0).contains(&self.base_confidence) {
            return Err(format!(
                "confidence {} out of range for alias '{}'",
                self.base_confidence, self.alias
            ));
        }
        if self.context_required && self.context_keywords.is_empty() {
            return Err(format!(
                "alias '{}' requires context but lists no keywords",
                self.alias
            ));
        }
        Ok(())
    }
}

// (alias, canonical, base confidence, category, ecosystem, required context keywords)
type AliasSpec = (
    &'static str,
    &'static str,
    f32,
    TechCategory,
    Ecosystem,
    &'static [&'static str],
);

use Ecosystem::{Aws, Azure, Gcp, OpenSource as Oss};
use TechCategory as C;

const AWS_CTX: &[&str] = &["aws", "amazon"];
const AZURE_CTX: &[&str] = &["azure", "microsoft"];

const DEFAULT_ALIASES: &[AliasSpec] = &[
    // AWS
    ("amazon connect", "Amazon Connect", 0.95, C::Communication, Aws, &[]),
    ("aws connect", "Amazon Connect", 0.95, C::Communication, Aws, &[]),
    ("connect", "Amazon Connect", 0.8, C::Communication, Aws, &["aws", "amazon", "contact center", "call center"]),
    ("amazon connect sdk", "Amazon Connect SDK", 0.95, C::Communication, Aws, &[]),
    ("connect sdk", "Amazon Connect SDK", 0.85, C::Communication, Aws, AWS_CTX),
    ("aws comprehend", "AWS Comprehend", 0.95, C::AiService, Aws, &[]),
    ("amazon comprehend", "AWS Comprehend", 0.95, C::AiService, Aws, &[]),
    ("comprehend", "AWS Comprehend", 0.8, C::AiService, Aws, &["aws", "amazon", "sentiment", "nlp"]),
    ("aws lambda", "AWS Lambda", 0.95, C::Compute, Aws, &[]),
    ("amazon lambda", "AWS Lambda", 0.95, C::Compute, Aws, &[]),
    ("lambda", "AWS Lambda", 0.8, C::Compute, Aws, &["aws", "amazon", "serverless"]),
    ("amazon s3", "Amazon S3", 0.95, C::Storage, Aws, &[]),
    ("aws s3", "Amazon S3", 0.95, C::Storage, Aws, &[]),
    ("s3", "Amazon S3", 0.9, C::Storage, Aws, &[]),
    ("amazon dynamodb", "Amazon DynamoDB", 0.95, C::Database, Aws, &[]),
    ("dynamodb", "Amazon DynamoDB", 0.95, C::Database, Aws, &[]),
    ("dynamo db", "Amazon DynamoDB", 0.9, C::Database, Aws, &[]),
    ("amazon sqs", "Amazon SQS", 0.95, C::Messaging, Aws, &[]),
    ("aws sqs", "Amazon SQS", 0.95, C::Messaging, Aws, &[]),
    ("sqs", "Amazon SQS", 0.9, C::Messaging, Aws, &[]),
    ("amazon sns", "Amazon SNS", 0.95, C::Messaging, Aws, &[]),
    ("sns", "Amazon SNS", 0.85, C::Messaging, Aws, &[]),
    ("amazon eks", "Amazon EKS", 0.95, C::Container, Aws, &[]),
    ("aws eks", "Amazon EKS", 0.95, C::Container, Aws, &[]),
    ("eks", "Amazon EKS", 0.9, C::Container, Aws, &[]),
    ("amazon ecs", "Amazon ECS", 0.95, C::Container, Aws, &[]),
    ("ecs", "Amazon ECS", 0.85, C::Container, Aws, &[]),
    ("amazon api gateway", "Amazon API Gateway", 0.95, C::Integration, Aws, &[]),
    ("aws api gateway", "Amazon API Gateway", 0.95, C::Integration, Aws, &[]),
    ("api gateway", "Amazon API Gateway", 0.8, C::Integration, Aws, AWS_CTX),
    ("aws step functions", "AWS Step Functions", 0.95, C::Workflow, Aws, &[]),
    ("step functions", "AWS Step Functions", 0.9, C::Workflow, Aws, &[]),
    ("amazon bedrock", "Amazon Bedrock", 0.95, C::AiService, Aws, &[]),
    ("aws bedrock", "Amazon Bedrock", 0.95, C::AiService, Aws, &[]),
    ("bedrock", "Amazon Bedrock", 0.8, C::AiService, Aws, &["aws", "amazon", "llm", "model"]),
    ("amazon textract", "Amazon Textract", 0.95, C::AiService, Aws, &[]),
    ("textract", "Amazon Textract", 0.9, C::AiService, Aws, &[]),
    ("amazon lex", "Amazon Lex", 0.95, C::AiService, Aws, &[]),
    ("lex", "Amazon Lex", 0.75, C::AiService, Aws, &["aws", "amazon", "bot", "chatbot"]),
    ("amazon transcribe", "Amazon Transcribe", 0.95, C::AiService, Aws, &[]),
    ("transcribe", "Amazon Transcribe", 0.75, C::AiService, Aws, &["aws", "amazon", "speech"]),
    ("amazon cloudwatch", "Amazon CloudWatch", 0.95, C::Observability, Aws, &[]),
    ("cloudwatch", "Amazon CloudWatch", 0.95, C::Observability, Aws, &[]),
    ("amazon rds", "Amazon RDS", 0.95, C::Database, Aws, &[]),
    ("rds", "Amazon RDS", 0.85, C::Database, Aws, &[]),
    ("aws glue", "AWS Glue", 0.95, C::Integration, Aws, &[]),
    ("glue", "AWS Glue", 0.7, C::Integration, Aws, &["aws", "amazon", "etl"]),
    // Azure
    ("azure functions", "Azure Functions", 0.95, C::Compute, Azure, &[]),
    ("azure function", "Azure Functions", 0.95, C::Compute, Azure, &[]),
    ("functions", "Azure Functions", 0.7, C::Compute, Azure, &["azure", "microsoft"]),
    ("azure cognitive services", "Azure Cognitive Services", 0.95, C::AiService, Azure, &[]),
    ("cognitive services", "Azure Cognitive Services", 0.9, C::AiService, Azure, &[]),
    ("azure openai", "Azure OpenAI", 0.95, C::AiService, Azure, &[]),
    ("azure cosmos db", "Azure Cosmos DB", 0.95, C::Database, Azure, &[]),
    ("cosmos db", "Azure Cosmos DB", 0.95, C::Database, Azure, &[]),
    ("cosmosdb", "Azure Cosmos DB", 0.95, C::Database, Azure, &[]),
    ("azure kubernetes service", "Azure Kubernetes Service", 0.95, C::Container, Azure, &[]),
    ("aks", "Azure Kubernetes Service", 0.9, C::Container, Azure, &[]),
    ("azure service bus", "Azure Service Bus", 0.95, C::Messaging, Azure, &[]),
    ("service bus", "Azure Service Bus", 0.8, C::Messaging, Azure, AZURE_CTX),
    ("azure logic apps", "Azure Logic Apps", 0.95, C::Workflow, Azure, &[]),
    ("logic apps", "Azure Logic Apps", 0.9, C::Workflow, Azure, &[]),
    ("azure blob storage", "Azure Blob Storage", 0.95, C::Storage, Azure, &[]),
    ("blob storage", "Azure Blob Storage", 0.85, C::Storage, Azure, &[]),
    ("storage", "Azure Blob Storage", 0.6, C::Storage, Azure, &["azure", "blob"]),
    ("azure communication services", "Azure Communication Services", 0.95, C::Communication, Azure, &[]),
    ("azure devops", "Azure DevOps", 0.95, C::Infrastructure, Azure, &[]),
    // Google Cloud
    ("google cloud functions", "Google Cloud Functions", 0.95, C::Compute, Gcp, &[]),
    ("cloud functions", "Google Cloud Functions", 0.85, C::Compute, Gcp, &[]),
    ("bigquery", "BigQuery", 0.95, C::Database, Gcp, &[]),
    ("big query", "BigQuery", 0.9, C::Database, Gcp, &[]),
    ("google kubernetes engine", "Google Kubernetes Engine", 0.95, C::Container, Gcp, &[]),
    ("gke", "Google Kubernetes Engine", 0.9, C::Container, Gcp, &[]),
    ("google cloud pub/sub", "Google Cloud Pub/Sub", 0.95, C::Messaging, Gcp, &[]),
    ("pub/sub", "Google Cloud Pub/Sub", 0.85, C::Messaging, Gcp, &[]),
    ("pubsub", "Google Cloud Pub/Sub", 0.85, C::Messaging, Gcp, &[]),
    ("google cloud run", "Google Cloud Run", 0.95, C::Compute, Gcp, &[]),
    ("cloud run", "Google Cloud Run", 0.9, C::Compute, Gcp, &[]),
    ("vertex ai", "Vertex AI", 0.95, C::AiService, Gcp, &[]),
    ("dialogflow", "Dialogflow", 0.95, C::AiService, Gcp, &[]),
    ("firestore", "Firestore", 0.95, C::Database, Gcp, &[]),
    // Frameworks and runtimes
    ("fastapi", "FastAPI", 0.95, C::Framework, Oss, &[]),
    ("fast api", "FastAPI", 0.9, C::Framework, Oss, &[]),
    ("django", "Django", 0.95, C::Framework, Oss, &[]),
    ("flask", "Flask", 0.85, C::Framework, Oss, &["python", "api", "web", "app"]),
    ("express.js", "Express", 0.95, C::Framework, Oss, &[]),
    ("expressjs", "Express", 0.95, C::Framework, Oss, &[]),
    ("express", "Express", 0.75, C::Framework, Oss, &["node", "javascript", "npm", "typescript"]),
    ("spring boot", "Spring Boot", 0.95, C::Framework, Oss, &[]),
    ("springboot", "Spring Boot", 0.9, C::Framework, Oss, &[]),
    ("ruby on rails", "Ruby on Rails", 0.95, C::Framework, Oss, &[]),
    ("rails", "Ruby on Rails", 0.75, C::Framework, Oss, &["ruby", "gem", "web app"]),
    ("node.js", "Node.js", 0.95, C::Framework, Oss, &[]),
    ("nodejs", "Node.js", 0.95, C::Framework, Oss, &[]),
    ("node", "Node.js", 0.7, C::Framework, Oss, &["javascript", "npm", "typescript", "backend"]),
    ("react", "React", 0.8, C::Framework, Oss, &["frontend", "ui", "component", "javascript", "typescript", "web app"]),
    ("reactjs", "React", 0.95, C::Framework, Oss, &[]),
    ("react.js", "React", 0.95, C::Framework, Oss, &[]),
    ("vue.js", "Vue.js", 0.95, C::Framework, Oss, &[]),
    ("vuejs", "Vue.js", 0.95, C::Framework, Oss, &[]),
    ("vue", "Vue.js", 0.85, C::Framework, Oss, &[]),
    ("angular", "Angular", 0.9, C::Framework, Oss, &[]),
    ("graphql", "GraphQL", 0.95, C::Integration, Oss, &[]),
    ("grpc", "gRPC", 0.95, C::Integration, Oss, &[]),
    // Data stores
    ("postgresql", "PostgreSQL", 0.95, C::Database, Oss, &[]),
    ("postgres", "PostgreSQL", 0.95, C::Database, Oss, &[]),
    ("psql", "PostgreSQL", 0.85, C::Database, Oss, &[]),
    ("mysql", "MySQL", 0.95, C::Database, Oss, &[]),
    ("mongodb", "MongoDB", 0.95, C::Database, Oss, &[]),
    ("mongo db", "MongoDB", 0.9, C::Database, Oss, &[]),
    ("redis", "Redis", 0.95, C::Cache, Oss, &[]),
    ("elasticsearch", "Elasticsearch", 0.95, C::Database, Oss, &[]),
    ("elastic search", "Elasticsearch", 0.9, C::Database, Oss, &[]),
    ("neo4j", "Neo4j", 0.95, C::Database, Oss, &[]),
    ("influxdb", "InfluxDB", 0.95, C::Database, Oss, &[]),
    ("sqlite", "SQLite", 0.95, C::Database, Oss, &[]),
    // Messaging
    ("apache kafka", "Apache Kafka", 0.95, C::Messaging, Oss, &[]),
    ("kafka", "Apache Kafka", 0.95, C::Messaging, Oss, &[]),
    ("rabbitmq", "RabbitMQ", 0.95, C::Messaging, Oss, &[]),
    ("rabbit mq", "RabbitMQ", 0.9, C::Messaging, Oss, &[]),
    // Containers and infrastructure
    ("docker", "Docker", 0.95, C::Container, Oss, &[]),
    ("kubernetes", "Kubernetes", 0.95, C::Container, Oss, &[]),
    ("k8s", "Kubernetes", 0.95, C::Container, Oss, &[]),
    ("istio", "Istio", 0.95, C::Infrastructure, Oss, &[]),
    ("helm", "Helm", 0.75, C::Infrastructure, Oss, &["kubernetes", "k8s", "chart"]),
    ("terraform", "Terraform", 0.95, C::Infrastructure, Oss, &[]),
    ("ansible", "Ansible", 0.95, C::Infrastructure, Oss, &[]),
    ("jenkins", "Jenkins", 0.95, C::Infrastructure, Oss, &[]),
    ("github actions", "GitHub Actions", 0.95, C::Infrastructure, Oss, &[]),
    ("nginx", "Nginx", 0.95, C::Infrastructure, Oss, &[]),
    ("prometheus", "Prometheus", 0.9, C::Observability, Oss, &[]),
    ("grafana", "Grafana", 0.95, C::Observability, Oss, &[]),
    // Workflow and automation
    ("apache airflow", "Apache Airflow", 0.95, C::Workflow, Oss, &[]),
    ("airflow", "Apache Airflow", 0.9, C::Workflow, Oss, &[]),
    ("celery", "Celery", 0.8, C::Workflow, Oss, &["python", "task", "worker", "queue"]),
    ("n8n", "n8n", 0.95, C::Workflow, Oss, &[]),
    ("zapier", "Zapier", 0.95, C::Workflow, Oss, &[]),
    ("uipath", "UiPath", 0.95, C::Workflow, Oss, &[]),
    ("selenium", "Selenium", 0.95, C::Workflow, Oss, &[]),
    ("playwright", "Playwright", 0.95, C::Workflow, Oss, &[]),
    // AI and data processing
    ("openai", "OpenAI API", 0.9, C::AiService, Oss, &[]),
    ("openai api", "OpenAI API", 0.95, C::AiService, Oss, &[]),
    ("langchain", "LangChain", 0.95, C::AiService, Oss, &[]),
    ("apache spark", "Apache Spark", 0.95, C::Integration, Oss, &[]),
    ("pyspark", "Apache Spark", 0.95, C::Integration, Oss, &[]),
    ("spark", "Apache Spark", 0.75, C::Integration, Oss, &["apache", "data", "cluster", "etl"]),
    ("pandas", "pandas", 0.8, C::Integration, Oss, &["python", "dataframe", "data"]),
    // SaaS
    ("twilio", "Twilio", 0.95, C::Communication, Oss, &[]),
    ("slack", "Slack", 0.85, C::Communication, Oss, &[]),
    ("salesforce", "Salesforce", 0.95, C::Integration, Oss, &[]),
    // Languages
    ("python", "Python", 0.95, C::Language, Oss, &[]),
    ("javascript", "JavaScript", 0.95, C::Language, Oss, &[]),
    ("typescript", "TypeScript", 0.95, C::Language, Oss, &[]),
    ("java", "Java", 0.9, C::Language, Oss, &[]),
    ("golang", "Go", 0.95, C::Language, Oss, &[]),
    ("go", "Go", 0.7, C::Language, Oss, &["golang", "goroutine", "language", "backend service"]),
    ("rust", "Rust", 0.75, C::Language, Oss, &["language", "cargo", "crate", "backend"]),
    ("c#", "C#", 0.9, C::Language, Oss, &[]),
    ("csharp", "C#", 0.9, C::Language, Oss, &[]),
    (".net", ".NET", 0.9, C::Framework, Oss, &[]),
    ("dotnet", ".NET", 0.9, C::Framework, Oss, &[]),
    ("ruby", "Ruby", 0.85, C::Language, Oss, &[]),
    ("php", "PHP", 0.9, C::Language, Oss, &[]),
];

/// Short forms resolved only through `resolve`; too noisy to scan for in prose.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("js", "JavaScript"),
    ("ts", "TypeScript"),
    ("py", "Python"),
    ("k8s", "Kubernetes"),
    ("pg", "PostgreSQL"),
    ("mongo", "MongoDB"),
    ("es", "Elasticsearch"),
    ("tf", "Terraform"),
    ("ddb", "Amazon DynamoDB"),
    ("rmq", "RabbitMQ"),
    ("gcf", "Google Cloud Functions"),
    ("gha", "GitHub Actions"),
];

/// How a name was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Abbreviation,
    Fuzzy,
    Partial,
}

/// A successful resolution with its own confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub canonical_name: String,
    /// Resolution confidence (0.0 - 1.0)
    pub confidence: f32,
    pub method: ResolutionMethod,
}

#[derive(Debug, Clone)]
struct CanonicalInfo {
    name: String,
    category: TechCategory,
    ecosystem: Ecosystem,
}

/// One immutable generation of the alias table.
#[derive(Debug, Default)]
pub struct AliasTable {
    /// Sorted longest alias first
    entries: Vec<TechnologyAlias>,
    by_alias: HashMap<String, usize>,
    canonical: HashMap<String, CanonicalInfo>,
    abbreviations: HashMap<String, String>,
}

impl AliasTable {
    fn build(entries: Vec<TechnologyAlias>) -> Self {
        let mut table = AliasTable::default();
        let mut entries = entries;

        // Every canonical name also resolves as its own alias
        let mut self_aliases = Vec::new();
        for entry in &entries {
            let lower = entry.canonical_name.to_lowercase();
            if !entries.iter().any(|e| e.alias == lower)
                && !self_aliases.iter().any(|e: &TechnologyAlias| e.alias == lower)
            {
                self_aliases.push(TechnologyAlias {
                    alias: lower,
                    canonical_name: entry.canonical_name.clone(),
                    base_confidence: 1.0,
                    context_required: false,
                    category: entry.category,
                    ecosystem: entry.ecosystem,
                    context_keywords: vec![],
                });
            }
        }
        entries.extend(self_aliases);
        entries.sort_by(|a, b| b.alias.len().cmp(&a.alias.len()).then(a.alias.cmp(&b.alias)));

        for (idx, entry) in entries.iter().enumerate() {
            table.by_alias.entry(entry.alias.clone()).or_insert(idx);
            table
                .canonical
                .entry(entry.canonical_name.to_lowercase())
                .or_insert_with(|| CanonicalInfo {
                    name: entry.canonical_name.clone(),
                    category: entry.category,
                    ecosystem: entry.ecosystem,
                });
        }

        for (abbr, canonical) in ABBREVIATIONS {
            if table.canonical.contains_key(&canonical.to_lowercase()) {
                table
                    .abbreviations
                    .insert(abbr.to_string(), canonical.to_string());
            }
        }

        table.entries = entries;
        table
    }

    /// All entries, longest alias first.
    pub fn entries(&self) -> &[TechnologyAlias] {
        &self.entries
    }

    pub fn get(&self, alias: &str) -> Option<&TechnologyAlias> {
        self.by_alias
            .get(&alias.trim().to_lowercase())
            .and_then(|idx| self.entries.get(*idx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry of technology aliases; cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct AliasRegistry {
    table: RwLock<Arc<AliasTable>>,
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AliasRegistry {
    /// Registry seeded with the built-in alias table.
    pub fn with_defaults() -> Self {
        let entries = DEFAULT_ALIASES
            .iter()
            .map(|(alias, canonical, confidence, category, ecosystem, keywords)| {
                TechnologyAlias {
                    alias: alias.to_string(),
                    canonical_name: canonical.to_string(),
                    base_confidence: *confidence,
                    context_required: !keywords.is_empty(),
                    category: *category,
                    ecosystem: *ecosystem,
                    context_keywords: keywords.iter().map(|k| k.to_string()).collect(),
                }
            })
            .collect();
        Self::lenient(entries)
    }

    /// Builds a registry, skipping (and logging) malformed entries.
    pub fn lenient(entries: Vec<TechnologyAlias>) -> Self {
        let valid: Vec<TechnologyAlias> = entries
            .into_iter()
            .filter_map(|entry| match entry.validate() {
                Ok(()) => Some(normalize(entry)),
                Err(reason) => {
                    warn!("Skipping malformed alias entry: {}", reason);
                    None
                }
            })
            .collect();

        let table = AliasTable::build(valid);
        debug!("Alias registry loaded with {} entries", table.len());
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    /// Builds a registry, rejecting the whole table on any malformed entry.
    pub fn from_entries(entries: Vec<TechnologyAlias>) -> Result<Self> {
        let table = Self::validated_table(entries)?;
        Ok(Self {
            table: RwLock::new(Arc::new(table)),
        })
    }

    /// Administrative reload. On error the current table stays in place.
    pub fn reload(&self, entries: Vec<TechnologyAlias>) -> Result<()> {
        let table = Self::validated_table(entries)?;
        let count = table.len();
        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(table);
        info!("Alias registry reloaded with {} entries", count);
        Ok(())
    }

    fn validated_table(entries: Vec<TechnologyAlias>) -> Result<AliasTable> {
        if entries.is_empty() {
            return Err(EngineError::AliasTable("alias table is empty".to_string()));
        }
        for entry in &entries {
            entry.validate().map_err(EngineError::AliasTable)?;
        }
        Ok(AliasTable::build(entries.into_iter().map(normalize).collect()))
    }

    /// The current table generation. Holding it never blocks a reload.
    pub fn snapshot(&self) -> Arc<AliasTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Resolve through exact, abbreviation, then partial matching.
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.exact(name)
            .or_else(|| self.abbreviation(name))
            .or_else(|| self.partial(name))
            .map(|r| r.canonical_name)
    }

    /// Exact case-insensitive alias or canonical-name match.
    pub fn exact(&self, name: &str) -> Option<Resolution> {
        let table = self.snapshot();
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }

        if let Some(entry) = table.get(&key) {
            return Some(Resolution {
                canonical_name: entry.canonical_name.clone(),
                confidence: 1.0,
                method: ResolutionMethod::Exact,
            });
        }

        table.canonical.get(&key).map(|info| Resolution {
            canonical_name: info.name.clone(),
            confidence: 1.0,
            method: ResolutionMethod::Exact,
        })
    }

    pub fn abbreviation(&self, name: &str) -> Option<Resolution> {
        let table = self.snapshot();
        table
            .abbreviations
            .get(&name.trim().to_lowercase())
            .map(|canonical| Resolution {
                canonical_name: canonical.clone(),
                confidence: 0.95,
                method: ResolutionMethod::Abbreviation,
            })
    }

    /// Substring match in either direction, gated by a length-ratio check.
    pub fn partial(&self, name: &str) -> Option<Resolution> {
        let key = name.trim().to_lowercase();
        if key.len() < MIN_PARTIAL_LEN {
            return None;
        }

        let table = self.snapshot();
        let mut best: Option<(f32, &TechnologyAlias)> = None;

        for entry in table.entries() {
            if entry.context_required {
                continue;
            }
            let (shorter, longer) = if entry.alias.len() <= key.len() {
                (entry.alias.as_str(), key.as_str())
            } else {
                (key.as_str(), entry.alias.as_str())
            };
            if shorter.len() < MIN_PARTIAL_LEN || !longer.contains(shorter) {
                continue;
            }

            let ratio = shorter.len() as f32 / longer.len() as f32;
            if ratio < MIN_PARTIAL_RATIO {
                continue;
            }
            if best.map_or(true, |(score, _)| ratio > score) {
                best = Some((ratio, entry));
            }
        }

        best.map(|(ratio, entry)| Resolution {
            canonical_name: entry.canonical_name.clone(),
            confidence: 0.5 + 0.4 * ratio,
            method: ResolutionMethod::Partial,
        })
    }

    pub fn is_canonical(&self, name: &str) -> bool {
        self.snapshot()
            .canonical
            .get(&name.trim().to_lowercase())
            .is_some_and(|info| info.name == name.trim())
    }

    pub fn canonical_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .snapshot()
            .canonical
            .values()
            .map(|info| info.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Ecosystem of a canonical name, falling back to name-based inference.
    pub fn ecosystem_of(&self, name: &str) -> Option<Ecosystem> {
        self.snapshot()
            .canonical
            .get(&name.trim().to_lowercase())
            .map(|info| info.ecosystem)
            .or_else(|| Ecosystem::infer_from_name(name))
    }

    pub fn category_of(&self, name: &str) -> Option<TechCategory> {
        self.snapshot()
            .canonical
            .get(&name.trim().to_lowercase())
            .map(|info| info.category)
    }
}

fn normalize(mut entry: TechnologyAlias) -> TechnologyAlias {
    entry.alias = entry.alias.trim().to_lowercase();
    entry.canonical_name = entry.canonical_name.trim().to_string();
    entry.context_keywords = entry
        .context_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(alias: &str, canonical: &str, confidence: f32) -> TechnologyAlias {
        TechnologyAlias {
            alias: alias.to_string(),
            canonical_name: canonical.to_string(),
            base_confidence: confidence,
            context_required: false,
            category: TechCategory::Database,
            ecosystem: Ecosystem::OpenSource,
            context_keywords: vec![],
        }
    }

    #[test]
    fn test_default_table_has_no_malformed_entries() {
        for (a, canonical, confidence, _, _, _) in DEFAULT_ALIASES {
            assert!(!a.is_empty() && !canonical.is_empty());
            assert!((0.0..=1.0).contains(confidence), "bad confidence for {}", a);
        }
        let registry = AliasRegistry::with_defaults();
        assert!(registry.snapshot().len() >= DEFAULT_ALIASES.len());
    }

    #[test]
    fn test_abbreviation_targets_exist() {
        let registry = AliasRegistry::with_defaults();
        for (abbr, canonical) in ABBREVIATIONS {
            assert_eq!(
                registry.abbreviation(abbr).map(|r| r.canonical_name),
                Some(canonical.to_string()),
                "abbreviation '{}' should resolve",
                abbr
            );
        }
    }

    #[test]
    fn test_exact_resolution_is_case_insensitive() {
        let registry = AliasRegistry::with_defaults();
        assert_eq!(registry.resolve("Postgres").as_deref(), Some("PostgreSQL"));
        assert_eq!(registry.resolve("FASTAPI").as_deref(), Some("FastAPI"));
        assert_eq!(registry.resolve("amazon connect sdk").as_deref(), Some("Amazon Connect SDK"));
    }

    #[test]
    fn test_abbreviation_resolution() {
        let registry = AliasRegistry::with_defaults();
        assert_eq!(registry.resolve("js").as_deref(), Some("JavaScript"));
        assert_eq!(registry.resolve("k8s").as_deref(), Some("Kubernetes"));
    }

    #[test]
    fn test_partial_resolution_respects_length_ratio() {
        let registry = AliasRegistry::with_defaults();
        let hit = registry.partial("postgresql db").unwrap();
        assert_eq!(hit.canonical_name, "PostgreSQL");
        assert_eq!(hit.method, ResolutionMethod::Partial);

        // "redis" inside a long phrase is too small a share of it
        assert!(registry.partial("a very long redis-flavoured description").is_none());
        assert!(registry.partial("db").is_none());
    }

    #[test]
    fn test_unknown_name_does_not_resolve() {
        let registry = AliasRegistry::with_defaults();
        assert!(registry.resolve("quantum flux capacitor").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_metadata_lookup() {
        let registry = AliasRegistry::with_defaults();
        assert_eq!(registry.ecosystem_of("AWS Comprehend"), Some(Ecosystem::Aws));
        assert_eq!(registry.ecosystem_of("Redis"), Some(Ecosystem::OpenSource));
        assert_eq!(registry.ecosystem_of("Amazon Kinesis"), Some(Ecosystem::Aws));
        assert_eq!(registry.category_of("Redis"), Some(TechCategory::Cache));
        assert!(registry.is_canonical("PostgreSQL"));
        assert!(!registry.is_canonical("postgres"));
    }

    #[test]
    fn test_reload_rejects_malformed_table_and_keeps_old_one() {
        let registry = AliasRegistry::with_defaults();
        let err = registry
            .reload(vec![alias("pg", "PostgreSQL", 1.0), alias("", "MySQL", 0.9)])
            .unwrap_err();
        assert!(matches!(err, EngineError::AliasTable(_)));
        assert_eq!(registry.resolve("redis").as_deref(), Some("Redis"));
    }

    #[test]
    fn test_reload_swaps_table() {
        let registry = AliasRegistry::with_defaults();
        registry
            .reload(vec![alias("timescale", "TimescaleDB", 0.9)])
            .unwrap();
        assert_eq!(registry.resolve("timescale").as_deref(), Some("TimescaleDB"));
        assert!(registry.exact("redis").is_none());
    }

    #[test]
    fn test_lenient_load_skips_bad_entries() {
        let registry = AliasRegistry::lenient(vec![
            alias("mysql", "MySQL", 0.95),
            alias("broken", "Broken", 1.5),
        ]);
        assert_eq!(registry.resolve("mysql").as_deref(), Some("MySQL"));
        assert!(registry.exact("broken").is_none());
    }

    #[test]
    fn test_entries_sorted_longest_first() {
        let table = AliasRegistry::with_defaults().snapshot();
        let lengths: Vec<usize> = table.entries().iter().map(|e| e.alias.len()).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
    }
}
