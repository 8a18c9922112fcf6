//! Context Engine - the facade over the resolution pipeline.
//!
//! Owns every pipeline stage, built once at construction. A request runs
//! parse, build, prioritize, detect and resolve in sequence and yields a
//! `ContextReport`. The pipeline is CPU-bound and synchronous; async callers
//! go through `resolve_async`, which offloads to the blocking pool behind a
//! semaphore so concurrency stays bounded.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, info_span, warn};
use uuid::Uuid;
use validator::Validate;

use super::aliases::{AliasRegistry, TechnologyAlias};
use super::ambiguity::AmbiguityDetector;
use super::builder::ContextBuilder;
use super::parser::RequirementParser;
use super::preferences::{InMemoryPreferenceStore, PreferenceLearner, PreferenceStore};
use super::prioritizer::{rank, ContextPrioritizer};
use super::resolver::{ExactResolver, FuzzyResolver, Resolver};
use super::types::{
    AmbiguityDetection, ConflictDecision, ContextWeight, ImpactLevel, ParsedRequirements,
    TechContext,
};
use crate::catalog::{CatalogSnapshot, TechnologyCatalog};
use crate::config::EngineConfig;
use crate::error::Result;

/// Everything the engine derived for one requirement payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReport {
    pub request_id: Uuid,
    pub parsed: ParsedRequirements,
    pub tech_context: TechContext,
    /// Final weights, banned technologies already removed
    pub weights: BTreeMap<String, ContextWeight>,
    /// Technology names, heaviest first
    pub ranked: Vec<String>,
    pub ambiguities: Vec<AmbiguityDetection>,
    /// Annotations from conflict resolution
    pub resolutions: BTreeMap<String, ConflictDecision>,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ContextReport {
    /// The `n` heaviest weights.
    pub fn top(&self, n: usize) -> Vec<&ContextWeight> {
        self.ranked
            .iter()
            .take(n)
            .filter_map(|tech| self.weights.get(tech))
            .collect()
    }

    pub fn high_impact_ambiguities(&self) -> impl Iterator<Item = &AmbiguityDetection> {
        self.ambiguities
            .iter()
            .filter(|a| a.impact_level == ImpactLevel::High)
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "Technologies: {}, Top: {}, Ecosystem: {}, Ambiguities: {}, Confidence: {:.0}%",
            self.weights.len(),
            self.ranked.first().map(String::as_str).unwrap_or("none"),
            self.tech_context
                .ecosystem_preference
                .map(|e| e.label())
                .unwrap_or("none"),
            self.ambiguities.len(),
            self.parsed.confidence_score * 100.0
        )
    }
}

/// The pipeline stages, shared with blocking workers.
struct Pipeline {
    parser: RequirementParser,
    builder: ContextBuilder,
    prioritizer: ContextPrioritizer,
    detector: AmbiguityDetector,
}

impl Pipeline {
    fn run(&self, payload: &Value) -> ContextReport {
        let request_id = Uuid::new_v4();
        let span = info_span!("resolve_context", %request_id);
        let _guard = span.enter();
        let start = Instant::now();

        // 1. Parse requirements
        let parsed = self.parser.parse(payload);

        // 2. Build technology context
        let tech_context = self.builder.build(&parsed);

        // 3. Prioritize (banned removal is the last step inside)
        let weights = self.prioritizer.prioritize(&parsed, &tech_context);

        // 4. Detect ambiguities
        let ambiguities = self.detector.detect(&parsed);

        // 5. Annotate technology conflicts
        let resolutions = self.detector.resolve(&ambiguities, &tech_context);

        let ranked = rank(&weights);
        let processing_time_ms = start.elapsed().as_millis() as u64;

        let report = ContextReport {
            request_id,
            parsed,
            tech_context,
            weights,
            ranked,
            ambiguities,
            resolutions,
            processing_time_ms,
            timestamp: Utc::now(),
        };

        info!(
            technologies = report.weights.len(),
            ambiguities = report.ambiguities.len(),
            duration_ms = processing_time_ms,
            "Context resolved"
        );
        report
    }
}

/// Technology context resolution engine.
#[derive(Clone)]
pub struct ContextEngine {
    config: Arc<EngineConfig>,
    registry: Arc<AliasRegistry>,
    fuzzy: Option<Arc<FuzzyResolver>>,
    pipeline: Arc<Pipeline>,
    learner: PreferenceLearner,
    catalog: Arc<RwLock<Arc<dyn TechnologyCatalog>>>,
    /// Set once a caller injects its own catalog; reloads leave it alone
    custom_catalog: bool,
    workers: Arc<Semaphore>,
}

impl ContextEngine {
    /// Build an engine with the default alias table.
    pub fn new(config: EngineConfig, store: Arc<dyn PreferenceStore>) -> Result<Self> {
        Self::with_registry(config, store, Arc::new(AliasRegistry::with_defaults()))
    }

    /// Engine from `TECHCTX_*` environment variables with an in-memory store.
    pub fn from_env() -> Result<Self> {
        let config = EngineConfig::from_env()?;
        Self::new(config, Arc::new(InMemoryPreferenceStore::new()))
    }

    pub fn with_registry(
        config: EngineConfig,
        store: Arc<dyn PreferenceStore>,
        registry: Arc<AliasRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        // Resolver capability is chosen once, here
        let (resolver, fuzzy): (Arc<dyn Resolver>, Option<Arc<FuzzyResolver>>) =
            if config.fuzzy_matching {
                let fuzzy = Arc::new(FuzzyResolver::new(
                    registry.clone(),
                    config.fuzzy_threshold,
                    config.context_boost,
                    config.cache_capacity,
                ));
                let resolver: Arc<dyn Resolver> = fuzzy.clone();
                (resolver, Some(fuzzy))
            } else {
                warn!("Fuzzy matching disabled, falling back to exact resolution");
                let resolver: Arc<dyn Resolver> = Arc::new(ExactResolver::new(registry.clone()));
                (resolver, None)
            };

        let pipeline = Pipeline {
            parser: RequirementParser::new(registry.clone(), &config),
            builder: ContextBuilder::new(registry.clone(), resolver.clone(), config.banned_match_mode),
            prioritizer: ContextPrioritizer::new(registry.clone(), store.clone(), config.banned_match_mode),
            detector: AmbiguityDetector::new(registry.clone()),
        };

        info!(
            resolver = resolver.name(),
            aliases = registry.snapshot().len(),
            max_workers = config.max_workers,
            "Context engine ready"
        );

        Ok(Self {
            catalog: Arc::new(RwLock::new(Arc::new(CatalogSnapshot::from_registry(&registry)))),
            custom_catalog: false,
            workers: Arc::new(Semaphore::new(config.max_workers)),
            config: Arc::new(config),
            registry,
            fuzzy,
            pipeline: Arc::new(pipeline),
            learner: PreferenceLearner::new(store),
        })
    }

    /// Replace the catalog consulted by `unknown_technologies`.
    pub fn with_catalog(mut self, catalog: Arc<dyn TechnologyCatalog>) -> Self {
        self.catalog = Arc::new(RwLock::new(catalog));
        self.custom_catalog = true;
        self
    }

    fn catalog(&self) -> Arc<dyn TechnologyCatalog> {
        self.catalog.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Resolve a payload on the calling thread.
    pub fn resolve(&self, payload: &Value) -> ContextReport {
        self.pipeline.run(payload)
    }

    pub fn resolve_text(&self, text: &str) -> ContextReport {
        self.resolve(&json!({ "description": text }))
    }

    /// Resolve on the blocking pool, waiting for a free worker slot first.
    pub async fn resolve_async(&self, payload: Value) -> Result<ContextReport> {
        let permit = self.workers.clone().acquire_owned().await?;
        let pipeline = self.pipeline.clone();

        let report = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.run(&payload)
        })
        .await?;

        Ok(report)
    }

    /// `resolve_async` with a caller-chosen deadline. A timed-out run still
    /// finishes on its worker and releases the slot afterwards.
    pub async fn resolve_within(&self, payload: Value, limit: Duration) -> Result<ContextReport> {
        tokio::time::timeout(limit, self.resolve_async(payload)).await?
    }

    /// Resolve many payloads concurrently, still bounded by the worker pool.
    /// Results keep the input order.
    pub async fn resolve_batch(&self, payloads: Vec<Value>) -> Vec<Result<ContextReport>> {
        join_all(payloads.into_iter().map(|p| self.resolve_async(p))).await
    }

    /// Feed session feedback into the preference store.
    pub fn record_feedback(
        &self,
        selected: &[String],
        rejected: &[String],
        domain: &str,
        context_patterns: &[String],
    ) {
        self.learner.learn(selected, rejected, domain, context_patterns);
    }

    /// Weighted technologies the catalog does not know, in name order.
    pub async fn unknown_technologies(&self, weights: &BTreeMap<String, ContextWeight>) -> Vec<String> {
        let catalog = self.catalog();
        let mut unknown = Vec::new();
        for tech in weights.keys() {
            if !catalog.exists(tech).await {
                unknown.push(tech.clone());
            }
        }
        unknown
    }

    /// Swap the alias table. On error the current table stays in place.
    pub fn reload_aliases(&self, entries: Vec<TechnologyAlias>) -> Result<()> {
        self.registry.reload(entries)?;
        if let Some(fuzzy) = &self.fuzzy {
            fuzzy.clear_cache();
        }
        if !self.custom_catalog {
            let refreshed: Arc<dyn TechnologyCatalog> =
                Arc::new(CatalogSnapshot::from_registry(&self.registry));
            *self.catalog.write().unwrap_or_else(|e| e.into_inner()) = refreshed;
        }
        info!(aliases = self.registry.snapshot().len(), "Alias table reloaded");
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<AliasRegistry> {
        self.registry.clone()
    }

    pub fn preferences(&self) -> Arc<dyn PreferenceStore> {
        self.learner.store()
    }

    /// Worker slots not currently in use.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }
}
