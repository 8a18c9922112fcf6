//! Name resolution strategies.
//!
//! The engine picks one resolver at construction: exact-only
//! (exact → abbreviation → partial) or fuzzy-augmented
//! (exact → abbreviation → fuzzy → partial). Both are interchangeable
//! behind the `Resolver` trait.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::trace;

use super::aliases::{AliasRegistry, Resolution, ResolutionMethod};
use super::types::Ecosystem;

/// Maps a free-form technology name to a canonical one.
pub trait Resolver: Send + Sync {
    /// Resolve `name`; `context` is surrounding text used to break ties.
    fn resolve(&self, name: &str, context: &str) -> Option<Resolution>;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;
}

/// Exact, abbreviation, then partial matching.
pub struct ExactResolver {
    registry: Arc<AliasRegistry>,
}

impl ExactResolver {
    pub fn new(registry: Arc<AliasRegistry>) -> Self {
        Self { registry }
    }
}

impl Resolver for ExactResolver {
    fn resolve(&self, name: &str, _context: &str) -> Option<Resolution> {
        self.registry
            .exact(name)
            .or_else(|| self.registry.abbreviation(name))
            .or_else(|| self.registry.partial(name))
    }

    fn name(&self) -> &'static str {
        "exact"
    }
}

/// Alias close enough to a name to be considered, before context boosts.
#[derive(Debug, Clone)]
struct Candidate {
    similarity: f32,
    canonical_name: String,
    ecosystem: Ecosystem,
    context_keywords: Vec<String>,
}

/// Adds an edit-distance step between abbreviation and partial matching.
///
/// Only the raw similarity ranking is cached, keyed by name. Context boosts
/// are applied per call, so a lookup never depends on earlier requests.
pub struct FuzzyResolver {
    registry: Arc<AliasRegistry>,
    threshold: f32,
    context_boost: f32,
    cache: Mutex<LruCache<String, Arc<Vec<Candidate>>>>,
}

impl FuzzyResolver {
    /// Raw similarity a candidate needs before context may lift it.
    const SIMILARITY_SLACK: f32 = 0.1;

    pub fn new(
        registry: Arc<AliasRegistry>,
        threshold: f32,
        context_boost: f32,
        cache_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            registry,
            threshold,
            context_boost,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Aliases within the similarity floor of `key`, memoised per name.
    fn candidates(&self, key: &str) -> Arc<Vec<Candidate>> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(key) {
                return hit.clone();
            }
        }

        let floor = self.threshold - Self::SIMILARITY_SLACK;
        let table = self.registry.snapshot();
        let candidates: Vec<Candidate> = table
            .entries()
            .iter()
            .filter_map(|entry| {
                let similarity = strsim::normalized_levenshtein(key, &entry.alias) as f32;
                (similarity > 0.0 && similarity >= floor).then(|| Candidate {
                    similarity,
                    canonical_name: entry.canonical_name.clone(),
                    ecosystem: entry.ecosystem,
                    context_keywords: entry.context_keywords.clone(),
                })
            })
            .collect();

        let candidates = Arc::new(candidates);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(key.to_string(), candidates.clone());
        candidates
    }

    /// Best fuzzy candidate for `name`, including context boosts.
    fn fuzzy(&self, name: &str, context: &str) -> Option<Resolution> {
        let key = name.trim().to_lowercase();
        if key.len() < 3 {
            return None;
        }
        let context = context.to_lowercase();
        let mentioned: Vec<Ecosystem> = Ecosystem::CLOUDS
            .iter()
            .copied()
            .filter(|eco| eco.keywords().iter().any(|k| context.contains(k)))
            .collect();

        let candidates = self.candidates(&key);
        let mut best: Option<(f32, &str)> = None;

        for candidate in candidates.iter() {
            let mut score = candidate.similarity;
            if mentioned.contains(&candidate.ecosystem) {
                score += self.context_boost;
            }
            let keyword_hits = candidate
                .context_keywords
                .iter()
                .filter(|k| context.contains(k.as_str()))
                .count();
            score += self.context_boost * keyword_hits.min(2) as f32;

            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, candidate.canonical_name.as_str()));
            }
        }

        let result = best
            .filter(|(score, _)| *score >= self.threshold)
            .map(|(score, canonical_name)| Resolution {
                canonical_name: canonical_name.to_string(),
                confidence: score.min(1.0),
                method: ResolutionMethod::Fuzzy,
            });

        trace!(name = %key, hit = ?result.as_ref().map(|r| &r.canonical_name), "fuzzy lookup");
        result
    }

    /// Number of names with a cached similarity ranking.
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drops cached lookups, e.g. after an alias reload.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Resolver for FuzzyResolver {
    fn resolve(&self, name: &str, context: &str) -> Option<Resolution> {
        self.registry
            .exact(name)
            .or_else(|| self.registry.abbreviation(name))
            .or_else(|| self.fuzzy(name, context))
            .or_else(|| self.registry.partial(name))
    }

    fn name(&self) -> &'static str {
        "fuzzy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<AliasRegistry> {
        Arc::new(AliasRegistry::with_defaults())
    }

    #[test]
    fn test_exact_resolver_chain() {
        let resolver = ExactResolver::new(registry());

        let exact = resolver.resolve("PostgreSQL", "").unwrap();
        assert_eq!(exact.method, ResolutionMethod::Exact);
        assert_eq!(exact.confidence, 1.0);

        let abbr = resolver.resolve("pg", "").unwrap();
        assert_eq!(abbr.canonical_name, "PostgreSQL");
        assert_eq!(abbr.method, ResolutionMethod::Abbreviation);

        assert!(resolver.resolve("postgrse", "").is_none());
    }

    #[test]
    fn test_fuzzy_resolver_handles_typos() {
        let resolver = FuzzyResolver::new(registry(), 0.75, 0.1, 16);
        let hit = resolver.resolve("postgrees", "").unwrap();
        assert_eq!(hit.canonical_name, "PostgreSQL");
        assert_eq!(hit.method, ResolutionMethod::Fuzzy);
        assert!(hit.confidence >= 0.75 && hit.confidence <= 1.0);
    }

    #[test]
    fn test_fuzzy_resolver_rejects_distant_names() {
        let resolver = FuzzyResolver::new(registry(), 0.75, 0.1, 16);
        assert!(resolver.resolve("spreadsheet", "").is_none());
    }

    #[test]
    fn test_context_boost_lifts_ecosystem_candidates() {
        let resolver = FuzzyResolver::new(registry(), 0.75, 0.1, 16);
        let plain = resolver.fuzzy("comprehnd", "").map(|r| r.confidence);
        let boosted = resolver
            .fuzzy("comprehnd", "sentiment scoring on aws")
            .map(|r| r.confidence);
        assert!(boosted.unwrap_or(0.0) >= plain.unwrap_or(0.0));
        assert_eq!(
            resolver
                .fuzzy("comprehnd", "sentiment scoring on aws")
                .map(|r| r.canonical_name)
                .as_deref(),
            Some("AWS Comprehend")
        );
    }

    #[test]
    fn test_lookup_does_not_depend_on_earlier_calls() {
        let fresh = FuzzyResolver::new(registry(), 0.75, 0.1, 16);
        let expected = fresh.resolve("comprehnd", "sentiment nlp");

        let warmed = FuzzyResolver::new(registry(), 0.75, 0.1, 16);
        warmed.resolve("comprehnd", "");
        assert_eq!(warmed.resolve("comprehnd", "sentiment nlp"), expected);
        assert_eq!(
            warmed.resolve("comprehnd", "").map(|r| r.confidence),
            fresh.resolve("comprehnd", "").map(|r| r.confidence)
        );
    }

    #[test]
    fn test_context_cannot_lift_distant_names() {
        let resolver = FuzzyResolver::new(registry(), 0.75, 0.1, 16);
        let context = "use amazon polly for voice prompts on aws with an amazon bot";
        let hit = resolver.resolve("amazon polly", context);
        assert!(
            hit.as_ref().map_or(true, |r| r.canonical_name != "Amazon Lex"),
            "{:?}",
            hit
        );
        let hit = resolver.resolve("amazon kendra", "search documents on aws");
        assert!(
            hit.as_ref().map_or(true, |r| r.canonical_name != "Amazon Textract"),
            "{:?}",
            hit
        );
    }

    #[test]
    fn test_fuzzy_results_are_cached() {
        let resolver = FuzzyResolver::new(registry(), 0.75, 0.1, 2);
        resolver.resolve("kubernets", "");
        resolver.resolve("kubernets", "");
        assert_eq!(resolver.cached_entries(), 1);

        resolver.resolve("dockr", "");
        resolver.resolve("terrafrom", "");
        assert_eq!(resolver.cached_entries(), 2);

        resolver.clear_cache();
        assert_eq!(resolver.cached_entries(), 0);
    }
}
