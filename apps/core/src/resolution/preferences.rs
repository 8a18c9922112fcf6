//! Preference Learner
//!
//! Learns per-domain acceptance of technologies from selection/rejection
//! feedback. The store is the only shared mutable state in the engine and is
//! injected behind the `PreferenceStore` trait.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::types::UserPreference;

/// Interactions after which the learned signal is fully trusted.
const SATURATION_INTERACTIONS: f32 = 10.0;
/// Context patterns remembered per entry.
const MAX_CONTEXT_PATTERNS: usize = 20;

/// `(selection_ratio - 0.5) * 2 * min(total / 10, 1)`, in `[-1, 1]`.
pub fn preference_score(selections: u32, rejections: u32) -> f32 {
    let total = selections + rejections;
    if total == 0 {
        return 0.0;
    }
    let ratio = selections as f32 / total as f32;
    let confidence = (total as f32 / SATURATION_INTERACTIONS).min(1.0);
    ((ratio - 0.5) * 2.0 * confidence).clamp(-1.0, 1.0)
}

/// Storage for learned preferences. Implementations must tolerate
/// concurrent reads and writes.
pub trait PreferenceStore: Send + Sync {
    /// Learned score, 0.0 when nothing is known.
    fn get(&self, domain: &str, technology: &str) -> f32;

    fn update(&self, selected: &[String], rejected: &[String], domain: &str, context_patterns: &[String]);

    fn preference(&self, domain: &str, technology: &str) -> Option<UserPreference>;
}

fn key(domain: &str, technology: &str) -> String {
    format!("{}:{}", domain.trim().to_lowercase(), technology.trim().to_lowercase())
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    entries: Mutex<HashMap<String, UserPreference>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously exported entries.
    pub fn from_snapshot(entries: Vec<UserPreference>) -> Self {
        let map = entries
            .into_iter()
            .map(|p| (key(&p.domain, &p.technology), p))
            .collect();
        Self {
            entries: Mutex::new(map),
        }
    }

    /// All entries, sorted by domain then technology.
    pub fn snapshot(&self) -> Vec<UserPreference> {
        let mut all: Vec<UserPreference> = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| (&a.domain, &a.technology).cmp(&(&b.domain, &b.technology)));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get(&self, domain: &str, technology: &str) -> f32 {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key(domain, technology))
            .map(|p| p.preference_score)
            .unwrap_or(0.0)
    }

    fn update(&self, selected: &[String], rejected: &[String], domain: &str, context_patterns: &[String]) {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let feedback = selected
            .iter()
            .map(|t| (t, true))
            .chain(rejected.iter().map(|t| (t, false)));

        for (technology, accepted) in feedback {
            if technology.trim().is_empty() {
                continue;
            }
            let entry = entries
                .entry(key(domain, technology))
                .or_insert_with(|| UserPreference {
                    technology: technology.trim().to_string(),
                    domain: domain.trim().to_string(),
                    selection_count: 0,
                    rejection_count: 0,
                    preference_score: 0.0,
                    last_updated: now,
                    context_patterns: Vec::new(),
                });

            if accepted {
                entry.selection_count = entry.selection_count.saturating_add(1);
            } else {
                entry.rejection_count = entry.rejection_count.saturating_add(1);
            }
            entry.preference_score = preference_score(entry.selection_count, entry.rejection_count);
            entry.last_updated = now;

            for pattern in context_patterns {
                if entry.context_patterns.len() >= MAX_CONTEXT_PATTERNS {
                    break;
                }
                if !entry.context_patterns.contains(pattern) {
                    entry.context_patterns.push(pattern.clone());
                }
            }
        }
    }

    fn preference(&self, domain: &str, technology: &str) -> Option<UserPreference> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key(domain, technology))
            .cloned()
    }
}

/// Feeds session feedback into a shared store.
#[derive(Clone)]
pub struct PreferenceLearner {
    store: Arc<dyn PreferenceStore>,
}

impl PreferenceLearner {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn learn(&self, selected: &[String], rejected: &[String], domain: &str, context_patterns: &[String]) {
        debug!(
            domain = %domain,
            selected = selected.len(),
            rejected = rejected.len(),
            "Learning preferences"
        );
        self.store.update(selected, rejected, domain, context_patterns);
    }

    pub fn get(&self, domain: &str, technology: &str) -> f32 {
        self.store.get(domain, technology)
    }

    pub fn store(&self) -> Arc<dyn PreferenceStore> {
        self.store.clone()
    }
}
