//! Technology catalog seam.
//!
//! The catalog/validator lives outside this crate. The engine only asks it
//! whether a technology is known, so it can hand unknown names to the
//! caller's auto-registration step. Lookups never write.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::resolution::aliases::AliasRegistry;
use crate::resolution::types::Ecosystem;

/// Read-only view of a technology catalog.
///
/// Implementations may be backed by a database or a remote service; the
/// engine treats every call as a pure lookup.
#[async_trait]
pub trait TechnologyCatalog: Send + Sync + 'static {
    /// Whether `name` is a known technology (case-insensitive).
    async fn exists(&self, name: &str) -> bool;

    /// Ecosystem recorded for `name`, if any.
    async fn ecosystem(&self, name: &str) -> Option<Ecosystem>;
}

/// In-memory catalog built from a fixed list of names.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    entries: HashMap<String, Option<Ecosystem>>,
}

impl CatalogSnapshot {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = names
            .into_iter()
            .map(|n| {
                let name = n.as_ref().trim();
                (name.to_lowercase(), Ecosystem::infer_from_name(name))
            })
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self { entries }
    }

    /// Seed from every canonical name the registry knows.
    pub fn from_registry(registry: &AliasRegistry) -> Self {
        let entries = registry
            .canonical_names()
            .into_iter()
            .map(|name| {
                let ecosystem = registry.ecosystem_of(&name);
                (name.to_lowercase(), ecosystem)
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TechnologyCatalog for CatalogSnapshot {
    async fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(&name.trim().to_lowercase())
    }

    async fn ecosystem(&self, name: &str) -> Option<Ecosystem> {
        self.entries.get(&name.trim().to_lowercase()).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_lookup_is_case_insensitive() {
        let catalog = CatalogSnapshot::new(["PostgreSQL", "AWS Lambda", "  "]);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.exists("postgresql").await);
        assert!(!catalog.exists("MySQL").await);
        assert_eq!(catalog.ecosystem("aws lambda").await, Some(Ecosystem::Aws));
        assert_eq!(catalog.ecosystem("PostgreSQL").await, None);
    }

    #[tokio::test]
    async fn test_registry_seeded_snapshot() {
        let registry = AliasRegistry::with_defaults();
        let catalog = CatalogSnapshot::from_registry(&registry);

        assert!(catalog.exists("Amazon Connect SDK").await);
        assert!(catalog.exists("fastapi").await);
        assert_eq!(catalog.ecosystem("Azure Functions").await, Some(Ecosystem::Azure));
        assert_eq!(catalog.ecosystem("Redis").await, Some(Ecosystem::OpenSource));
    }
}
