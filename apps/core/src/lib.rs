//! # TechContext Core
//!
//! Resolves which technologies an automation requirement is really asking
//! for: explicit mentions, aliases, contextual inference, ecosystem
//! preference, ambiguity flags and learned user preferences.
//!
//! ```no_run
//! use std::sync::Arc;
//! use techcontext_core::{ContextEngine, EngineConfig, InMemoryPreferenceStore};
//!
//! let engine = ContextEngine::new(EngineConfig::default(), Arc::new(InMemoryPreferenceStore::new()))?;
//! let report = engine.resolve_text("Use FastAPI with PostgreSQL on AWS");
//! println!("{}", report.summary());
//! # Ok::<(), techcontext_core::EngineError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod resolution;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogSnapshot, TechnologyCatalog};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use resolution::{
    AmbiguityDetection, AmbiguityType, BannedMatchMode, ContextEngine, ContextReport, ContextWeight,
    Ecosystem, ImpactLevel, InMemoryPreferenceStore, ParsedRequirements, PreferenceStore,
    TechContext,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
