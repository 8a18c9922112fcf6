//! # Resolution Module
//!
//! Technology context resolution for automation requirements.
//! Turns a free-form requirement payload into weighted, explainable
//! technology recommendations.
//!
//! ## Components
//! - `aliases`: alias table, abbreviations and the reloadable registry
//! - `resolver`: exact and fuzzy name resolution behind one trait
//! - `extractor`: explicit technology extraction from text
//! - `clues`: context clue classification
//! - `constraints`: payload flattening and constraint extraction
//! - `parser`: requirement parsing orchestrator
//! - `builder`: technology context and ecosystem inference
//! - `prioritizer`: explainable weights and banned-tool removal
//! - `ambiguity`: ambiguity detection and conflict annotation
//! - `preferences`: learned per-domain preferences
//! - `engine`: the facade running the whole pipeline

pub mod aliases;
pub mod ambiguity;
pub mod builder;
pub mod clues;
pub mod constraints;
pub mod engine;
pub mod extractor;
pub mod parser;
pub mod preferences;
pub mod prioritizer;
pub mod resolver;
pub mod types;

pub use aliases::{AliasRegistry, Resolution, ResolutionMethod, TechnologyAlias};
pub use ambiguity::AmbiguityDetector;
pub use builder::ContextBuilder;
pub use clues::ContextClueIdentifier;
pub use engine::{ContextEngine, ContextReport};
pub use extractor::TechnologyExtractor;
pub use parser::RequirementParser;
pub use preferences::{InMemoryPreferenceStore, PreferenceLearner, PreferenceStore};
pub use prioritizer::ContextPrioritizer;
pub use resolver::{ExactResolver, FuzzyResolver, Resolver};
pub use types::*;
