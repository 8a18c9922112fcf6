//! Test Module
//!
//! Cross-module suites for the resolution engine.
//!
//! ## Test Categories
//! - `scenario_tests`: end-to-end requirement scenarios and output invariants
//! - `preference_tests`: preference learning through the engine
//! - `engine_tests`: async offload, batching, configuration and concurrency

pub mod engine_tests;
pub mod scenario_tests;
