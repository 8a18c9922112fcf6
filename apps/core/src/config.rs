//! Engine configuration.
//!
//! Every tunable threshold of the resolution pipeline lives here. Values are
//! loaded from the environment (optionally seeded by a `.env` file) and fall
//! back to defaults tuned for English requirement text.
//!
//! # Environment Variables
//!
//! - `TECHCTX_FUZZY_MATCHING`: enable fuzzy alias resolution (true|false) - default: "true"
//! - `TECHCTX_FUZZY_THRESHOLD`: minimum normalized similarity - default: "0.75"
//! - `TECHCTX_CONTEXT_WINDOW`: characters inspected around a mention - default: "100"
//! - `TECHCTX_CONTEXT_BOOST`: fuzzy score boost per nearby keyword - default: "0.10"
//! - `TECHCTX_MAX_PAYLOAD_DEPTH`: nesting depth read from payloads - default: "8"
//! - `TECHCTX_MAX_WORKERS`: concurrent offloaded resolutions - default: "4"
//! - `TECHCTX_CACHE_CAPACITY`: fuzzy resolution cache entries - default: "512"
//! - `TECHCTX_BANNED_MATCH`: banned tool matching (substring|token) - default: "substring"
//! - `TECHCTX_LOG_LEVEL`: logging level - default: "info"
//! - `TECHCTX_JSON_LOGS`: emit Bunyan JSON logs (true|false) - default: "false"

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use validator::Validate;

use crate::error::{EngineError, Result};
use crate::resolution::types::BannedMatchMode;

const DEFAULT_FUZZY_THRESHOLD: f32 = 0.75;
const DEFAULT_CONTEXT_WINDOW: usize = 100;
const DEFAULT_CONTEXT_BOOST: f32 = 0.10;
const DEFAULT_MAX_PAYLOAD_DEPTH: usize = 8;
const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_CACHE_CAPACITY: usize = 512;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Tunables for the technology context resolution engine.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Use the fuzzy-augmented resolver instead of exact/abbreviation/partial only.
    pub fuzzy_matching: bool,
    /// Minimum normalized similarity for a fuzzy alias match.
    #[validate(range(min = 0.5, max = 1.0))]
    pub fuzzy_threshold: f32,
    /// Characters inspected on each side of a mention for context keywords.
    #[validate(range(min = 10, max = 1000))]
    pub context_window: usize,
    /// Score boost per ecosystem/domain keyword found near a fuzzy candidate.
    #[validate(range(min = 0.0, max = 0.5))]
    pub context_boost: f32,
    /// Deepest payload nesting level that is read; deeper values are truncated.
    #[validate(range(min = 1, max = 64))]
    pub max_payload_depth: usize,
    /// Upper bound on concurrently offloaded pipeline runs.
    #[validate(range(min = 1, max = 64))]
    pub max_workers: usize,
    /// Capacity of the fuzzy resolution cache.
    #[validate(range(min = 1, max = 100000))]
    pub cache_capacity: usize,
    /// How banned tool names are matched against candidate technologies.
    pub banned_match_mode: BannedMatchMode,
    /// Logging level (trace, debug, info, warn, error).
    #[validate(length(min = 1))]
    pub log_level: String,
    /// Emit Bunyan-formatted JSON logs instead of pretty console output.
    pub json_logs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_matching: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            context_window: DEFAULT_CONTEXT_WINDOW,
            context_boost: DEFAULT_CONTEXT_BOOST,
            max_payload_depth: DEFAULT_MAX_PAYLOAD_DEPTH,
            max_workers: DEFAULT_MAX_WORKERS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            banned_match_mode: BannedMatchMode::Substring,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl EngineConfig {
    /// Loads `.env` (if present) and then reads `TECHCTX_*` variables.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is the normal case.
        dotenv::dotenv().ok();
        Self::from_current_env()
    }

    /// Loads the given env file into the process environment, then reads it.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenv::from_path(path.as_ref())?;
        Self::from_current_env()
    }

    fn from_current_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            fuzzy_matching: read_var("TECHCTX_FUZZY_MATCHING", defaults.fuzzy_matching)?,
            fuzzy_threshold: read_var("TECHCTX_FUZZY_THRESHOLD", defaults.fuzzy_threshold)?,
            context_window: read_var("TECHCTX_CONTEXT_WINDOW", defaults.context_window)?,
            context_boost: read_var("TECHCTX_CONTEXT_BOOST", defaults.context_boost)?,
            max_payload_depth: read_var("TECHCTX_MAX_PAYLOAD_DEPTH", defaults.max_payload_depth)?,
            max_workers: read_var("TECHCTX_MAX_WORKERS", defaults.max_workers)?,
            cache_capacity: read_var("TECHCTX_CACHE_CAPACITY", defaults.cache_capacity)?,
            banned_match_mode: read_var("TECHCTX_BANNED_MATCH", defaults.banned_match_mode)?,
            log_level: env::var("TECHCTX_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: read_var("TECHCTX_JSON_LOGS", defaults.json_logs)?,
        };

        config.validate()?;
        Ok(config)
    }
}

fn read_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|e| {
                EngineError::Config(format!("Failed to parse {}='{}': {}", key, raw, e))
            })
        }
        _ => Ok(default),
    }
}
