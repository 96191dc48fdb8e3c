//! Environment-driven analyzer configuration.
//!
//! Mirrors the small, env-first configuration style used throughout the
//! catalog/query-planner stack this crate is modeled on: no config file
//! format, just validated environment variables with typed parse errors.

use std::env;
use thiserror::Error;

const MAX_ITERS_VAR: &str = "PLANALYZER_MAX_ITERS";
const DEFAULT_MAX_ITERS: usize = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Analyzer-wide tunables read once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Hard upper bound on rule-pipeline passes before `ErrMaxAnalysisIters`.
    pub max_iterations: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            max_iterations: DEFAULT_MAX_ITERS,
        }
    }
}

impl AnalyzerConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset. Fails if a set variable doesn't parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AnalyzerConfig::default();

        if let Ok(raw) = env::var(MAX_ITERS_VAR) {
            let parsed: usize =
                raw.parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: MAX_ITERS_VAR,
                        value: raw,
                    })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    var: MAX_ITERS_VAR,
                    value: "0".to_string(),
                });
            }
            config.max_iterations = parsed;
        }

        Ok(config)
    }
}
