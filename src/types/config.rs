//! Configuration structures.
//!
//! Configuration is loaded from environment variables, following the same
//! `Default` + env-override idiom the rest of this crate's types use rather
//! than pulling in a generic config-file crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Default resource/time limits applied when a spell doesn't override them.
    #[serde(default)]
    pub defaults: DefaultLimits,

    /// State persistence configuration.
    #[serde(default)]
    pub state: StateConfig,
}

impl Config {
    /// Builds a [`Config`] from defaults overridden by environment
    /// variables (`GRIMOIRE_LOG_LEVEL`, `GRIMOIRE_LOG_FORMAT`,
    /// `GRIMOIRE_STATE_DIR`).
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Ok(level) = std::env::var("GRIMOIRE_LOG_LEVEL") {
            config.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("GRIMOIRE_LOG_FORMAT") {
            config.observability.json_logs = format.eq_ignore_ascii_case("json");
        }
        if let Ok(dir) = std::env::var("GRIMOIRE_STATE_DIR") {
            config.state.state_dir = Some(dir);
        }
        config
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Default resource/time limits, used unless a spell's own clauses override
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultLimits {
    /// Advisory step timeout when the spell source doesn't specify one.
    #[serde(with = "humantime_serde")]
    pub advisory_timeout: Duration,

    /// `for`/`until` loop iteration ceiling when the spell doesn't specify
    /// one, guarding against runaway loops.
    pub max_loop_iterations: u32,

    /// Base delay for `retry(n)` exponential backoff on action steps.
    #[serde(with = "humantime_serde")]
    pub retry_backoff_base: Duration,
}

impl Default for DefaultLimits {
    fn default() -> Self {
        Self {
            advisory_timeout: Duration::from_secs(30),
            max_loop_iterations: 1_000,
            retry_backoff_base: Duration::from_millis(200),
        }
    }
}

/// State persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory run records and the ledger are persisted under. `None`
    /// means persistence is disabled (in-memory only, e.g. under `simulate`).
    pub state_dir: Option<String>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { state_dir: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.defaults.max_loop_iterations, 1_000);
        assert!(config.state.state_dir.is_none());
    }
}
