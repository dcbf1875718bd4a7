//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::config::{
    env_var_opt, env_var_or_default, env_var_or_default_str, GeneratorConfig,
};
use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_WATCH_BACKOFF_MAX_MS,
    DEFAULT_WATCH_BACKOFF_START_MS, DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
    DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Generation policy (default length, encoding, key size, insecure regeneration)
    pub generator: GeneratorConfig,
    /// Restrict the watch to a single namespace (all namespaces when unset)
    pub watch_namespace: Option<String>,
    /// Reconciliation error backoff minimum (seconds)
    pub backoff_min_secs: u64,
    /// Reconciliation error backoff maximum (seconds)
    pub backoff_max_secs: u64,
    /// Watch stream backoff starting value (milliseconds)
    pub watch_backoff_start_ms: u64,
    /// Watch stream backoff maximum value (milliseconds)
    pub watch_backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE), used when RUST_LOG is unset
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            watch_namespace: None,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_backoff_start_ms: DEFAULT_WATCH_BACKOFF_START_MS,
            watch_backoff_max_ms: DEFAULT_WATCH_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            generator: GeneratorConfig::from_env(),
            watch_namespace: env_var_opt("WATCH_NAMESPACE"),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_backoff_start_ms: env_var_or_default(
                "WATCH_BACKOFF_START_MS",
                DEFAULT_WATCH_BACKOFF_START_MS,
            ),
            watch_backoff_max_ms: env_var_or_default(
                "WATCH_BACKOFF_MAX_MS",
                DEFAULT_WATCH_BACKOFF_MAX_MS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_bounds_are_ordered() {
        let config = ControllerConfig::default();
        assert!(config.backoff_min_secs <= config.backoff_max_secs);
        assert!(config.watch_backoff_start_ms <= config.watch_backoff_max_ms);
    }

    #[test]
    fn test_default_watches_all_namespaces() {
        assert!(ControllerConfig::default().watch_namespace.is_none());
    }
}
