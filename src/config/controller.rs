//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Re-check delay while a referenced GameDefinition is not ready (seconds)
    pub template_not_ready_requeue_secs: u64,
    /// Re-check delay while a SteamServer is not yet running (seconds)
    pub not_running_requeue_secs: u64,
    /// Per-resource Fibonacci error backoff floor (seconds)
    pub error_backoff_min_secs: u64,
    /// Per-resource Fibonacci error backoff ceiling (seconds)
    pub error_backoff_max_secs: u64,
    /// Exponential backoff starting value (milliseconds)
    /// Initial delay before restarting a watch after the API server throttles us
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Maximum concurrent reconciliations per controller
    pub max_concurrent_reconciliations: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            template_not_ready_requeue_secs: DEFAULT_TEMPLATE_NOT_READY_REQUEUE_SECS,
            not_running_requeue_secs: DEFAULT_NOT_RUNNING_REQUEUE_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            template_not_ready_requeue_secs: env_var_or_default(
                "TEMPLATE_NOT_READY_REQUEUE_SECS",
                DEFAULT_TEMPLATE_NOT_READY_REQUEUE_SECS,
            ),
            not_running_requeue_secs: env_var_or_default(
                "NOT_RUNNING_REQUEUE_SECS",
                DEFAULT_NOT_RUNNING_REQUEUE_SECS,
            ),
            error_backoff_min_secs: env_var_or_default(
                "ERROR_BACKOFF_MIN_SECS",
                DEFAULT_ERROR_BACKOFF_MIN_SECS,
            ),
            error_backoff_max_secs: env_var_or_default(
                "ERROR_BACKOFF_MAX_SECS",
                DEFAULT_ERROR_BACKOFF_MAX_SECS,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
        }
    }

    /// Get the template-not-ready requeue duration
    #[must_use]
    pub fn template_not_ready_requeue(&self) -> Duration {
        Duration::from_secs(self.template_not_ready_requeue_secs)
    }

    /// Get the not-yet-running requeue duration
    #[must_use]
    pub fn not_running_requeue(&self) -> Duration {
        Duration::from_secs(self.not_running_requeue_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

/// HTTP server configuration for metrics and probes
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long to wait for the server to bind before giving up (seconds)
    pub startup_timeout_secs: u64,
    /// Readiness poll interval during startup (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
        }
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.template_not_ready_requeue(), Duration::from_secs(30));
        assert_eq!(config.not_running_requeue(), Duration::from_secs(10));
        assert!(config.error_backoff_min_secs < config.error_backoff_max_secs);

        let server = ServerConfig::default();
        assert_eq!(server.metrics_port, 5000);
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        // Unset and unparsable values both yield the default
        assert_eq!(env_var_or_default("BOILERR_TEST_UNSET_VARIABLE", 7u64), 7);
        std::env::set_var("BOILERR_TEST_GARBAGE_VARIABLE", "not-a-number");
        assert_eq!(env_var_or_default("BOILERR_TEST_GARBAGE_VARIABLE", 9u64), 9);
        std::env::set_var("BOILERR_TEST_NUMERIC_VARIABLE", "42");
        assert_eq!(env_var_or_default("BOILERR_TEST_NUMERIC_VARIABLE", 9u64), 42);
    }
}
