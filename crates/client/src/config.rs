//! Client configuration.

use std::time::Duration;

/// Connection settings for the execution service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base endpoint URL; all request paths are resolved against it.
    pub endpoint: String,

    /// Request timeout for a single HTTP attempt.
    pub timeout: Duration,

    /// Delay between consecutive status checks.
    pub poll_interval: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// - `EXECFLOW_ENDPOINT`: base service URL (default: "http://localhost:8090")
    /// - `EXECFLOW_TIMEOUT_SECS`: per-request timeout in seconds (default: 30)
    /// - `EXECFLOW_POLL_INTERVAL_MS`: delay between status checks (default: 2000)
    pub fn from_env() -> Self {
        let endpoint = std::env::var("EXECFLOW_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:8090".to_string());

        let timeout_secs: u64 = std::env::var("EXECFLOW_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let poll_interval_ms: u64 = std::env::var("EXECFLOW_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000);

        Self {
            endpoint,
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8090".to_string(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(2000),
        }
    }
}

/// Field names and status vocabulary of a specific execution backend.
///
/// The check endpoint's response shape varies between backends (`output` vs
/// `result`, `cause` vs `error`); one tracker is configured with the
/// vocabulary instead of duplicating the state machine per backend.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Path of the trigger endpoint, relative to the base URL.
    pub trigger_path: String,

    /// Path of the status check endpoint, relative to the base URL.
    pub check_path: String,

    /// Delay between consecutive checks, measured from check completion.
    pub poll_interval: Duration,

    /// Status values that mark the execution as terminally successful.
    pub success_statuses: Vec<String>,

    /// Status values that mark the execution as terminally failed.
    pub failure_statuses: Vec<String>,

    /// Response fields holding the output payload, checked in order.
    pub output_fields: Vec<String>,

    /// Response fields holding the failure cause, checked in order.
    pub cause_fields: Vec<String>,
}

impl TrackerConfig {
    /// Tracker config with the given poll interval and default vocabulary.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            trigger_path: "trigger".to_string(),
            check_path: "check".to_string(),
            poll_interval: Duration::from_millis(2000),
            success_statuses: vec!["SUCCEEDED".to_string(), "SUCCESS".to_string()],
            failure_statuses: vec!["FAILED".to_string(), "FAILURE".to_string()],
            output_fields: vec!["output".to_string(), "result".to_string()],
            cause_fields: vec!["cause".to_string(), "error".to_string()],
        }
    }
}
