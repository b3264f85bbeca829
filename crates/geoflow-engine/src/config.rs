//! Configuration types for the execution engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default values for engine configuration
pub mod defaults {
    /// No delay between node starts
    pub const PACING_MS: u64 = 0;
    /// Undo snapshots kept per engine
    pub const HISTORY_DEPTH: usize = 50;
    /// Wall-clock budget of one script run
    pub const SCRIPT_TIMEOUT_MS: u64 = 5_000;
    /// Iterations any single script loop may take
    pub const LOOP_ITERATION_LIMIT: u64 = 1_000_000;
    /// Maximum script call depth
    pub const RECURSION_LIMIT: usize = 512;
}

/// Budgets for the custom script sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxConfig {
    pub timeout_ms: u64,
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::SCRIPT_TIMEOUT_MS,
            loop_iteration_limit: defaults::LOOP_ITERATION_LIMIT,
            recursion_limit: defaults::RECURSION_LIMIT,
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Delay between node starts in `run_all`, for progress visibility
    pub pacing_ms: u64,
    /// Timeout for URL-sourced inputs; none waits indefinitely
    pub http_timeout_ms: Option<u64>,
    /// Undo snapshots kept (0 disables undo)
    pub history_depth: usize,
    pub sandbox: SandboxConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pacing_ms: defaults::PACING_MS,
            http_timeout_ms: None,
            history_depth: defaults::HISTORY_DEPTH,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing_ms = u64::try_from(pacing.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn pacing(&self) -> Option<Duration> {
        (self.pacing_ms > 0).then(|| Duration::from_millis(self.pacing_ms))
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.pacing().is_none());
        assert!(config.http_timeout().is_none());
        assert_eq!(config.history_depth, 50);
        assert_eq!(config.sandbox.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"pacingMs": 250, "sandbox": {"timeoutMs": 100}}"#)
                .unwrap();
        assert_eq!(config.pacing(), Some(Duration::from_millis(250)));
        assert_eq!(config.sandbox.timeout_ms, 100);
        assert_eq!(config.sandbox.recursion_limit, defaults::RECURSION_LIMIT);
        assert_eq!(config.history_depth, defaults::HISTORY_DEPTH);
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::default()
            .with_http_timeout(Duration::from_secs(2))
            .with_history_depth(0);
        assert_eq!(config.http_timeout_ms, Some(2000));
        assert_eq!(config.history_depth, 0);
    }
}
