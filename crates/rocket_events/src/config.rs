//! Event manager configuration.

use serde::{Deserialize, Serialize};

fn default_thread_name() -> String {
    "rocket-events".to_string()
}

fn default_skip_dead_owners() -> bool {
    true
}

/// Settings for an [`EventManager`](crate::EventManager).
///
/// Every field has a default, so a partial `[events]` table in a TOML file
/// is enough to override a single setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventManagerConfig {
    /// Worker threads of the owned background runtime. Only used when the
    /// manager is created outside of a Tokio runtime; defaults to the number
    /// of CPUs.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Thread name prefix of the owned background runtime
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
    /// Log a DEBUG trace for every emit and every handler invocation
    #[serde(default)]
    pub trace_dispatch: bool,
    /// Skip matched subscriptions whose owner ended after the match set was taken
    #[serde(default = "default_skip_dead_owners")]
    pub skip_dead_owners: bool,
}

impl Default for EventManagerConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: default_thread_name(),
            trace_dispatch: false,
            skip_dead_owners: default_skip_dead_owners(),
        }
    }
}

impl EventManagerConfig {
    /// Number of worker threads an owned runtime is built with.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Validates the configuration, returning a list of issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.worker_threads == Some(0) {
            issues.push("events.worker_threads must be greater than zero".to_string());
        }
        if self.thread_name.trim().is_empty() {
            issues.push("events.thread_name must not be empty".to_string());
        }

        issues
    }
}
