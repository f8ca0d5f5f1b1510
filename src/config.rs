//! Runtime configuration.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```ignore
//! let config = RuntimeConfig::from_json(r#"{ "timeout_ms": 150, "dispatch": "inline" }"#)?;
//! assert_eq!(config.debounce_window(), Duration::from_millis(300));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where interaction callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// On the worker pool; the worker then waits for the UI-thread update.
    #[default]
    Workers,
    /// Directly on the UI thread, followed by the update pass.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Base interaction timeout. Accepted interactions are spaced by twice this.
    pub timeout_ms: u64,
    /// Length of one animation ramp. Falls back to `timeout_ms`.
    pub animation_ms: Option<u64>,
    /// Interval between animation frames.
    pub frame_interval_ms: u64,
    pub workers: usize,
    pub dispatch: DispatchMode,
    /// Capacity of the cross-thread queue into the UI thread.
    pub queue_capacity: usize,
    /// Preferences key the state blob is stored under.
    pub state_key: String,
    /// Upper bound on passes a single `update_all` runs for nested requests.
    pub max_update_passes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 300,
            animation_ms: None,
            frame_interval_ms: 16,
            workers: 2,
            dispatch: DispatchMode::Workers,
            queue_capacity: 1024,
            state_key: "state".to_string(),
            max_update_passes: 8,
        }
    }
}

impl RuntimeConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Minimum spacing between accepted click, long-press and enter events.
    pub fn debounce_window(&self) -> Duration {
        self.timeout() * 2
    }

    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_ms.unwrap_or(self.timeout_ms))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Callbacks run on the UI thread; useful for deterministic tests.
    pub fn inline() -> Self {
        Self {
            dispatch: DispatchMode::Inline,
            ..Self::default()
        }
    }
}
