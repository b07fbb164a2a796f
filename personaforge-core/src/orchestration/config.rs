use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed-interval polling policy for external jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Delay between two status checks.
    pub interval_ms: u64,
    /// Ceiling for one provider's poll loop.
    pub timeout_ms: u64,
    /// Transient status-check failures tolerated in a row before the job is
    /// considered failed. Zero disables the limit and leaves only the
    /// timeout.
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            timeout_ms: 120_000,
            max_consecutive_errors: 5,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
