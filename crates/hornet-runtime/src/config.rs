//! Runtime configuration.

use std::time::Duration;

use hornet_core::CloneLimits;

/// Settings shared by every worker a manager creates.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Upper bound on a single event-loop wait. The cap guarantees the
    /// loop re-checks the termination flags periodically even when no
    /// task is scheduled.
    pub event_loop_wait_cap: Duration,

    /// Limits applied when serializing values that leave a worker.
    pub clone_limits: CloneLimits,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_loop_wait_cap: Duration::from_secs(1),
            clone_limits: CloneLimits::default(),
        }
    }
}
