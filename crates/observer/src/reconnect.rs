//! Fixed-delay, bounded-attempt reconnection policy.
//!
//! After a disconnect (or a failed first connect) the client waits
//! [`ReconnectPolicy::delay`] and tries again, up to
//! [`ReconnectPolicy::max_attempts`] times in a row. A successful
//! connection resets the count.

use std::time::Duration;

/// Tunable parameters for reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait before every reconnection attempt.
    pub delay: Duration,
    /// Consecutive reconnection attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// The attempt number to make after `used` consecutive attempts, or
    /// `None` once the budget is spent.
    pub fn next_attempt(&self, used: u32) -> Option<u32> {
        (used < self.max_attempts).then_some(used + 1)
    }
}

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// Waiting to make reconnection attempt `attempt` (1-based).
    Reconnecting { attempt: u32 },
    /// Attempts exhausted; the server cannot be reached.
    Unreachable,
}
