//! Reconnect policy for the push channel.
//!
//! Implements bounded exponential backoff: `base * 2^(attempt - 1)`.

use std::time::Duration;

use crate::config::ConnectionSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Reconnect cycles allowed before the connection is declared failed.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(settings: &ConnectionSettings) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.reconnect_base_delay_ms),
            max_attempts: settings.max_reconnect_attempts,
        }
    }

    /// Backoff before reconnect cycle `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Whether reconnect cycle `attempt` is still within budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}
