//! Push-channel connection state machine values.

use std::fmt;

/// Lifecycle of the push channel. Exactly one variant is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Handshake in flight. `attempt` is 0 for the initial connect and the
    /// reconnect cycle number otherwise.
    Connecting { attempt: u32 },
    Connected,
    /// Waiting out the backoff delay before reconnect cycle `attempt`.
    Reconnecting { attempt: u32 },
    /// Terminal until the next explicit `connect()`.
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Whether a connection attempt owns the channel right now.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting { .. }
                | ConnectionState::Connected
                | ConnectionState::Reconnecting { .. }
        )
    }

    /// UI hint: live updates are temporarily unavailable.
    pub fn is_offline(&self) -> bool {
        matches!(self, ConnectionState::Reconnecting { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting { .. } => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting { .. } => "reconnecting",
            ConnectionState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting { attempt } | ConnectionState::Reconnecting { attempt }
                if *attempt > 0 =>
            {
                write!(f, "{} (attempt {})", self.as_str(), attempt)
            }
            ConnectionState::Failed { reason } => write!(f, "failed: {}", reason),
            _ => f.write_str(self.as_str()),
        }
    }
}
