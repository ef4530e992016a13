//! Error taxonomy shared by every component of the notification core.

use thiserror::Error;

/// Errors surfaced by the notification client.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Socket-level failure (drop, DNS, refused). Feeds the reconnect path.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The push server rejected the handshake. Terminal for the attempt.
    #[error("Handshake rejected: {0}")]
    Protocol(String),

    #[error("Connection failed after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },

    /// Non-2xx answer from the REST backend.
    #[error("REST call failed with status {status}: {message}")]
    Rest { status: u16, message: String },

    #[error("Not authorized (status {status})")]
    Unauthorized { status: u16 },

    /// The REST call never produced a response (connect/timeout/body read).
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The owning facade was torn down while the operation was suspended.
    #[error("Notification client has been torn down")]
    Detached,
}

impl NotifyError {
    /// Whether this error should be recovered by reconnecting.
    pub fn is_transient(&self) -> bool {
        matches!(self, NotifyError::Transport(_))
    }

    /// Whether this error is an authorization failure from the backend.
    pub fn is_auth(&self) -> bool {
        matches!(self, NotifyError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                NotifyError::Unauthorized {
                    status: status.as_u16(),
                }
            }
            Some(status) => NotifyError::Rest {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => NotifyError::Http(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
