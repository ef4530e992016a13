//! Seam between the connection manager and the framing library.

use async_trait::async_trait;

use crate::error::Result;

/// Opens push links. Implementations report a rejected handshake as
/// [`NotifyError::Protocol`](crate::NotifyError::Protocol) and anything
/// socket-level as [`NotifyError::Transport`](crate::NotifyError::Transport).
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn handshake(&self, identity: &str, credential: &str) -> Result<Box<dyn PushLink>>;
}

/// An established, authenticated link carrying framed messages.
#[async_trait]
pub trait PushLink: Send {
    /// Subscribe to a destination on the server.
    async fn subscribe(&mut self, destination: &str) -> Result<()>;

    /// Next message body. `None` means the link was closed by the peer; an
    /// error means it dropped.
    async fn recv(&mut self) -> Option<Result<String>>;

    async fn heartbeat(&mut self) -> Result<()>;

    /// Close the link. Errors are not reported.
    async fn close(&mut self);
}

/// The single per-identity destination carrying notification records.
pub fn notification_destination(identity: &str) -> String {
    format!("/user/{}/queue/notifications", identity)
}
