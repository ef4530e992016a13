//! Injectable timer used for reconnect backoff.

use std::time::Duration;

use async_trait::async_trait;

/// Source of backoff delays. Tests substitute one that records the requested
/// delays instead of waiting them out.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Real timer backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
