//! Common test infrastructure
//!
//! In-memory collaborators for driving the notification core without a
//! network: a REST backend, a scripted push transport, a scheduler that
//! records backoff delays and an OS notification surface that records toasts.
//! Tests should only import from this module, not from internal submodules.

mod fake_api;
mod fake_transport;
mod fixtures;
mod recording;

#[allow(unused_imports)]
pub use fake_api::FakeApi;
#[allow(unused_imports)]
pub use fake_transport::{Handshake, ScriptedTransport};
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use recording::{RecordingScheduler, RecordingSurface};

use std::time::Duration;

/// Poll `condition` until it holds, panicking after two seconds.
#[allow(dead_code)]
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
