//! Multi-consumer fan-out of incoming events.
//!
//! Registration hands back a [`Subscription`] disposer. Dispatch iterates a
//! snapshot of the registered callbacks taken before the first call, so
//! callbacks may unsubscribe themselves or siblings while an event is being
//! delivered. A callback that fails or panics does not affect the others.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, error, warn};

type Callback<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

struct RegistryInner<T> {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

impl<T: 'static> Detach for RegistryInner<T> {
    fn detach(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }
}

/// Outcome of one [`SubscriptionRegistry::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct SubscriptionRegistry<T> {
    inner: Arc<RegistryInner<T>>,
}

impl<T: 'static> Default for SubscriptionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> SubscriptionRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register `callback` for every subsequent event.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));

        let detach: Arc<dyn Detach> = self.inner.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&detach),
            active: AtomicBool::new(true),
        }
    }

    /// Deliver `event` to every callback registered at the time of the call.
    pub fn publish(&self, event: &T) -> PublishReport {
        let snapshot: Vec<(u64, Callback<T>)> = self.inner.subscribers.lock().unwrap().clone();
        let mut report = PublishReport::default();

        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    warn!("Error in notification callback #{}: {:#}", id, err);
                    report.failed += 1;
                }
                Err(_) => {
                    error!("Notification callback #{} panicked", id);
                    report.failed += 1;
                }
            }
        }

        report
    }

    pub fn len(&self) -> usize {
        self.inner.subscribers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration. Outstanding [`Subscription`]s become no-ops.
    pub fn clear(&self) -> usize {
        let mut subscribers = self.inner.subscribers.lock().unwrap();
        let removed = subscribers.len();
        subscribers.clear();
        if removed > 0 {
            debug!("Cleared {} notification subscribers", removed);
        }
        removed
    }
}

/// Disposer for one registration. Unsubscribes on drop.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove exactly this registration. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
