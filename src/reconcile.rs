//! Merges pushes, history pages and local mutations into one store.
//!
//! - A push whose id is already in the store is dropped and never counted.
//! - Pushes go to the head of the list; fetched pages keep server order.
//! - The unread counter moves with local transitions and is resynced from
//!   the server at connect time or on demand.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::notifications::{Notification, NotificationStore};
use crate::notifier::BrowserNotifier;

pub struct ReconciliationEngine {
    store: Arc<NotificationStore>,
    notifier: Arc<BrowserNotifier>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<NotificationStore>, notifier: Arc<BrowserNotifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    /// Apply a live push. Returns whether it was new.
    pub fn on_push(&self, notification: &Notification) -> bool {
        if !self.store.ingest_push(notification.clone()) {
            debug!("Push for known notification {} dropped", notification.id);
            return false;
        }
        self.notifier.notify(notification);
        true
    }

    /// Load a history page. History never raises OS notifications.
    pub async fn load_page(&self, page: u32, size: u32) -> Result<()> {
        self.store.load_page(page, size).await
    }

    pub async fn load_more(&self) -> Result<bool> {
        self.store.load_more().await
    }

    pub async fn resync_unread_count(&self) -> Result<usize> {
        self.store.refresh_unread_count().await
    }

    /// Registry callback feeding pushes into this engine.
    pub fn listener(
        self: &Arc<Self>,
    ) -> impl Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static {
        let engine = Arc::clone(self);
        move |notification| {
            engine.on_push(notification);
            Ok(())
        }
    }
}
