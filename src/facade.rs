//! Single reactive handle over the notification core.
//!
//! The facade wires the push channel, the store and the OS notifier together
//! and owns their lifecycle: `mount` connects with a valid session and
//! performs the initial load, `teardown` (or drop) disconnects and closes the
//! store so late completions are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::NotifyConfig;
use crate::connection::{ConnectionManager, ConnectionState, StompTransport};
use crate::error::{NotifyError, Result};
use crate::notifications::{
    Notification, NotificationApi, NotificationPage, NotificationStore, RestNotificationApi,
    StoreSnapshot,
};
use crate::notifier::{BrowserNotifier, NotificationSurface};
use crate::reconcile::ReconciliationEngine;
use crate::registry::Subscription;

/// Authenticated identity the facade connects as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.user_id.trim().is_empty() && !self.access_token.trim().is_empty()
    }
}

pub struct NotificationFacade {
    connection: Arc<ConnectionManager>,
    store: Arc<NotificationStore>,
    engine: Arc<ReconciliationEngine>,
    notifier: Arc<BrowserNotifier>,
    listener: Mutex<Option<Subscription>>,
    initialized: AtomicBool,
    active: CancellationToken,
    page_size: u32,
}

impl NotificationFacade {
    pub fn new(
        connection: Arc<ConnectionManager>,
        api: Arc<dyn NotificationApi>,
        surface: Arc<dyn NotificationSurface>,
        page_size: u32,
    ) -> Self {
        let store = Arc::new(NotificationStore::new(api, page_size));
        let notifier = Arc::new(BrowserNotifier::new(surface));
        let engine = Arc::new(ReconciliationEngine::new(store.clone(), notifier.clone()));
        Self {
            connection,
            store,
            engine,
            notifier,
            listener: Mutex::new(None),
            initialized: AtomicBool::new(false),
            active: CancellationToken::new(),
            page_size,
        }
    }

    /// Compose the production stack: REST backend plus STOMP push channel.
    pub fn from_config(
        config: &NotifyConfig,
        session: &Session,
        surface: Arc<dyn NotificationSurface>,
    ) -> Result<Self> {
        let api = RestNotificationApi::new(
            config.api_base_url.clone(),
            session.access_token.clone(),
            Duration::from_secs(config.rest.request_timeout_sec),
        )?;
        let transport = StompTransport::new(
            config.ws_url.clone(),
            config.connection.heartbeat_interval_ms,
        );
        let connection = Arc::new(ConnectionManager::new(
            Arc::new(transport),
            &config.connection,
        ));
        Ok(Self::new(connection, Arc::new(api), surface, config.page_size))
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn is_active(&self) -> bool {
        !self.active.is_cancelled()
    }

    /// Connect as `session` and load the first page.
    ///
    /// An incomplete session is ignored. Only the first concurrent mount does
    /// any work; the latch is released again if the connection fails so a
    /// manual retry can mount once more.
    pub async fn mount(&self, session: &Session) -> Result<()> {
        if !session.is_valid() {
            warn!("No user id or access token in session, not connecting");
            return Ok(());
        }
        self.ensure_active()?;
        if self.initialized.swap(true, Ordering::AcqRel) {
            debug!("Notification facade already initialized");
            return Ok(());
        }

        self.notifier.request_permission_once().await;

        if let Err(e) = self
            .connection
            .connect(&session.user_id, &session.access_token)
            .await
        {
            error!("Failed to connect to notification service: {}", e);
            self.initialized.store(false, Ordering::Release);
            self.store.record_error(e.to_string());
            return Err(e);
        }

        {
            let mut listener = self.listener.lock().unwrap();
            self.ensure_active()?;
            if listener.is_none() {
                *listener = Some(self.connection.subscribe(self.engine.listener()));
            }
        }
        info!("Notification service connected for user {}", session.user_id);

        self.spawn_resync_on_reconnect();

        if let Err(e) = self.engine.load_page(0, self.page_size).await {
            warn!("Initial notification load failed: {}", e);
        }
        if let Err(e) = self.engine.resync_unread_count().await {
            warn!("Error fetching unread count: {}", e);
        }
        Ok(())
    }

    fn spawn_resync_on_reconnect(&self) {
        let mut links = self.connection.watch_links();
        links.borrow_and_update();
        let engine = self.engine.clone();
        let active = self.active.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = active.cancelled() => break,
                    changed = links.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        links.borrow_and_update();
                        match engine.resync_unread_count().await {
                            Ok(count) => debug!("Unread count resynced after reconnect: {}", count),
                            Err(NotifyError::Detached) => break,
                            Err(e) => warn!("Unread count resync failed: {}", e),
                        }
                    }
                }
            }
        });
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active.is_cancelled() {
            return Err(NotifyError::Detached);
        }
        Ok(())
    }

    pub async fn load_notifications(&self, page: u32, size: u32) -> Result<()> {
        self.ensure_active()?;
        self.engine.load_page(page, size).await
    }

    /// Returns false when there was nothing more to load.
    pub async fn load_more(&self) -> Result<bool> {
        self.ensure_active()?;
        self.engine.load_more().await
    }

    pub async fn mark_read(&self, id: &str) -> Result<()> {
        self.ensure_active()?;
        self.store.mark_read(id).await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.ensure_active()?;
        self.store.mark_all_read().await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_active()?;
        self.store.delete(id).await
    }

    pub async fn delete_all(&self) -> Result<()> {
        self.ensure_active()?;
        self.store.delete_all().await
    }

    pub async fn refresh_unread_count(&self) -> Result<usize> {
        self.ensure_active()?;
        self.engine.resync_unread_count().await
    }

    /// Unread-only listing straight from the backend. The store is not touched.
    pub async fn list_unread(&self, page: u32, size: u32) -> Result<NotificationPage> {
        self.ensure_active()?;
        let page = self.store.api().list_unread(page, size).await?;
        self.ensure_active()?;
        Ok(page)
    }

    /// The user clicked the OS notification for `notification`.
    pub fn activate(&self, notification: &Notification) -> bool {
        self.notifier.activate(notification)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.store.unread_count()
    }

    pub fn watch_store(&self) -> watch::Receiver<StoreSnapshot> {
        self.store.watch()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Unsubscribe, disconnect and close the store. Idempotent.
    pub fn teardown(&self) {
        if self.active.is_cancelled() {
            return;
        }
        self.active.cancel();

        if let Some(listener) = self.listener.lock().unwrap().take() {
            listener.unsubscribe();
        }
        self.connection.disconnect();
        self.store.close();
        info!("Notification facade torn down");
    }
}

impl Drop for NotificationFacade {
    fn drop(&mut self) {
        self.teardown();
    }
}
