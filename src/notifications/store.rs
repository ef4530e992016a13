//! Authoritative client-side notification store.
//!
//! Every mutation is confirmed by the backend before the local record set is
//! touched, so a failed call leaves records and counter exactly as they were.
//! Completions that land after [`NotificationStore::close`] are discarded.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::api::NotificationApi;
use super::cache::NotificationCache;
use super::models::Notification;
use crate::error::{NotifyError, Result};

/// Read-only view handed to UI consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    /// Last page successfully loaded, if any.
    pub current_page: Option<u32>,
    pub has_more: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct StoreState {
    cache: NotificationCache,
    current_page: Option<u32>,
    page_size: u32,
    has_more: bool,
    is_loading: bool,
    error: Option<String>,
}

impl StoreState {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            notifications: self.cache.items().to_vec(),
            unread_count: self.cache.unread_count(),
            current_page: self.current_page,
            has_more: self.has_more,
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }
}

pub struct NotificationStore {
    api: Arc<dyn NotificationApi>,
    state: Mutex<StoreState>,
    snapshot_tx: watch::Sender<StoreSnapshot>,
    closed: CancellationToken,
}

impl NotificationStore {
    pub fn new(api: Arc<dyn NotificationApi>, page_size: u32) -> Self {
        let (snapshot_tx, _) = watch::channel(StoreSnapshot::default());
        Self {
            api,
            state: Mutex::new(StoreState {
                cache: NotificationCache::new(),
                current_page: None,
                page_size,
                has_more: false,
                is_loading: false,
                error: None,
            }),
            snapshot_tx,
            closed: CancellationToken::new(),
        }
    }

    pub fn api(&self) -> &Arc<dyn NotificationApi> {
        &self.api
    }

    /// Subscribe to snapshot updates.
    pub fn watch(&self) -> watch::Receiver<StoreSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().unwrap().snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.state.lock().unwrap().cache.unread_count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Stop applying results. Operations still in flight resolve with
    /// [`NotifyError::Detached`].
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!("Closing notification store");
            self.closed.cancel();
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(NotifyError::Detached);
        }
        Ok(())
    }

    /// Apply `f` to the state and publish the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        let result = f(&mut state);
        self.snapshot_tx.send_replace(state.snapshot());
        result
    }

    /// Fetch a history page. Page 0 replaces the list, later pages append.
    ///
    /// On failure the previous list is kept and the error is recorded in the
    /// snapshot as well as returned.
    pub async fn load_page(&self, page: u32, size: u32) -> Result<()> {
        self.ensure_open()?;
        self.update(|state| {
            state.is_loading = true;
            state.error = None;
            state.page_size = size;
        });

        let result = self.api.list_page(page, size).await;
        self.ensure_open()?;

        self.update(|state| {
            state.is_loading = false;
            match result {
                Ok(fetched) => {
                    let has_more = fetched.has_more();
                    if page == 0 {
                        state.cache.replace(fetched.content);
                    } else {
                        let appended = state.cache.append(fetched.content);
                        debug!("Appended {} notifications from page {}", appended, page);
                    }
                    state.current_page = Some(page);
                    state.has_more = has_more;
                    Ok(())
                }
                Err(err) => {
                    warn!("Failed to load notifications page {}: {}", page, err);
                    state.error = Some(err.to_string());
                    Err(err)
                }
            }
        })
    }

    /// Load the page after the last loaded one. Returns false when there was
    /// nothing to do (already loading, or no more pages).
    pub async fn load_more(&self) -> Result<bool> {
        let (next, size) = {
            let state = self.state.lock().unwrap();
            if state.is_loading {
                return Ok(false);
            }
            match state.current_page {
                None => (0, state.page_size),
                Some(_) if !state.has_more => return Ok(false),
                Some(page) => (page + 1, state.page_size),
            }
        };
        self.load_page(next, size).await?;
        Ok(true)
    }

    pub async fn mark_read(&self, id: &str) -> Result<()> {
        self.ensure_open()?;
        self.api.mark_read(id).await.inspect_err(|err| {
            warn!("Error marking notification {} as read: {}", id, err);
        })?;
        self.ensure_open()?;

        let flipped = self.update(|state| state.cache.mark_read(id));
        if !flipped {
            debug!("mark_read({}) confirmed but nothing to flip locally", id);
        }
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.ensure_open()?;
        let confirmed = self.api.mark_all_read().await.inspect_err(|err| {
            warn!("Error marking all notifications as read: {}", err);
        })?;
        self.ensure_open()?;

        let flipped = self.update(|state| state.cache.mark_all_read());
        info!(
            "Marked all notifications read ({} local, {} remote)",
            flipped, confirmed.updated_count
        );
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_open()?;
        self.api.delete(id).await.inspect_err(|err| {
            warn!("Error deleting notification {}: {}", id, err);
        })?;
        self.ensure_open()?;

        self.update(|state| state.cache.remove(id));
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<()> {
        self.ensure_open()?;
        self.api.delete_all().await.inspect_err(|err| {
            warn!("Error deleting all notifications: {}", err);
        })?;
        self.ensure_open()?;

        self.update(|state| state.cache.clear());
        Ok(())
    }

    /// Resynchronize the unread counter from the server.
    pub async fn refresh_unread_count(&self) -> Result<usize> {
        self.ensure_open()?;
        let count = self.api.unread_count().await?;
        self.ensure_open()?;

        Ok(self.update(|state| {
            state.cache.resync_unread(count);
            state.cache.unread_count()
        }))
    }

    /// Show an error that did not come from a store operation (e.g. the
    /// push channel failing to connect).
    pub(crate) fn record_error(&self, message: String) {
        if self.is_closed() {
            return;
        }
        self.update(|state| state.error = Some(message));
    }

    /// Insert a pushed notification at the head. Returns false if the id is
    /// already known or the store is closed.
    pub(crate) fn ingest_push(&self, notification: Notification) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut state = self.state.lock().unwrap();
        if !state.cache.ingest(notification) {
            return false;
        }
        self.snapshot_tx.send_replace(state.snapshot());
        true
    }
}
