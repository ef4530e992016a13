//! Push-channel lifecycle: connect, heartbeat, bounded reconnect, disconnect.
//!
//! A connect spawns one supervisor task that owns the link. The supervisor
//! walks the [`ConnectionState`] machine and publishes every distinct pushed
//! record to the [`SubscriptionRegistry`]. `disconnect()` bumps the
//! generation and cancels the supervisor, so a stale task can never write
//! state again.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::policy::ReconnectPolicy;
use super::scheduler::{Scheduler, TokioScheduler};
use super::state::ConnectionState;
use super::transport::{notification_destination, PushLink, PushTransport};
use crate::config::ConnectionSettings;
use crate::error::{NotifyError, Result};
use crate::notifications::Notification;
use crate::registry::{Subscription, SubscriptionRegistry};

/// Ids remembered for push deduplication.
const DEDUP_WINDOW: usize = 512;

struct Slot {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Bounded memory of recently published ids.
struct DedupWindow {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl DedupWindow {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false if `id` is already in the window.
    fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

enum LinkEnd {
    Cancelled,
    Dropped(String),
}

pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    scheduler: Arc<dyn Scheduler>,
    policy: ReconnectPolicy,
    heartbeat_interval: Duration,
    handshake_timeout: Duration,
    registry: SubscriptionRegistry<Notification>,
    state_tx: watch::Sender<ConnectionState>,
    /// Links established since creation.
    links_tx: watch::Sender<u64>,
    /// Set while a supervisor owns the channel. Flipped under `slot`.
    in_progress: AtomicBool,
    slot: Mutex<Slot>,
    dedup: Mutex<DedupWindow>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn PushTransport>, settings: &ConnectionSettings) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (links_tx, _) = watch::channel(0);
        Self {
            transport,
            scheduler: Arc::new(TokioScheduler),
            policy: ReconnectPolicy::new(settings),
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            handshake_timeout: Duration::from_millis(settings.handshake_timeout_ms),
            registry: SubscriptionRegistry::new(),
            state_tx,
            links_tx,
            in_progress: AtomicBool::new(false),
            slot: Mutex::new(Slot {
                generation: 0,
                cancel: None,
            }),
            dedup: Mutex::new(DedupWindow::new(DEDUP_WINDOW)),
        }
    }

    /// Replace the timer used for reconnect backoff.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Bumped every time a link is established, including reconnects.
    pub fn watch_links(&self) -> watch::Receiver<u64> {
        self.links_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state_tx.borrow().is_connected()
    }

    pub fn registry(&self) -> &SubscriptionRegistry<Notification> {
        &self.registry
    }

    /// Register a listener for every distinct pushed notification.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.subscribe(callback)
    }

    /// Open the push channel for `identity`.
    ///
    /// Returns once the first handshake succeeds, or with the terminal error
    /// if the channel fails first. While another connect owns the channel
    /// (connecting, connected or reconnecting) this is a no-op returning
    /// `Ok(())`.
    pub async fn connect(self: &Arc<Self>, identity: &str, credential: &str) -> Result<()> {
        let (cancel, generation) = {
            let mut slot = self.slot.lock().unwrap();
            if self.in_progress.swap(true, Ordering::AcqRel) {
                debug!(
                    "Push channel already {}, ignoring connect",
                    self.state_tx.borrow().as_str()
                );
                return Ok(());
            }
            slot.generation += 1;
            let cancel = CancellationToken::new();
            slot.cancel = Some(cancel.clone());
            (cancel, slot.generation)
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let manager = self.clone();
        let identity = identity.to_string();
        let credential = credential.to_string();
        tokio::spawn(async move {
            manager
                .supervise(generation, cancel, identity, credential, ready_tx)
                .await;
        });

        ready_rx.await.unwrap_or(Err(NotifyError::Detached))
    }

    /// Close the channel and drop every registered listener. Safe to call in
    /// any state, any number of times.
    pub fn disconnect(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.generation += 1;
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        self.in_progress.store(false, Ordering::Release);
        self.registry.clear();
        self.dedup.lock().unwrap().clear();

        let previous = self.state_tx.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            info!("Push channel disconnected (was {})", previous);
        }
    }

    async fn supervise(
        self: Arc<Self>,
        generation: u64,
        cancel: CancellationToken,
        identity: String,
        credential: String,
        ready: oneshot::Sender<Result<()>>,
    ) {
        let mut ready = Some(ready);
        let mut attempt: u32 = 0;

        loop {
            if !self.transition(generation, ConnectionState::Connecting { attempt }) {
                return;
            }

            let opened = tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.open_link(&identity, &credential) => result,
            };

            match opened {
                Ok(mut link) => {
                    attempt = 0;
                    if !self.transition(generation, ConnectionState::Connected) {
                        link.close().await;
                        return;
                    }
                    info!("Push channel connected for user {}", identity);
                    self.links_tx.send_modify(|links| *links += 1);
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(Ok(()));
                    }

                    match self.pump(link.as_mut(), &cancel).await {
                        LinkEnd::Cancelled => return,
                        LinkEnd::Dropped(reason) => warn!("Push channel dropped: {}", reason),
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!("Push channel handshake failed: {}", e);
                }
                Err(e) => {
                    error!("Push channel handshake rejected: {}", e);
                    self.fail(generation, e.to_string());
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(Err(e));
                    }
                    return;
                }
            }

            attempt += 1;
            if !self.policy.allows(attempt) {
                let err = NotifyError::RetriesExhausted {
                    attempts: self.policy.max_attempts,
                };
                error!("{}", err);
                self.fail(generation, err.to_string());
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(err));
                }
                return;
            }

            if !self.transition(generation, ConnectionState::Reconnecting { attempt }) {
                return;
            }
            let delay = self.policy.delay_for(attempt);
            info!(
                "Reconnecting in {}ms (attempt {}/{})",
                delay.as_millis(),
                attempt,
                self.policy.max_attempts
            );

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.scheduler.sleep(delay) => {}
            }
        }
    }

    /// Handshake plus the single per-identity subscription, bounded by the
    /// handshake timeout.
    async fn open_link(&self, identity: &str, credential: &str) -> Result<Box<dyn PushLink>> {
        let destination = notification_destination(identity);
        let open = async {
            let mut link = self.transport.handshake(identity, credential).await?;
            if let Err(e) = link.subscribe(&destination).await {
                link.close().await;
                return Err(e);
            }
            Ok(link)
        };

        match tokio::time::timeout(self.handshake_timeout, open).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Transport(format!(
                "Handshake timed out after {}ms",
                self.handshake_timeout.as_millis()
            ))),
        }
    }

    async fn pump(&self, link: &mut dyn PushLink, cancel: &CancellationToken) -> LinkEnd {
        let mut heartbeat = self.heartbeat_timer();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    link.close().await;
                    return LinkEnd::Cancelled;
                }
                _ = next_heartbeat(&mut heartbeat) => {
                    if let Err(e) = link.heartbeat().await {
                        return LinkEnd::Dropped(e.to_string());
                    }
                }
                frame = link.recv() => match frame {
                    Some(Ok(body)) => self.dispatch(&body),
                    Some(Err(e)) => return LinkEnd::Dropped(e.to_string()),
                    None => return LinkEnd::Dropped("closed by server".to_string()),
                },
            }
        }
    }

    fn heartbeat_timer(&self) -> Option<Interval> {
        if self.heartbeat_interval.is_zero() {
            return None;
        }
        let mut timer = tokio::time::interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(timer)
    }

    fn dispatch(&self, body: &str) {
        let notification: Notification = match serde_json::from_str(body) {
            Ok(n) => n,
            Err(e) => {
                warn!("Dropping undecodable push frame: {}", e);
                return;
            }
        };

        if !self.dedup.lock().unwrap().insert(&notification.id) {
            debug!("Dropping duplicate push for notification {}", notification.id);
            return;
        }

        let report = self.registry.publish(&notification);
        debug!(
            "Notification {} delivered to {} subscribers ({} failed)",
            notification.id, report.delivered, report.failed
        );
    }

    /// Publish `next` if `generation` still owns the channel.
    fn transition(&self, generation: u64, next: ConnectionState) -> bool {
        let slot = self.slot.lock().unwrap();
        if slot.generation != generation {
            return false;
        }
        self.state_tx.send_replace(next);
        true
    }

    fn fail(&self, generation: u64, reason: String) {
        let mut slot = self.slot.lock().unwrap();
        if slot.generation != generation {
            return;
        }
        slot.cancel = None;
        self.in_progress.store(false, Ordering::Release);
        self.state_tx.send_replace(ConnectionState::Failed { reason });
    }
}

async fn next_heartbeat(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
