use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smartmall_notify::connection::{PushLink, PushTransport};
use smartmall_notify::{Notification, NotifyError, Result};
use tokio::sync::mpsc;

/// Outcome of one scripted handshake.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Handshake {
    Accept,
    /// Socket-level failure.
    Fail,
    /// Server answered with an error frame.
    Reject(String),
    /// Never completes.
    Stall,
}

enum LinkEvent {
    Frame(String),
    Drop,
}

#[derive(Default)]
struct Shared {
    handshakes: AtomicUsize,
    heartbeats: AtomicUsize,
    closed: AtomicUsize,
    subscriptions: Mutex<Vec<String>>,
    credentials: Mutex<Vec<(String, String)>>,
    current: Mutex<Option<mpsc::UnboundedSender<LinkEvent>>>,
}

/// Push transport driven by a script of handshake outcomes. Once the script
/// runs out every handshake is accepted.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Handshake>>,
    shared: Arc<Shared>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(script: Vec<Handshake>) -> Self {
        let transport = Self::default();
        *transport.script.lock().unwrap() = script.into();
        transport
    }

    pub fn enqueue(&self, outcome: Handshake) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn handshakes(&self) -> usize {
        self.shared.handshakes.load(Ordering::SeqCst)
    }

    pub fn heartbeats(&self) -> usize {
        self.shared.heartbeats.load(Ordering::SeqCst)
    }

    pub fn closed_links(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.shared.subscriptions.lock().unwrap().clone()
    }

    pub fn credentials(&self) -> Vec<(String, String)> {
        self.shared.credentials.lock().unwrap().clone()
    }

    /// Deliver a raw frame body on the live link.
    pub fn send_raw(&self, body: &str) {
        self.send(LinkEvent::Frame(body.to_string()));
    }

    /// Deliver `notification` as JSON on the live link.
    pub fn push(&self, notification: &Notification) {
        let body = serde_json::to_string(notification).unwrap();
        self.send(LinkEvent::Frame(body));
    }

    /// Simulate a transport-level drop of the live link.
    pub fn drop_link(&self) {
        self.send(LinkEvent::Drop);
    }

    fn send(&self, event: LinkEvent) {
        let current = self.shared.current.lock().unwrap();
        let sender = current.as_ref().expect("no live link");
        sender.send(event).expect("link already gone");
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn handshake(&self, identity: &str, credential: &str) -> Result<Box<dyn PushLink>> {
        self.shared.handshakes.fetch_add(1, Ordering::SeqCst);
        self.shared
            .credentials
            .lock()
            .unwrap()
            .push((identity.to_string(), credential.to_string()));

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Handshake::Accept);

        match outcome {
            Handshake::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                *self.shared.current.lock().unwrap() = Some(tx);
                Ok(Box::new(FakeLink {
                    rx,
                    shared: self.shared.clone(),
                }))
            }
            Handshake::Fail => Err(NotifyError::Transport("connection refused".to_string())),
            Handshake::Reject(message) => Err(NotifyError::Protocol(message)),
            Handshake::Stall => std::future::pending().await,
        }
    }
}

struct FakeLink {
    rx: mpsc::UnboundedReceiver<LinkEvent>,
    shared: Arc<Shared>,
}

#[async_trait]
impl PushLink for FakeLink {
    async fn subscribe(&mut self, destination: &str) -> Result<()> {
        self.shared
            .subscriptions
            .lock()
            .unwrap()
            .push(destination.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        match self.rx.recv().await {
            Some(LinkEvent::Frame(body)) => Some(Ok(body)),
            Some(LinkEvent::Drop) => Some(Err(NotifyError::Transport(
                "connection reset".to_string(),
            ))),
            None => None,
        }
    }

    async fn heartbeat(&mut self) -> Result<()> {
        self.shared.heartbeats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
    }
}
