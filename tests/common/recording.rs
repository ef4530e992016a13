use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use smartmall_notify::connection::Scheduler;
use smartmall_notify::{NotificationSurface, Permission, Toast};

/// Scheduler that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingScheduler {
    delays: Mutex<Vec<Duration>>,
}

#[allow(dead_code)]
impl RecordingScheduler {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }

    pub fn delays_ms(&self) -> Vec<u128> {
        self.delays().iter().map(|d| d.as_millis()).collect()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
        tokio::task::yield_now().await;
    }
}

/// OS notification surface that records what it was asked to do.
pub struct RecordingSurface {
    permission: Mutex<Permission>,
    prompts: AtomicUsize,
    shown: Mutex<Vec<Toast>>,
    opened: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingSurface {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
            prompts: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(Permission::Granted)
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> Vec<Toast> {
        self.shown.lock().unwrap().clone()
    }

    pub fn shown_tags(&self) -> Vec<String> {
        self.shown().into_iter().map(|t| t.tag).collect()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSurface for RecordingSurface {
    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> anyhow::Result<Permission> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let mut permission = self.permission.lock().unwrap();
        *permission = Permission::Granted;
        Ok(*permission)
    }

    fn show(&self, toast: &Toast) -> anyhow::Result<()> {
        self.shown.lock().unwrap().push(toast.clone());
        Ok(())
    }

    fn open(&self, deep_link: &str) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(deep_link.to_string());
        Ok(())
    }
}
