use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smartmall_notify::notifications::{MarkAllReadResult, NotificationApi, NotificationPage};
use smartmall_notify::{Notification, NotificationStatus, NotifyError, Result};
use tokio::sync::Semaphore;

/// In-memory notification backend.
///
/// Records are kept newest first. Failures and a gate that holds every call
/// until released can be switched on to simulate slow or broken backends.
#[derive(Default)]
pub struct FakeApi {
    records: Mutex<Vec<Notification>>,
    server_unread: Mutex<Option<usize>>,
    calls: Mutex<Vec<String>>,
    failing: AtomicBool,
    unauthorized: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

#[allow(dead_code)]
impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Notification>) -> Self {
        let api = Self::default();
        *api.records.lock().unwrap() = records;
        api
    }

    /// Persist a new record at the head, as the server does before pushing it.
    pub fn add(&self, notification: Notification) {
        self.records.lock().unwrap().insert(0, notification);
    }

    pub fn records(&self) -> Vec<Notification> {
        self.records.lock().unwrap().clone()
    }

    /// Make `unread_count` answer `count` regardless of the records.
    pub fn set_server_unread(&self, count: usize) {
        *self.server_unread.lock().unwrap() = Some(count);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.unauthorized.store(unauthorized, Ordering::SeqCst);
    }

    /// Hold every subsequent call until [`FakeApi::release`] is called.
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `calls` held calls through.
    pub fn release(&self, calls: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(calls);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    async fn enter(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| NotifyError::Http(e.to_string()))?;
            permit.forget();
        }

        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(NotifyError::Unauthorized { status: 401 });
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rest {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        Ok(())
    }

    fn page_of(records: &[Notification], page: u32, size: u32) -> NotificationPage {
        let size_usize = size.max(1) as usize;
        let total = records.len();
        let start = (page as usize * size_usize).min(total);
        let end = (start + size_usize).min(total);
        let total_pages = total.div_ceil(size_usize) as u32;
        NotificationPage {
            content: records[start..end].to_vec(),
            total_elements: total as u64,
            total_pages,
            size,
            number: page,
        }
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn list_page(&self, page: u32, size: u32) -> Result<NotificationPage> {
        self.enter(format!("list_page({},{})", page, size)).await?;
        let records = self.records.lock().unwrap();
        Ok(Self::page_of(&records, page, size))
    }

    async fn list_unread(&self, page: u32, size: u32) -> Result<NotificationPage> {
        self.enter(format!("list_unread({},{})", page, size)).await?;
        let unread: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.is_unread())
            .cloned()
            .collect();
        Ok(Self::page_of(&unread, page, size))
    }

    async fn unread_count(&self) -> Result<usize> {
        self.enter("unread_count".to_string()).await?;
        if let Some(count) = *self.server_unread.lock().unwrap() {
            return Ok(count);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.is_unread())
            .count())
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.enter(format!("mark_read({})", id)).await?;
        if let Some(n) = self.records.lock().unwrap().iter_mut().find(|n| n.id == id) {
            n.status = NotificationStatus::Read;
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<MarkAllReadResult> {
        self.enter("mark_all_read".to_string()).await?;
        let mut updated_count = 0;
        for n in self.records.lock().unwrap().iter_mut().filter(|n| n.is_unread()) {
            n.status = NotificationStatus::Read;
            updated_count += 1;
        }
        Ok(MarkAllReadResult { updated_count })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.enter(format!("delete({})", id)).await?;
        self.records.lock().unwrap().retain(|n| n.id != id);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.enter("delete_all".to_string()).await?;
        self.records.lock().unwrap().clear();
        Ok(())
    }
}
