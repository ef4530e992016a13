//! In-memory record set backing the notification store.
//!
//! Records are kept newest first. The unread counter is maintained
//! incrementally: `unread_count() == local unread + hidden unread`, where
//! the hidden part is unread items the server knows about but that are not
//! loaded locally. Only a server count resync sets it. Without resyncs it
//! stays zero and the counter equals the number of unread records.

use std::collections::HashSet;

use tracing::debug;

use super::models::{Notification, NotificationStatus};

#[derive(Debug, Default, Clone)]
pub struct NotificationCache {
    items: Vec<Notification>,
    /// Ids of records that arrived by push.
    pushed: HashSet<String>,
    local_unread: usize,
    hidden_unread: usize,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|n| n.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.local_unread + self.hidden_unread
    }

    /// Number of unread records actually held.
    pub fn local_unread(&self) -> usize {
        self.local_unread
    }

    /// Prepend a pushed record. Returns false if the id is already present.
    pub fn ingest(&mut self, notification: Notification) -> bool {
        if self.contains(&notification.id) {
            return false;
        }
        self.pushed.insert(notification.id.clone());
        if notification.is_unread() {
            self.local_unread += 1;
        }
        self.items.insert(0, notification);
        true
    }

    /// Flip an unread record to read. Returns false if absent or already read.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) if n.is_unread() => {
                n.status = NotificationStatus::Read;
                self.local_unread -= 1;
                true
            }
            _ => false,
        }
    }

    /// Flip every record to read and zero the counter. Returns how many flipped.
    pub fn mark_all_read(&mut self) -> usize {
        let mut flipped = 0;
        for n in self.items.iter_mut().filter(|n| n.is_unread()) {
            n.status = NotificationStatus::Read;
            flipped += 1;
        }
        self.local_unread = 0;
        self.hidden_unread = 0;
        flipped
    }

    pub fn remove(&mut self, id: &str) -> Option<Notification> {
        let index = self.items.iter().position(|n| n.id == id)?;
        let removed = self.items.remove(index);
        self.pushed.remove(id);
        if removed.is_unread() {
            self.local_unread -= 1;
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.pushed.clear();
        self.local_unread = 0;
        self.hidden_unread = 0;
    }

    /// Adopt the server's authoritative unread count.
    ///
    /// A server count below the local unread total leaves the counter at the
    /// local total, since every loaded unread record is still shown.
    pub fn resync_unread(&mut self, server_count: usize) {
        if server_count < self.local_unread {
            debug!(
                "Server unread count {} below {} loaded unread records",
                server_count, self.local_unread
            );
        }
        self.hidden_unread = server_count.saturating_sub(self.local_unread);
    }

    /// Replace the list with a freshly fetched first page.
    ///
    /// Pushed records the page does not contain stay at the head in their
    /// current order. Page records win over pushed records with the same id.
    /// Unread records new to the list consume the hidden offset, as in
    /// [`NotificationCache::append`].
    pub fn replace(&mut self, page: Vec<Notification>) {
        let page_ids: HashSet<&str> = page.iter().map(|n| n.id.as_str()).collect();
        let mut next: Vec<Notification> = self
            .items
            .iter()
            .filter(|n| self.pushed.contains(&n.id) && !page_ids.contains(n.id.as_str()))
            .cloned()
            .collect();

        let mut seen: HashSet<String> = next.iter().map(|n| n.id.clone()).collect();
        for n in page {
            if seen.insert(n.id.clone()) {
                next.push(n);
            }
        }

        let newly_unread = next
            .iter()
            .filter(|n| n.is_unread() && !self.contains(&n.id))
            .count();
        self.hidden_unread = self.hidden_unread.saturating_sub(newly_unread);

        self.pushed.retain(|id| seen.contains(id));
        self.local_unread = next.iter().filter(|n| n.is_unread()).count();
        self.items = next;
    }

    /// Append a later page, skipping ids already present. Returns how many
    /// records were appended.
    pub fn append(&mut self, page: Vec<Notification>) -> usize {
        let mut appended = 0;
        let mut appended_unread = 0;
        for n in page {
            if self.contains(&n.id) {
                continue;
            }
            if n.is_unread() {
                appended_unread += 1;
            }
            self.items.push(n);
            appended += 1;
        }
        self.local_unread += appended_unread;
        self.hidden_unread = self.hidden_unread.saturating_sub(appended_unread);
        appended
    }
}
