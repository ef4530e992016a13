//! Notification data models

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Read state of a notification, the only field mutated client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Unread,
    Read,
}

/// A user notification, identical whether it arrived by push or by page fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    /// Category tag (`ORDER_SHIPPED`, `PAYMENT_SUCCESS`, ...). Opaque to the core.
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}

/// One page of notification history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub content: Vec<Notification>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub size: u32,
    /// Zero-based index of this page.
    pub number: u32,
}

impl NotificationPage {
    /// Whether pages after this one exist on the server.
    pub fn has_more(&self) -> bool {
        self.number + 1 < self.total_pages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResult {
    pub updated_count: usize,
}

/// Response body as sent by the backend: either wrapped in
/// `{ success, message, data }` or the bare payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiEnvelope<T> {
    Wrapped {
        data: T,
        #[allow(dead_code)]
        #[serde(default)]
        success: Option<bool>,
        #[allow(dead_code)]
        #[serde(default)]
        message: Option<String>,
    },
    Bare(T),
}

/// Decode a REST body, unwrapping the `data` envelope when present.
pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, serde_json::Error> {
    let envelope: ApiEnvelope<T> = serde_json::from_str(body)?;
    Ok(match envelope {
        ApiEnvelope::Wrapped { data, .. } => data,
        ApiEnvelope::Bare(payload) => payload,
    })
}
