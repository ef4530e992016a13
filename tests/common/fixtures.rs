use smartmall_notify::config::ConnectionSettings;
use smartmall_notify::{Notification, NotificationStatus, Session};

#[allow(dead_code)]
pub const USER_ID: &str = "user-1";
#[allow(dead_code)]
pub const TOKEN: &str = "test-token";

#[allow(dead_code)]
pub fn session() -> Session {
    Session::new(USER_ID, TOKEN)
}

pub fn notification(id: &str, status: NotificationStatus) -> Notification {
    Notification {
        id: id.to_string(),
        user_id: USER_ID.to_string(),
        notification_type: "ORDER_SHIPPED".to_string(),
        title: format!("Order update {}", id),
        message: format!("Your order {} has shipped", id),
        status,
        reference_id: Some(format!("order-{}", id)),
        reference_type: Some("ORDER".to_string()),
        metadata: serde_json::json!({ "orderId": id }),
        image_url: None,
        deep_link: Some(format!("/orders/{}", id)),
        created_at: "2025-03-01T09:00:00".to_string(),
        updated_at: "2025-03-01T09:00:00".to_string(),
    }
}

#[allow(dead_code)]
pub fn unread(id: &str) -> Notification {
    notification(id, NotificationStatus::Unread)
}

#[allow(dead_code)]
pub fn read(id: &str) -> Notification {
    notification(id, NotificationStatus::Read)
}

/// Settings with heart-beats disabled and a short handshake timeout.
#[allow(dead_code)]
pub fn fast_settings() -> ConnectionSettings {
    ConnectionSettings {
        reconnect_base_delay_ms: 3000,
        max_reconnect_attempts: 5,
        heartbeat_interval_ms: 0,
        handshake_timeout_ms: 200,
    }
}

#[allow(dead_code)]
pub fn ids(notifications: &[Notification]) -> Vec<&str> {
    notifications.iter().map(|n| n.id.as_str()).collect()
}
