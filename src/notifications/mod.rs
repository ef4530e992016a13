//! User notifications: models, REST collaborator and the client-side store.

mod api;
mod cache;
mod models;
mod store;

#[cfg(feature = "mock")]
pub use api::MockNotificationApi;
pub use api::{NotificationApi, RestNotificationApi};
pub use cache::NotificationCache;
pub use models::{
    decode_body, MarkAllReadResult, Notification, NotificationPage, NotificationStatus,
    UnreadCount,
};
pub use store::{NotificationStore, StoreSnapshot};

#[cfg(test)]
pub(crate) use models::fixtures;
