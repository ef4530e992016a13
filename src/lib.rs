//! SmartMall notification client core
//!
//! Live push delivery over a STOMP websocket, reconciled with paginated REST
//! history into a single store that UI consumers observe through watch
//! channels.

pub mod config;
pub mod connection;
pub mod error;
pub mod facade;
pub mod notifications;
pub mod notifier;
pub mod reconcile;
pub mod registry;

// Re-export commonly used types for convenience
pub use connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use error::{NotifyError, Result};
pub use facade::{NotificationFacade, Session};
pub use notifications::{Notification, NotificationStatus, NotificationStore, StoreSnapshot};
pub use notifier::{BrowserNotifier, NotificationSurface, Permission, Toast};
pub use reconcile::ReconciliationEngine;
pub use registry::{PublishReport, Subscription, SubscriptionRegistry};
