//! OS-level notification side effects.
//!
//! The surface is a sink: the notifier never reads anything back from it
//! except the permission state, and every failure is logged and dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::notifications::Notification;

pub const DEFAULT_ICON: &str = "/logo.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not asked yet.
    Default,
}

/// What gets shown for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Replaces an earlier toast with the same tag.
    pub tag: String,
}

impl Toast {
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            title: notification.title.clone(),
            body: notification.message.clone(),
            icon: notification
                .image_url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            badge: DEFAULT_ICON.to_string(),
            tag: notification.id.clone(),
        }
    }
}

#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    fn permission(&self) -> Permission;

    /// Prompt the user. Only called while the permission is `Default`.
    async fn request_permission(&self) -> anyhow::Result<Permission>;

    fn show(&self, toast: &Toast) -> anyhow::Result<()>;

    /// Navigate to a deep link after the user activated a toast.
    fn open(&self, deep_link: &str) -> anyhow::Result<()>;
}

pub struct BrowserNotifier {
    surface: Arc<dyn NotificationSurface>,
    permission_requested: AtomicBool,
}

impl BrowserNotifier {
    pub fn new(surface: Arc<dyn NotificationSurface>) -> Self {
        Self {
            surface,
            permission_requested: AtomicBool::new(false),
        }
    }

    /// Ask for permission at most once per notifier. Errors count as a
    /// denial for this session.
    pub async fn request_permission_once(&self) -> Permission {
        let current = self.surface.permission();
        if current != Permission::Default {
            return current;
        }
        if self.permission_requested.swap(true, Ordering::AcqRel) {
            debug!("Notification permission already requested this session");
            return current;
        }

        match self.surface.request_permission().await {
            Ok(permission) => {
                info!("Notification permission: {:?}", permission);
                permission
            }
            Err(e) => {
                warn!("Failed to request notification permission: {:#}", e);
                Permission::Denied
            }
        }
    }

    /// Announce a live push if permission is granted. History loads never
    /// come through here. Returns whether a toast was shown.
    pub fn notify(&self, notification: &Notification) -> bool {
        if self.surface.permission() != Permission::Granted {
            return false;
        }

        match self.surface.show(&Toast::from_notification(notification)) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to show notification {}: {:#}",
                    notification.id, e
                );
                false
            }
        }
    }

    /// Handle a click on the toast for `notification`.
    pub fn activate(&self, notification: &Notification) -> bool {
        let Some(link) = notification.deep_link.as_deref().filter(|l| !l.is_empty()) else {
            return false;
        };
        match self.surface.open(link) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to open deep link {}: {:#}", link, e);
                false
            }
        }
    }
}

/// Surface that writes toasts to the log. Used by the CLI watcher.
#[derive(Debug, Default)]
pub struct TracingSurface;

#[async_trait]
impl NotificationSurface for TracingSurface {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> anyhow::Result<Permission> {
        Ok(Permission::Granted)
    }

    fn show(&self, toast: &Toast) -> anyhow::Result<()> {
        info!("[{}] {}: {}", toast.tag, toast.title, toast.body);
        Ok(())
    }

    fn open(&self, deep_link: &str) -> anyhow::Result<()> {
        info!("Open {}", deep_link);
        Ok(())
    }
}
