//! REST collaborator for persisted notifications.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::models::{decode_body, MarkAllReadResult, NotificationPage, UnreadCount};
use crate::error::{NotifyError, Result};

/// Operations the client needs from the notification backend.
///
/// Every call may fail or race with pushes; callers decide how to recover.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// `GET /notifications?page={page}&size={size}`
    async fn list_page(&self, page: u32, size: u32) -> Result<NotificationPage>;

    /// `GET /notifications/unread?page={page}&size={size}`
    async fn list_unread(&self, page: u32, size: u32) -> Result<NotificationPage>;

    /// `GET /notifications/unread/count`
    async fn unread_count(&self) -> Result<usize>;

    /// `PUT /notifications/{id}/read`
    async fn mark_read(&self, id: &str) -> Result<()>;

    /// `PUT /notifications/read-all`
    async fn mark_all_read(&self) -> Result<MarkAllReadResult>;

    /// `DELETE /notifications/{id}`
    async fn delete(&self, id: &str) -> Result<()>;

    /// `DELETE /notifications/all`
    async fn delete_all(&self) -> Result<()>;
}

/// Bearer-authenticated HTTP implementation of [`NotificationApi`].
pub struct RestNotificationApi {
    http_client: Client,
    base_url: String,
    token: String,
}

impl RestNotificationApi {
    /// Create a client rooted at `base_url` (e.g. `http://localhost:8080/api/v1`).
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            http_client,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated request and return the body of a 2xx response.
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("Notification API rejected credentials: {}", status);
            return Err(NotifyError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        if !status.is_success() {
            warn!("Notification API error: {} {}", status, body);
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body
            };
            return Err(NotifyError::Rest {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        Ok(decode_body(&body)?)
    }
}

#[async_trait]
impl NotificationApi for RestNotificationApi {
    async fn list_page(&self, page: u32, size: u32) -> Result<NotificationPage> {
        debug!("Fetching notifications page {} (size {})", page, size);
        let request = self
            .http_client
            .get(self.url("/notifications"))
            .query(&[("page", page), ("size", size)]);
        self.get_json(request).await
    }

    async fn list_unread(&self, page: u32, size: u32) -> Result<NotificationPage> {
        let request = self
            .http_client
            .get(self.url("/notifications/unread"))
            .query(&[("page", page), ("size", size)]);
        self.get_json(request).await
    }

    async fn unread_count(&self) -> Result<usize> {
        let request = self.http_client.get(self.url("/notifications/unread/count"));
        let count: UnreadCount = self.get_json(request).await?;
        Ok(count.count)
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        let path = format!("/notifications/{}/read", urlencoding::encode(id));
        self.send(self.http_client.put(self.url(&path))).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<MarkAllReadResult> {
        let request = self.http_client.put(self.url("/notifications/read-all"));
        self.get_json(request).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = format!("/notifications/{}", urlencoding::encode(id));
        self.send(self.http_client.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.send(self.http_client.delete(self.url("/notifications/all")))
            .await?;
        Ok(())
    }
}
