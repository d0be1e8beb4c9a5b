//! Per-user view of in-app notifications.

use chrono::Utc;
use tracing::info;

use crate::models::notification::Notification;
use crate::persistence::notification_repo::NotificationRepo;
use crate::{AppError, Result};

/// Inbox operations scoped to the calling user.
#[derive(Clone)]
pub struct NotificationInbox {
    repo: NotificationRepo,
}

impl NotificationInbox {
    /// Create an inbox over `repo`.
    #[must_use]
    pub fn new(repo: NotificationRepo) -> Self {
        Self { repo }
    }

    /// The user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        self.repo.list_for_user(user_id, unread_only).await
    }

    /// Mark one of the user's notifications read.
    ///
    /// Repeated calls are no-ops and keep the first `read_at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the notification does not exist and
    /// `AppError::NotAuthorized` if it belongs to someone else.
    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<Notification> {
        let notification = self
            .repo
            .get_by_id(notification_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("notification {notification_id} not found"))
            })?;
        if notification.user_id != user_id {
            return Err(AppError::NotAuthorized(format!(
                "notification {notification_id} belongs to another user"
            )));
        }

        if self.repo.mark_read(notification_id, Utc::now()).await? {
            info!(notification_id, user_id, "notification marked read");
        }
        self.repo.get_by_id(notification_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("notification {notification_id} not found"))
        })
    }

    /// Mark every unread notification of the user read; returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let updated = self.repo.mark_all_read(user_id, Utc::now()).await?;
        info!(user_id, updated, "notifications marked read");
        Ok(updated)
    }

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn unread_count(&self, user_id: &str) -> Result<i64> {
        self.repo.unread_count(user_id).await
    }
}
