//! Notification and notification type repository for `SQLite` persistence.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::notification::{Notification, NotificationStatus, NotificationType};
use crate::{AppError, Result};

use super::db::Database;
use super::{from_db_time, from_db_time_opt, to_db_time};

/// Repository for notification records and their types.
#[derive(Clone)]
pub struct NotificationRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    recipients: String,
    ticket_id: Option<String>,
    type_code: String,
    title: String,
    message: String,
    sent_by: Option<String>,
    status: String,
    created_at: String,
    sent_at: Option<String>,
    read_at: Option<String>,
    extra_data: String,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification> {
        let status = NotificationStatus::parse(&self.status).ok_or_else(|| {
            AppError::Db(format!("invalid notification status: {}", self.status))
        })?;
        let recipients: BTreeSet<String> = serde_json::from_str(&self.recipients)?;
        let extra_data: Map<String, Value> = serde_json::from_str(&self.extra_data)?;

        Ok(Notification {
            created_at: from_db_time(&self.created_at, "created_at")?,
            sent_at: from_db_time_opt(self.sent_at.as_deref(), "sent_at")?,
            read_at: from_db_time_opt(self.read_at.as_deref(), "read_at")?,
            id: self.id,
            user_id: self.user_id,
            recipients,
            ticket_id: self.ticket_id,
            type_code: self.type_code,
            title: self.title,
            message: self.message,
            sent_by: self.sent_by,
            status,
            extra_data,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TypeRow {
    code: String,
    name: String,
    description: String,
    send_to_client: i64,
    send_to_technician: i64,
    send_to_admin: i64,
    is_active: i64,
}

impl From<TypeRow> for NotificationType {
    fn from(row: TypeRow) -> Self {
        Self {
            code: row.code,
            name: row.name,
            description: row.description,
            send_to_client: row.send_to_client != 0,
            send_to_technician: row.send_to_technician != 0,
            send_to_admin: row.send_to_admin != 0,
            is_active: row.is_active != 0,
        }
    }
}

impl NotificationRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Retrieve a notification type by code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_type(&self, code: &str) -> Result<Option<NotificationType>> {
        let row: Option<TypeRow> =
            sqlx::query_as("SELECT * FROM notification_type WHERE code = ?1")
                .bind(code)
                .fetch_optional(self.db.as_ref())
                .await?;
        Ok(row.map(NotificationType::from))
    }

    /// Return the stored type for `candidate.code`, inserting `candidate` if absent.
    ///
    /// An existing row always wins, so routing flags are fixed by the first
    /// creation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert or read-back fails.
    pub async fn get_or_create_type(
        &self,
        candidate: &NotificationType,
    ) -> Result<NotificationType> {
        sqlx::query(
            "INSERT OR IGNORE INTO notification_type (code, name, description, send_to_client,
             send_to_technician, send_to_admin, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&candidate.code)
        .bind(&candidate.name)
        .bind(&candidate.description)
        .bind(i64::from(candidate.send_to_client))
        .bind(i64::from(candidate.send_to_technician))
        .bind(i64::from(candidate.send_to_admin))
        .bind(i64::from(candidate.is_active))
        .execute(self.db.as_ref())
        .await?;

        self.get_type(&candidate.code).await?.ok_or_else(|| {
            AppError::Db(format!("notification type {} vanished", candidate.code))
        })
    }

    /// Insert a new notification record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, notification: &Notification) -> Result<Notification> {
        let recipients = serde_json::to_string(&notification.recipients)?;
        let extra_data = serde_json::to_string(&notification.extra_data)?;

        sqlx::query(
            "INSERT INTO notification (id, user_id, recipients, ticket_id, type_code, title,
             message, sent_by, status, created_at, sent_at, read_at, extra_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(&recipients)
        .bind(&notification.ticket_id)
        .bind(&notification.type_code)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.sent_by)
        .bind(notification.status.as_str())
        .bind(to_db_time(notification.created_at))
        .bind(notification.sent_at.map(to_db_time))
        .bind(notification.read_at.map(to_db_time))
        .bind(&extra_data)
        .execute(self.db.as_ref())
        .await?;

        Ok(notification.clone())
    }

    /// Retrieve a notification by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Notification>> {
        let row: Option<NotificationRow> =
            sqlx::query_as("SELECT * FROM notification WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(NotificationRow::into_notification).transpose()
    }

    /// List a user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = if unread_only {
            sqlx::query_as(
                "SELECT * FROM notification
                 WHERE user_id = ?1 AND status IN ('pending','sent')
                 ORDER BY created_at DESC, rowid DESC",
            )
            .bind(user_id)
            .fetch_all(self.db.as_ref())
            .await?
        } else {
            sqlx::query_as(
                "SELECT * FROM notification WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )
            .bind(user_id)
            .fetch_all(self.db.as_ref())
            .await?
        };

        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    /// List every notification recorded for a ticket, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_ticket(&self, ticket_id: &str) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notification WHERE ticket_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(ticket_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    /// Mark one notification read if it is still unread.
    ///
    /// Returns `false` when the notification was already read or failed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_read(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notification SET status = 'read', read_at = ?1
             WHERE id = ?2 AND status IN ('pending','sent')",
        )
        .bind(to_db_time(now))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Mark every unread notification of a user read.
    ///
    /// Returns the number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_all_read(&self, user_id: &str, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notification SET status = 'read', read_at = ?1
             WHERE user_id = ?2 AND status IN ('pending','sent')",
        )
        .bind(to_db_time(now))
        .bind(user_id)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    /// Count a user's unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn unread_count(&self, user_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification WHERE user_id = ?1 AND status IN ('pending','sent')",
        )
        .bind(user_id)
        .fetch_one(self.db.as_ref())
        .await?;

        Ok(count)
    }
}
