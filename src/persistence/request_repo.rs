//! State change request repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::state_change::{RequestStatus, StateChangeRequest};
use crate::{AppError, Result};

use super::db::Database;
use super::{from_db_time, from_db_time_opt, to_db_time};

/// Repository wrapper around `SQLite` for state change requests.
#[derive(Clone)]
pub struct RequestRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct RequestRow {
    id: String,
    ticket_id: String,
    requested_by: String,
    from_state_id: i64,
    to_state_id: i64,
    status: String,
    reason: String,
    created_at: String,
    approved_by: Option<String>,
    approved_at: Option<String>,
    rejection_reason: Option<String>,
}

impl RequestRow {
    fn into_request(self) -> Result<StateChangeRequest> {
        let status = RequestStatus::parse(&self.status)
            .ok_or_else(|| AppError::Db(format!("invalid request status: {}", self.status)))?;
        Ok(StateChangeRequest {
            created_at: from_db_time(&self.created_at, "created_at")?,
            approved_at: from_db_time_opt(self.approved_at.as_deref(), "approved_at")?,
            id: self.id,
            ticket_id: self.ticket_id,
            requested_by: self.requested_by,
            from_state_id: self.from_state_id,
            to_state_id: self.to_state_id,
            status,
            reason: self.reason,
            approved_by: self.approved_by,
            rejection_reason: self.rejection_reason,
        })
    }
}

/// Resolution stamp applied to a pending request.
#[derive(Debug, Clone)]
pub struct ResolutionStamp<'a> {
    /// Final status; must not be `Pending`.
    pub status: RequestStatus,
    /// Resolving admin.
    pub resolved_by: &'a str,
    /// Resolution time.
    pub resolved_at: DateTime<Utc>,
    /// Admin reason, recorded on rejection.
    pub rejection_reason: Option<&'a str>,
    /// Replacement for the request's `reason`; `None` keeps the original.
    pub reason: Option<&'a str>,
}

impl RequestRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a request on an existing connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert_in(conn: &mut SqliteConnection, request: &StateChangeRequest) -> Result<()> {
        sqlx::query(
            "INSERT INTO state_change_request (id, ticket_id, requested_by, from_state_id,
             to_state_id, status, reason, created_at, approved_by, approved_at, rejection_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&request.id)
        .bind(&request.ticket_id)
        .bind(&request.requested_by)
        .bind(request.from_state_id)
        .bind(request.to_state_id)
        .bind(request.status.as_str())
        .bind(&request.reason)
        .bind(to_db_time(request.created_at))
        .bind(&request.approved_by)
        .bind(request.approved_at.map(to_db_time))
        .bind(&request.rejection_reason)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Retrieve a request by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<StateChangeRequest>> {
        let row: Option<RequestRow> =
            sqlx::query_as("SELECT * FROM state_change_request WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(RequestRow::into_request).transpose()
    }

    /// The oldest open request for a ticket, read inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_pending_in(
        conn: &mut SqliteConnection,
        ticket_id: &str,
    ) -> Result<Option<StateChangeRequest>> {
        let row: Option<RequestRow> = sqlx::query_as(
            "SELECT * FROM state_change_request
             WHERE ticket_id = ?1 AND status = 'pending'
             ORDER BY created_at ASC, rowid ASC LIMIT 1",
        )
        .bind(ticket_id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(RequestRow::into_request).transpose()
    }

    /// The oldest open request for a ticket.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_pending(&self, ticket_id: &str) -> Result<Option<StateChangeRequest>> {
        let mut conn = self.db.acquire().await?;
        Self::find_pending_in(&mut conn, ticket_id).await
    }

    /// Stamp a pending request with its resolution.
    ///
    /// Only lands while the request is still pending; returns `false` if it
    /// was already resolved.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn resolve_in(
        conn: &mut SqliteConnection,
        id: &str,
        stamp: &ResolutionStamp<'_>,
    ) -> Result<bool> {
        if stamp.status == RequestStatus::Pending {
            return Err(AppError::InvalidState(
                "a resolution cannot return a request to pending".into(),
            ));
        }
        let result = sqlx::query(
            "UPDATE state_change_request
             SET status = ?1, approved_by = ?2, approved_at = ?3, rejection_reason = ?4,
                 reason = COALESCE(?5, reason)
             WHERE id = ?6 AND status = 'pending'",
        )
        .bind(stamp.status.as_str())
        .bind(stamp.resolved_by)
        .bind(to_db_time(stamp.resolved_at))
        .bind(stamp.rejection_reason)
        .bind(stamp.reason)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All requests for a ticket in creation order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_for_ticket(&self, ticket_id: &str) -> Result<Vec<StateChangeRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT * FROM state_change_request WHERE ticket_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(ticket_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(RequestRow::into_request).collect()
    }

    /// Approved requests for a ticket ordered by approval time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_approved_for_ticket(
        &self,
        ticket_id: &str,
    ) -> Result<Vec<StateChangeRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT * FROM state_change_request
             WHERE ticket_id = ?1 AND status = 'approved'
             ORDER BY approved_at ASC, rowid ASC",
        )
        .bind(ticket_id)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(RequestRow::into_request).collect()
    }

    /// All open requests across tickets, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_pending(&self) -> Result<Vec<StateChangeRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            "SELECT * FROM state_change_request WHERE status = 'pending'
             ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(RequestRow::into_request).collect()
    }
}
