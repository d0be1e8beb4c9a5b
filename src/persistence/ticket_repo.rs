//! Ticket repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::ticket::Ticket;
use crate::{AppError, Result};

use super::db::Database;
use super::{from_db_time, to_db_time};

/// Repository wrapper around `SQLite` for ticket records.
#[derive(Clone)]
pub struct TicketRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct TicketRow {
    id: String,
    admin_id: Option<String>,
    technician_id: Option<String>,
    client_id: Option<String>,
    state_id: i64,
    title: String,
    description: String,
    equipment: String,
    created_at: String,
    updated_at: String,
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket> {
        Ok(Ticket {
            created_at: from_db_time(&self.created_at, "created_at")?,
            updated_at: from_db_time(&self.updated_at, "updated_at")?,
            id: self.id,
            admin_id: self.admin_id,
            technician_id: self.technician_id,
            client_id: self.client_id,
            state_id: self.state_id,
            title: self.title,
            description: self.description,
            equipment: self.equipment,
        })
    }
}

impl TicketRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new ticket record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, ticket: &Ticket) -> Result<Ticket> {
        sqlx::query(
            "INSERT INTO ticket (id, admin_id, technician_id, client_id, state_id, title,
             description, equipment, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&ticket.id)
        .bind(&ticket.admin_id)
        .bind(&ticket.technician_id)
        .bind(&ticket.client_id)
        .bind(ticket.state_id)
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(&ticket.equipment)
        .bind(to_db_time(ticket.created_at))
        .bind(to_db_time(ticket.updated_at))
        .execute(self.db.as_ref())
        .await?;

        Ok(ticket.clone())
    }

    /// Retrieve a ticket by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Ticket>> {
        let mut conn = self.db.acquire().await?;
        Self::get_in(&mut conn, id).await
    }

    /// Retrieve a ticket or fail with `AppError::NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the ticket does not exist.
    pub async fn require(&self, id: &str) -> Result<Ticket> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ticket {id} not found")))
    }

    /// Retrieve a ticket on an existing connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> Result<Option<Ticket>> {
        let row: Option<TicketRow> = sqlx::query_as("SELECT * FROM ticket WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(TicketRow::into_ticket).transpose()
    }

    /// Take the database write lock for a ticket inside a transaction.
    ///
    /// Issued as the first statement of a transition so concurrent writers
    /// queue behind each other instead of failing on a lock upgrade.
    /// Returns `false` if the ticket does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn lock_in(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE ticket SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a ticket from `expected_state_id` to `new_state_id`.
    ///
    /// The write only lands if the ticket is still in `expected_state_id`;
    /// returns `false` when another writer changed the state first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn update_state_in(
        conn: &mut SqliteConnection,
        id: &str,
        expected_state_id: i64,
        new_state_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE ticket SET state_id = ?1, updated_at = ?2 WHERE id = ?3 AND state_id = ?4",
        )
        .bind(new_state_id)
        .bind(to_db_time(now))
        .bind(id)
        .bind(expected_state_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
