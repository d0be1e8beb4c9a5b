//! Persistence layer modules.

pub mod db;
pub mod notification_repo;
pub mod request_repo;
pub mod schema;
pub mod state_repo;
pub mod ticket_repo;
pub mod user_repo;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{AppError, Result};

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Format a timestamp for storage.
///
/// Fixed microsecond precision keeps lexical and chronological order equal.
pub(crate) fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, naming `field` in the error.
pub(crate) fn from_db_time(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

/// Parse an optional stored timestamp.
pub(crate) fn from_db_time_opt(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| from_db_time(s, field)).transpose()
}
