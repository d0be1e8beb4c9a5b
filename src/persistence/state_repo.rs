//! State catalog repository.

use std::sync::Arc;

use crate::models::state::{State, StateCatalog};
use crate::Result;

use super::db::Database;

/// Read-only access to the seeded `state` table.
#[derive(Clone)]
pub struct StateRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct StateRow {
    id: i64,
    code: String,
    name: String,
    is_active: i64,
    is_final: i64,
}

impl From<StateRow> for State {
    fn from(row: StateRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            is_active: row.is_active != 0,
            is_final: row.is_final != 0,
        }
    }
}

impl StateRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// List all states in ordinal order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<State>> {
        let rows: Vec<StateRow> = sqlx::query_as("SELECT * FROM state ORDER BY id ASC")
            .fetch_all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(State::from).collect())
    }

    /// Load the catalog used by the workflow components.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on query failure, or `AppError::StateNotFound`
    /// if the table was never seeded.
    pub async fn load_catalog(&self) -> Result<StateCatalog> {
        StateCatalog::new(self.list_all().await?)
    }
}
