//! User directory repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::user::{Role, User};
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for user records.
#[derive(Clone)]
pub struct UserRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    document: String,
    email: String,
    display_name: String,
    role: String,
    is_active: i64,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| AppError::Db(format!("invalid role: {}", self.role)))?;
        Ok(User {
            id: self.id,
            document: self.document,
            email: self.email,
            display_name: self.display_name,
            role,
            is_active: self.is_active != 0,
        })
    }
}

impl UserRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new user record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails (e.g. duplicate document).
    pub async fn create(&self, user: &User) -> Result<User> {
        sqlx::query(
            "INSERT INTO user_account (id, document, email, display_name, role, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&user.id)
        .bind(&user.document)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(i64::from(user.is_active))
        .execute(self.db.as_ref())
        .await?;

        Ok(user.clone())
    }

    /// Retrieve a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM user_account WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// Retrieve a user by document number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_document(&self, document: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM user_account WHERE document = ?1")
                .bind(document)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// List users holding `role`, active or not.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_role(&self, role: Role) -> Result<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT * FROM user_account WHERE role = ?1 ORDER BY display_name")
                .bind(role.as_str())
                .fetch_all(self.db.as_ref())
                .await?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    /// Activate or deactivate a user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no user has `id`.
    pub async fn set_active(&self, id: &str, is_active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE user_account SET is_active = ?1 WHERE id = ?2")
            .bind(i64::from(is_active))
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {id} not found")));
        }
        Ok(())
    }

    /// Delete a user; ticket references to them become `NULL`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_account WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }
}
