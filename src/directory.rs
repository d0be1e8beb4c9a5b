//! User directory abstraction.
//!
//! The workflow components only need to look users up; account management
//! lives elsewhere. [`UserDirectory`] is the seam, and [`UserRepo`] is the
//! `SQLite`-backed implementation used by the service.

use std::future::Future;
use std::pin::Pin;

use crate::models::user::{Role, User};
use crate::persistence::user_repo::UserRepo;
use crate::Result;

/// Boxed future returned by directory lookups.
pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Read-only view of the users known to the helpdesk.
pub trait UserDirectory: Send + Sync {
    /// Find a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the backing store fails.
    fn find_by_id<'a>(&'a self, id: &'a str) -> DirectoryFuture<'a, Option<User>>;

    /// Find a user by document number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the backing store fails.
    fn find_by_document<'a>(&'a self, document: &'a str) -> DirectoryFuture<'a, Option<User>>;

    /// List every user holding `role`, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the backing store fails.
    fn list_by_role(&self, role: Role) -> DirectoryFuture<'_, Vec<User>>;
}

impl UserDirectory for UserRepo {
    fn find_by_id<'a>(&'a self, id: &'a str) -> DirectoryFuture<'a, Option<User>> {
        Box::pin(self.get_by_id(id))
    }

    fn find_by_document<'a>(&'a self, document: &'a str) -> DirectoryFuture<'a, Option<User>> {
        Box::pin(self.get_by_document(document))
    }

    fn list_by_role(&self, role: Role) -> DirectoryFuture<'_, Vec<User>> {
        Box::pin(UserRepo::list_by_role(self, role))
    }
}
