//! Role-based authorization for workflow actions.
//!
//! One pure function decides which roles may perform which actions.
//! Ticket-specific checks (assignment, active account) sit beside it so
//! the engine and approval workflow call the same helpers.

use crate::models::ticket::Ticket;
use crate::models::user::{Role, User};
use crate::{AppError, Result};

/// Operations guarded by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move a ticket to another state.
    RequestTransition,
    /// Approve or reject a pending state change.
    ResolveApproval,
    /// See the queue of pending state changes.
    ListPendingApprovals,
    /// Read and acknowledge one's own notifications.
    ReadOwnNotifications,
    /// See a ticket's state history.
    ViewTimeline,
}

impl Action {
    fn label(self) -> &'static str {
        match self {
            Self::RequestTransition => "request transitions",
            Self::ResolveApproval => "resolve approvals",
            Self::ListPendingApprovals => "list pending approvals",
            Self::ReadOwnNotifications => "read notifications",
            Self::ViewTimeline => "view timelines",
        }
    }
}

/// Decide whether `role` may perform `action`.
///
/// # Errors
///
/// Returns `AppError::NotAuthorized` when the role lacks the permission.
pub fn authorize(role: Role, action: Action) -> Result<()> {
    let allowed = match action {
        Action::RequestTransition => role == Role::Technician,
        Action::ResolveApproval | Action::ListPendingApprovals => role == Role::Admin,
        Action::ReadOwnNotifications | Action::ViewTimeline => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::NotAuthorized(format!(
            "role {} may not {}",
            role.as_str(),
            action.label()
        )))
    }
}

/// Reject deactivated accounts.
///
/// # Errors
///
/// Returns `AppError::NotAuthorized` if the user is inactive.
pub fn ensure_active(user: &User) -> Result<()> {
    if user.is_active {
        Ok(())
    } else {
        Err(AppError::NotAuthorized(format!(
            "user {} is inactive",
            user.id
        )))
    }
}

/// Require `user` to be the technician assigned to `ticket`.
///
/// # Errors
///
/// Returns `AppError::NotAuthorized` otherwise.
pub fn ensure_assigned(user: &User, ticket: &Ticket) -> Result<()> {
    if ticket.technician_id.as_deref() == Some(user.id.as_str()) {
        Ok(())
    } else {
        Err(AppError::NotAuthorized(format!(
            "user {} is not the technician assigned to ticket {}",
            user.id, ticket.id
        )))
    }
}
