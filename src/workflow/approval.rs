//! Admin decisions on pending state change requests.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, info_span, Instrument};

use crate::directory::UserDirectory;
use crate::models::notification::EventKind;
use crate::models::state::{self, StateCatalog};
use crate::models::state_change::{RequestStatus, StateChangeRequest, ADMIN_APPROVAL_REASON};
use crate::models::ticket::Ticket;
use crate::models::user::User;
use crate::notify::{Notice, NotificationDispatcher, RecipientSpec};
use crate::persistence::db::Database;
use crate::persistence::request_repo::{RequestRepo, ResolutionStamp};
use crate::persistence::ticket_repo::TicketRepo;
use crate::{AppError, Result};

use super::policy::{self, Action};

/// An admin's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Apply the requested state.
    Approve,
    /// Decline the request.
    Reject {
        /// Explanation shown to the ticket's stakeholders.
        reason: String,
    },
}

/// Result of resolving a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// The request that was decided.
    pub request_id: String,
    /// Status stamped on the request.
    pub status: RequestStatus,
    /// Code of the ticket's state after the decision.
    pub ticket_state: String,
    /// Audit record written for a rejected closure, if any.
    pub audit_request_id: Option<String>,
}

struct Resolved {
    ticket: Ticket,
    request: StateChangeRequest,
    resolution: Resolution,
}

/// Resolves and lists requests that need an admin.
#[derive(Clone)]
pub struct ApprovalWorkflow {
    db: Arc<Database>,
    catalog: Arc<StateCatalog>,
    requests: RequestRepo,
    directory: Arc<dyn UserDirectory>,
    dispatcher: NotificationDispatcher,
}

impl ApprovalWorkflow {
    /// Create a workflow.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        catalog: Arc<StateCatalog>,
        directory: Arc<dyn UserDirectory>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            requests: RequestRepo::new(Arc::clone(&db)),
            db,
            catalog,
            directory,
            dispatcher,
        }
    }

    /// Approve or reject the open request of `ticket_id`.
    ///
    /// The request stamp, state write, and any audit record commit together.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, `NotAuthorized` unless the caller
    /// is an active admin, `InvalidState` when the ticket has nothing to
    /// decide (including a second resolution of the same request), and
    /// `Db` on persistence failure.
    pub async fn resolve(
        &self,
        ticket_id: &str,
        admin_id: &str,
        decision: Decision,
    ) -> Result<Resolution> {
        let span = info_span!("resolve_approval", ticket_id, admin_id);
        async move {
            let admin = self.require_admin(admin_id, Action::ResolveApproval).await?;

            let mut tx = self.db.begin().await?;
            let resolved = self.decide(&mut tx, ticket_id, &admin, &decision).await?;
            tx.commit().await?;

            info!(
                request_id = %resolved.resolution.request_id,
                status = resolved.resolution.status.as_str(),
                ticket_state = %resolved.resolution.ticket_state,
                "approval resolved"
            );
            self.announce(&resolved, &admin, &decision).await;
            Ok(resolved.resolution)
        }
        .instrument(span)
        .await
    }

    /// Open requests across all tickets, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `NotAuthorized` for a caller who is not an
    /// active admin, and `Db` if the query fails.
    pub async fn list_pending(&self, admin_id: &str) -> Result<Vec<StateChangeRequest>> {
        self.require_admin(admin_id, Action::ListPendingApprovals)
            .await?;
        self.requests.list_pending().await
    }

    async fn require_admin(&self, admin_id: &str, action: Action) -> Result<User> {
        let admin = self
            .directory
            .find_by_id(admin_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {admin_id} not found")))?;
        policy::ensure_active(&admin)?;
        policy::authorize(admin.role, action)?;
        Ok(admin)
    }

    async fn decide(
        &self,
        conn: &mut SqliteConnection,
        ticket_id: &str,
        admin: &User,
        decision: &Decision,
    ) -> Result<Resolved> {
        if !TicketRepo::lock_in(conn, ticket_id).await? {
            return Err(AppError::NotFound(format!("ticket {ticket_id} not found")));
        }
        let mut ticket = TicketRepo::get_in(conn, ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ticket {ticket_id} not found")))?;
        let current = self.catalog.require_id(ticket.state_id)?;
        let awaiting_closure = current.is(state::TRIAL_PENDING_APPROVAL);

        let mut request = RequestRepo::find_pending_in(conn, ticket_id)
            .await?
            .ok_or_else(|| {
                AppError::InvalidState(format!(
                    "ticket {ticket_id} in {} has no pending request",
                    current.code
                ))
            })?;

        let now = Utc::now();
        let (status, rejection_reason, reason) = match decision {
            Decision::Approve => (
                RequestStatus::Approved,
                None,
                Some(ADMIN_APPROVAL_REASON),
            ),
            Decision::Reject { reason } => {
                (RequestStatus::Rejected, Some(reason.as_str()), None)
            }
        };
        let stamp = ResolutionStamp {
            status,
            resolved_by: &admin.id,
            resolved_at: now,
            rejection_reason,
            reason,
        };
        if !RequestRepo::resolve_in(conn, &request.id, &stamp).await? {
            return Err(AppError::InvalidState(format!(
                "request {} was already resolved",
                request.id
            )));
        }
        request.status = status;
        request.approved_by = Some(admin.id.clone());
        request.approved_at = Some(now);
        request.rejection_reason = rejection_reason.map(str::to_owned);
        if let Some(reason) = reason {
            request.reason = reason.to_owned();
        }

        let next_state = match (decision, awaiting_closure) {
            (Decision::Approve, _) => Some(request.to_state_id),
            (Decision::Reject { .. }, true) => Some(self.catalog.require(state::IN_REPAIR)?.id),
            (Decision::Reject { .. }, false) => None,
        };

        let mut audit_request_id = None;
        if let Some(next) = next_state {
            if !TicketRepo::update_state_in(conn, ticket_id, current.id, next, now).await? {
                return Err(AppError::InvalidState(format!(
                    "ticket {ticket_id} left {} during resolution",
                    current.code
                )));
            }
            if let Decision::Reject { reason } = decision {
                let audit = StateChangeRequest::applied(
                    ticket_id.to_owned(),
                    admin.id.clone(),
                    admin.id.clone(),
                    current.id,
                    next,
                    reason.clone(),
                    now,
                );
                RequestRepo::insert_in(conn, &audit).await?;
                audit_request_id = Some(audit.id);
            }
            ticket.state_id = next;
            ticket.updated_at = now;
        }

        let ticket_state = self.catalog.require_id(ticket.state_id)?.code.clone();
        Ok(Resolved {
            resolution: Resolution {
                request_id: request.id.clone(),
                status,
                ticket_state,
                audit_request_id,
            },
            ticket,
            request,
        })
    }

    async fn announce(&self, resolved: &Resolved, admin: &User, decision: &Decision) {
        let ticket = &resolved.ticket;
        let state_name = self
            .catalog
            .by_id(ticket.state_id)
            .map_or_else(|| ticket.state_id.to_string(), |s| s.name.clone());

        let notice = match decision {
            Decision::Approve => {
                let finalized = self
                    .catalog
                    .by_id(ticket.state_id)
                    .is_some_and(|s| s.is_final);
                let event = if finalized {
                    EventKind::TicketFinalized
                } else {
                    EventKind::StateChanged
                };
                Notice::new(
                    event,
                    format!("Ticket \"{}\" is now {state_name}", ticket.title),
                    format!("{} approved the request.", admin.display_name),
                )
                .with_extra("resolution_note", ADMIN_APPROVAL_REASON)
            }
            Decision::Reject { reason } => Notice::new(
                EventKind::ApprovalRejected,
                format!("Request for ticket \"{}\" was rejected", ticket.title),
                format!(
                    "{} rejected the request; the ticket is {state_name}.",
                    admin.display_name
                ),
            )
            .with_extra("rejection_reason", reason.clone()),
        }
        .sent_by(admin.id.clone())
        .with_extra("request_id", resolved.request.id.clone())
        .with_extra("to_state", state_name);

        self.dispatcher
            .notify(ticket, RecipientSpec::stakeholders(), notice)
            .await;
    }
}
