//! Technician-initiated ticket state transitions.
//!
//! [`plan`] decides what a requested move means without touching storage;
//! [`TransitionEngine`] runs it inside a transaction, writes the ticket and
//! audit records, then emits notifications once the transaction commits.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, info_span, warn, Instrument};

use crate::directory::UserDirectory;
use crate::models::notification::EventKind;
use crate::models::state::{self, State, StateCatalog};
use crate::models::state_change::StateChangeRequest;
use crate::models::ticket::Ticket;
use crate::models::user::User;
use crate::notify::{Notice, NotificationDispatcher, RecipientSpec};
use crate::persistence::db::Database;
use crate::persistence::request_repo::RequestRepo;
use crate::persistence::ticket_repo::TicketRepo;
use crate::{AppError, Result};

use super::policy::{self, Action};

/// Attempts before a repeatedly lost state race is reported.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// What a transition request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Move directly to `to` and record a self-approved audit entry.
    Apply {
        /// Target state id.
        to: i64,
    },
    /// Move to `via`, audit it, and open a pending request `via -> target`.
    Compound {
        /// Intermediate state the ticket moves to now.
        via: i64,
        /// State that awaits admin approval.
        target: i64,
    },
    /// Open a pending request for `to`; the ticket stays put.
    AwaitApproval {
        /// Requested state id.
        to: i64,
    },
}

/// Outcome reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransitionResult {
    /// The ticket is now in `new_state`.
    Applied {
        /// Code of the state the ticket moved to.
        new_state: String,
    },
    /// An admin must decide on `request_id`.
    PendingApproval {
        /// Identifier of the pending request.
        request_id: String,
    },
}

/// Evaluate the transition rules for a ticket currently in `current`.
///
/// `has_open_request` reports whether the ticket already holds a pending
/// request awaiting an admin.
///
/// # Errors
///
/// Returns `TicketFinalized`, `AwaitingApproval`, or `InvalidTransition`
/// when the move is refused, and `StateNotFound` if the catalog lacks a
/// required state.
pub fn plan(
    catalog: &StateCatalog,
    current: &State,
    target: &State,
    has_open_request: bool,
) -> Result<Plan> {
    // ── 1. Final states are frozen ───────────────────────
    if current.is_final {
        return Err(AppError::TicketFinalized(format!(
            "ticket is {} and accepts no further transitions",
            current.code
        )));
    }

    // ── 2. Locked while an admin decides ─────────────────
    if current.is(state::TRIAL_PENDING_APPROVAL) || has_open_request {
        return Err(AppError::AwaitingApproval(format!(
            "ticket in {} has a decision outstanding",
            current.code
        )));
    }

    // ── 3-4. Trial may only close through approval ───────
    if current.is(state::TRIAL) && target.is(state::CLOSED) {
        return Err(AppError::InvalidTransition(format!(
            "{} cannot move to {} without approval; request {} instead",
            current.code,
            target.code,
            state::TRIAL_PENDING_APPROVAL
        )));
    }
    if target.is(state::TRIAL_PENDING_APPROVAL) {
        if !current.is(state::TRIAL) {
            return Err(AppError::InvalidTransition(format!(
                "{} is only reachable from {}",
                target.code,
                state::TRIAL
            )));
        }
        let closed = catalog.require(state::CLOSED)?;
        return Ok(Plan::Compound {
            via: target.id,
            target: closed.id,
        });
    }

    // ── 5. Final targets need an admin ───────────────────
    if target.is_final {
        return Ok(Plan::AwaitApproval { to: target.id });
    }

    // ── 6. Direct move ───────────────────────────────────
    if target.id == current.id {
        return Err(AppError::InvalidTransition(format!(
            "ticket is already {}",
            current.code
        )));
    }
    if !target.is_active {
        return Err(AppError::InvalidTransition(format!(
            "{} is not an active state",
            target.code
        )));
    }
    Ok(Plan::Apply { to: target.id })
}

/// Committed effect of a transition, kept for notification.
enum Committed {
    Applied {
        ticket: Ticket,
        from: i64,
        audit: StateChangeRequest,
    },
    Pending {
        ticket: Ticket,
        request: StateChangeRequest,
    },
}

/// Validates and executes ticket state changes.
#[derive(Clone)]
pub struct TransitionEngine {
    db: Arc<Database>,
    catalog: Arc<StateCatalog>,
    directory: Arc<dyn UserDirectory>,
    dispatcher: NotificationDispatcher,
}

impl TransitionEngine {
    /// Create an engine.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        catalog: Arc<StateCatalog>,
        directory: Arc<dyn UserDirectory>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            catalog,
            directory,
            dispatcher,
        }
    }

    /// Move `ticket_id` to the state coded `to_code` on behalf of `actor_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ticket or actor ids, `NotAuthorized`
    /// unless the actor is the assigned technician, the rule errors of
    /// [`plan`], and `Db` on persistence failure (nothing is written).
    pub async fn request_transition(
        &self,
        ticket_id: &str,
        actor_id: &str,
        to_code: &str,
        reason: &str,
    ) -> Result<TransitionResult> {
        let span = info_span!("request_transition", ticket_id, actor_id, to = to_code);
        async move {
            let actor = self
                .directory
                .find_by_id(actor_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("user {actor_id} not found")))?;
            policy::ensure_active(&actor)?;
            policy::authorize(actor.role, Action::RequestTransition)?;
            let target = self.catalog.require(to_code)?;

            let committed = self.commit_with_retry(ticket_id, &actor, target, reason).await?;
            Ok(self.announce(committed, &actor).await)
        }
        .instrument(span)
        .await
    }

    async fn commit_with_retry(
        &self,
        ticket_id: &str,
        actor: &User,
        target: &State,
        reason: &str,
    ) -> Result<Committed> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut tx = self.db.begin().await?;
            if let Some(committed) = self.apply(&mut tx, ticket_id, actor, target, reason).await? {
                tx.commit().await?;
                return Ok(committed);
            }
            tx.rollback().await?;
            warn!(ticket_id, attempt, "ticket state changed concurrently; re-evaluating");
        }
        Err(AppError::InvalidState(format!(
            "ticket {ticket_id} kept changing while the transition was evaluated"
        )))
    }

    /// Evaluate and write one transition; `None` means the state moved underneath.
    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        ticket_id: &str,
        actor: &User,
        target: &State,
        reason: &str,
    ) -> Result<Option<Committed>> {
        if !TicketRepo::lock_in(conn, ticket_id).await? {
            return Err(AppError::NotFound(format!("ticket {ticket_id} not found")));
        }
        let mut ticket = TicketRepo::get_in(conn, ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ticket {ticket_id} not found")))?;
        policy::ensure_assigned(actor, &ticket)?;

        let current = self.catalog.require_id(ticket.state_id)?;
        let open = RequestRepo::find_pending_in(conn, ticket_id).await?;
        let now = Utc::now();

        match plan(&self.catalog, current, target, open.is_some())? {
            Plan::Apply { to } => {
                if !TicketRepo::update_state_in(conn, ticket_id, current.id, to, now).await? {
                    return Ok(None);
                }
                let audit = StateChangeRequest::applied(
                    ticket_id.to_owned(),
                    actor.id.clone(),
                    actor.id.clone(),
                    current.id,
                    to,
                    reason.to_owned(),
                    now,
                );
                RequestRepo::insert_in(conn, &audit).await?;
                let from = ticket.state_id;
                ticket.state_id = to;
                ticket.updated_at = now;
                Ok(Some(Committed::Applied {
                    ticket,
                    from,
                    audit,
                }))
            }
            Plan::Compound { via, target: awaiting } => {
                if !TicketRepo::update_state_in(conn, ticket_id, current.id, via, now).await? {
                    return Ok(None);
                }
                let audit = StateChangeRequest::applied(
                    ticket_id.to_owned(),
                    actor.id.clone(),
                    actor.id.clone(),
                    current.id,
                    via,
                    reason.to_owned(),
                    now,
                );
                RequestRepo::insert_in(conn, &audit).await?;
                let request = StateChangeRequest::pending(
                    ticket_id.to_owned(),
                    actor.id.clone(),
                    via,
                    awaiting,
                    reason.to_owned(),
                    now,
                );
                RequestRepo::insert_in(conn, &request).await?;
                ticket.state_id = via;
                ticket.updated_at = now;
                Ok(Some(Committed::Pending { ticket, request }))
            }
            Plan::AwaitApproval { to } => {
                let request = StateChangeRequest::pending(
                    ticket_id.to_owned(),
                    actor.id.clone(),
                    current.id,
                    to,
                    reason.to_owned(),
                    now,
                );
                RequestRepo::insert_in(conn, &request).await?;
                Ok(Some(Committed::Pending { ticket, request }))
            }
        }
    }

    /// Log and notify after commit; notification problems never fail the call.
    async fn announce(&self, committed: Committed, actor: &User) -> TransitionResult {
        match committed {
            Committed::Applied {
                ticket,
                from,
                audit,
            } => {
                let from_name = self.state_name(from);
                let to_name = self.state_name(ticket.state_id);
                info!(
                    ticket_id = %ticket.id,
                    request_id = %audit.id,
                    from = %from_name,
                    to = %to_name,
                    "ticket state applied"
                );
                let notice = Notice::new(
                    EventKind::StateChanged,
                    format!("Ticket \"{}\" is now {to_name}", ticket.title),
                    format!("{} moved the ticket from {from_name} to {to_name}.", actor.display_name),
                )
                .sent_by(actor.id.clone())
                .with_extra("request_id", audit.id.clone())
                .with_extra("from_state", from_name)
                .with_extra("to_state", to_name)
                .with_extra("reason", audit.reason.clone());
                self.dispatcher
                    .notify(&ticket, RecipientSpec::client_and_admin(), notice)
                    .await;

                let new_state = self
                    .catalog
                    .by_id(ticket.state_id)
                    .map_or_else(String::new, |s| s.code.clone());
                TransitionResult::Applied { new_state }
            }
            Committed::Pending { ticket, request } => {
                let from_name = self.state_name(request.from_state_id);
                let to_name = self.state_name(request.to_state_id);
                info!(
                    ticket_id = %ticket.id,
                    request_id = %request.id,
                    from = %from_name,
                    to = %to_name,
                    "approval requested"
                );
                let notice = Notice::new(
                    EventKind::ApprovalRequested,
                    format!("Approval needed for ticket \"{}\"", ticket.title),
                    format!(
                        "{} asks to move the ticket from {from_name} to {to_name}.",
                        actor.display_name
                    ),
                )
                .sent_by(actor.id.clone())
                .with_extra("request_id", request.id.clone())
                .with_extra("from_state", from_name)
                .with_extra("to_state", to_name)
                .with_extra("reason", request.reason.clone());
                self.dispatcher
                    .notify(&ticket, RecipientSpec::admins(), notice)
                    .await;

                TransitionResult::PendingApproval {
                    request_id: request.id,
                }
            }
        }
    }

    fn state_name(&self, id: i64) -> String {
        self.catalog
            .by_id(id)
            .map_or_else(|| id.to_string(), |s| s.name.clone())
    }
}
