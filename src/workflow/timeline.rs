//! Chronological state history rebuilt from approved requests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use crate::directory::UserDirectory;
use crate::models::state::{self, State, StateCatalog};
use crate::models::state_change::StateChangeRequest;
use crate::models::ticket::Ticket;
use crate::persistence::request_repo::RequestRepo;
use crate::persistence::ticket_repo::TicketRepo;
use crate::{AppError, Result};

use super::policy::{self, Action};

/// One state a ticket passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// Ordinal id of the state.
    pub state_id: i64,
    /// Display name of the state.
    pub state_name: String,
    /// When the ticket entered the state.
    pub date: DateTime<Utc>,
    /// The state is still awaiting an admin decision.
    pub pending: bool,
}

impl TimelineEntry {
    fn at(state: &State, date: DateTime<Utc>) -> Self {
        Self {
            state_id: state.id,
            state_name: state.name.clone(),
            date,
            pending: false,
        }
    }
}

/// Rebuild the history of `ticket`.
///
/// `approved` must hold the ticket's approved requests ordered by approval
/// time; `pending` is its open request, if any. States skipped between two
/// recorded moves are filled in at evenly spaced instants.
#[must_use]
pub fn build_timeline(
    catalog: &StateCatalog,
    ticket: &Ticket,
    approved: &[StateChangeRequest],
    pending: Option<&StateChangeRequest>,
) -> Vec<TimelineEntry> {
    let initial = catalog.initial();
    let mut entries = vec![TimelineEntry::at(initial, ticket.created_at)];
    let mut ordinal = initial.id;
    let mut last_date = ticket.created_at;

    for request in approved {
        let date = request.approved_at.unwrap_or(request.created_at);

        if request.from_state_id > ordinal {
            let missing: Vec<i64> = ((ordinal + 1)..=request.from_state_id).collect();
            let slots = i64::try_from(missing.len() + 1).unwrap_or(i64::MAX);
            let span_ms = (date - last_date).num_milliseconds();
            for (step, id) in (1_i64..).zip(missing) {
                let Some(state) = catalog.by_id(id) else {
                    warn!(state_id = id, ticket_id = %ticket.id, "state missing from catalog; skipped");
                    continue;
                };
                let offset = Duration::milliseconds(span_ms.saturating_mul(step) / slots);
                entries.push(TimelineEntry::at(state, last_date + offset));
            }
        }

        match catalog.by_id(request.to_state_id) {
            Some(state) => entries.push(TimelineEntry::at(state, date)),
            None => warn!(
                state_id = request.to_state_id,
                ticket_id = %ticket.id,
                "state missing from catalog; skipped"
            ),
        }
        ordinal = request.to_state_id;
        last_date = date;
    }

    let awaiting = catalog
        .by_id(ticket.state_id)
        .filter(|s| s.is(state::TRIAL_PENDING_APPROVAL));
    if let (Some(state), Some(request)) = (awaiting, pending) {
        if entries.last().is_some_and(|e| e.state_id == state.id) {
            entries.pop();
        }
        entries.push(TimelineEntry {
            pending: true,
            ..TimelineEntry::at(state, request.created_at)
        });
    }

    entries.sort_by_key(|e| e.date);
    entries
}

/// Loads ticket history and builds its timeline.
#[derive(Clone)]
pub struct TimelineService {
    catalog: Arc<StateCatalog>,
    tickets: TicketRepo,
    requests: RequestRepo,
    directory: Arc<dyn UserDirectory>,
}

impl TimelineService {
    /// Create a service.
    #[must_use]
    pub fn new(
        catalog: Arc<StateCatalog>,
        tickets: TicketRepo,
        requests: RequestRepo,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            catalog,
            tickets,
            requests,
            directory,
        }
    }

    /// Timeline of `ticket_id` as seen by `viewer_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, `NotAuthorized` for inactive
    /// viewers, and `Db` if a query fails.
    pub async fn build(&self, ticket_id: &str, viewer_id: &str) -> Result<Vec<TimelineEntry>> {
        let viewer = self
            .directory
            .find_by_id(viewer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {viewer_id} not found")))?;
        policy::ensure_active(&viewer)?;
        policy::authorize(viewer.role, Action::ViewTimeline)?;

        let ticket = self.tickets.require(ticket_id).await?;
        let approved = self.requests.list_approved_for_ticket(ticket_id).await?;
        let pending = self.requests.find_pending(ticket_id).await?;
        Ok(build_timeline(
            &self.catalog,
            &ticket,
            &approved,
            pending.as_ref(),
        ))
    }
}
