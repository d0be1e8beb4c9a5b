//! State change request: audit entry and approval queue item in one record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason recorded on direct changes submitted without one.
pub const DEFAULT_DIRECT_REASON: &str = "direct change";
/// Reason recorded when an admin approves closure.
pub const ADMIN_APPROVAL_REASON: &str = "approved by admin";

/// Resolution status of a state change request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting admin decision.
    Pending,
    /// Applied, either directly or by an admin.
    Approved,
    /// Declined by an admin.
    Rejected,
}

impl RequestStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A requested move of a ticket between two states.
///
/// Immutable once written, except for the resolution fields which are
/// stamped exactly once when a pending request is approved or rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateChangeRequest {
    /// Unique record identifier.
    pub id: String,
    /// Ticket being moved.
    pub ticket_id: String,
    /// User who asked for the change.
    pub requested_by: String,
    /// Ordinal id of the state the ticket left (or would leave).
    pub from_state_id: i64,
    /// Ordinal id of the target state.
    pub to_state_id: i64,
    /// Resolution status.
    pub status: RequestStatus,
    /// Free-text justification.
    pub reason: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Resolving user; `None` while pending.
    pub approved_by: Option<String>,
    /// Resolution timestamp; `None` while pending.
    pub approved_at: Option<DateTime<Utc>>,
    /// Admin-supplied reason on rejection.
    pub rejection_reason: Option<String>,
}

impl StateChangeRequest {
    /// A request awaiting an admin decision.
    #[must_use]
    pub fn pending(
        ticket_id: String,
        requested_by: String,
        from_state_id: i64,
        to_state_id: i64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ticket_id,
            requested_by,
            from_state_id,
            to_state_id,
            status: RequestStatus::Pending,
            reason,
            created_at: now,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
        }
    }

    /// An already-applied change, approved by `approver` at `now`.
    ///
    /// An empty `reason` is replaced by [`DEFAULT_DIRECT_REASON`].
    #[must_use]
    pub fn applied(
        ticket_id: String,
        requested_by: String,
        approver: String,
        from_state_id: i64,
        to_state_id: i64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        let reason = if reason.trim().is_empty() {
            DEFAULT_DIRECT_REASON.to_owned()
        } else {
            reason
        };
        Self {
            id: Uuid::new_v4().to_string(),
            ticket_id,
            requested_by,
            from_state_id,
            to_state_id,
            status: RequestStatus::Approved,
            reason,
            created_at: now,
            approved_by: Some(approver),
            approved_at: Some(now),
            rejection_reason: None,
        }
    }

    /// Whether the request still awaits a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}
