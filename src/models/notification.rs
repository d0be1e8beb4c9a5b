//! In-app notification records and their lazily created types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::user::Role;

/// Ticket lifecycle events that fan out notifications.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Technician moved the ticket directly.
    StateChanged,
    /// A transition awaits an admin decision.
    ApprovalRequested,
    /// An admin approved closure.
    TicketFinalized,
    /// An admin rejected closure.
    ApprovalRejected,
}

impl EventKind {
    /// Notification type code for this event.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::StateChanged => "state_changed",
            Self::ApprovalRequested => "approval_requested",
            Self::TicketFinalized => "ticket_finalized",
            Self::ApprovalRejected => "approval_rejected",
        }
    }

    /// Human name used when the type row is first created.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::StateChanged => "Ticket state changed",
            Self::ApprovalRequested => "Approval requested",
            Self::TicketFinalized => "Ticket finalized",
            Self::ApprovalRejected => "Approval rejected",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::StateChanged => "A technician moved a ticket to a new state.",
            Self::ApprovalRequested => "A ticket transition requires administrator approval.",
            Self::TicketFinalized => "An administrator approved the closure of a ticket.",
            Self::ApprovalRejected => "An administrator rejected the closure of a ticket.",
        }
    }
}

/// Delivery status of an in-app notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Created but not yet delivered.
    Pending,
    /// Delivered to the recipient's inbox.
    Sent,
    /// Opened by the recipient.
    Read,
    /// Could not be delivered.
    Failed,
}

impl NotificationStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Routing defaults for an event code.
///
/// The `send_to_*` flags record which role the type was first created for;
/// recipients are chosen by the emitting workflow, not by these flags. An
/// inactive type still produces in-app notifications but sends no email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationType {
    /// Event code; unique.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Longer explanation.
    pub description: String,
    /// Default routing to the ticket's client.
    pub send_to_client: bool,
    /// Default routing to the assigned technician.
    pub send_to_technician: bool,
    /// Default routing to administrators.
    pub send_to_admin: bool,
    /// Emails are sent only for active types.
    pub is_active: bool,
}

impl NotificationType {
    /// Default type row for `event`, routed to the role of the first recipient.
    #[must_use]
    pub fn inferred(event: EventKind, role: Role) -> Self {
        Self {
            code: event.code().to_owned(),
            name: event.display_name().to_owned(),
            description: event.description().to_owned(),
            send_to_client: role == Role::Client,
            send_to_technician: role == Role::Technician,
            send_to_admin: role == Role::Admin,
            is_active: true,
        }
    }
}

/// An in-app notification addressed to one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// Unique record identifier.
    pub id: String,
    /// Inbox owner.
    pub user_id: String,
    /// Every user the originating event was addressed to.
    pub recipients: BTreeSet<String>,
    /// Related ticket, if any.
    pub ticket_id: Option<String>,
    /// Notification type code.
    pub type_code: String,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// User whose action triggered the event.
    pub sent_by: Option<String>,
    /// Delivery status.
    pub status: NotificationStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Inbox delivery timestamp.
    pub sent_at: Option<DateTime<Utc>>,
    /// First read timestamp.
    pub read_at: Option<DateTime<Utc>>,
    /// Event-specific structured payload.
    pub extra_data: Map<String, Value>,
}

impl Notification {
    /// Construct a notification already delivered to the inbox.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn sent(
        user_id: String,
        recipients: BTreeSet<String>,
        ticket_id: Option<String>,
        type_code: String,
        title: String,
        message: String,
        sent_by: Option<String>,
        extra_data: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            recipients,
            ticket_id,
            type_code,
            title,
            message,
            sent_by,
            status: NotificationStatus::Sent,
            created_at: now,
            sent_at: Some(now),
            read_at: None,
            extra_data,
        }
    }
}
