//! User directory record shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a user plays in the helpdesk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Customer who owns the equipment.
    Client,
    /// Technician assigned to work tickets.
    Technician,
    /// Administrator who resolves approvals.
    Admin,
}

impl Role {
    /// Storage and wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Technician => "technician",
            Self::Admin => "admin",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "client" => Some(Self::Client),
            "technician" => Some(Self::Technician),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// A user as exposed by the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique record identifier.
    pub id: String,
    /// National or company document number; unique.
    pub document: String,
    /// Contact address; may be empty for users without mail.
    pub email: String,
    /// Name used in greetings.
    pub display_name: String,
    /// Helpdesk role.
    pub role: Role,
    /// Inactive users receive no notifications and cannot act.
    pub is_active: bool,
}

impl User {
    /// Construct a new active user with a generated identifier.
    #[must_use]
    pub fn new(document: String, email: String, display_name: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document,
            email,
            display_name,
            role,
            is_active: true,
        }
    }
}
