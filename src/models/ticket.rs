//! Ticket model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A support case tracked through the state lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    /// Unique record identifier.
    pub id: String,
    /// Supervising administrator; nulled if the user is deleted.
    pub admin_id: Option<String>,
    /// Assigned technician; nulled if the user is deleted.
    pub technician_id: Option<String>,
    /// Requesting client; nulled if the user is deleted.
    pub client_id: Option<String>,
    /// Ordinal id of the current state.
    pub state_id: i64,
    /// Short summary.
    pub title: String,
    /// Problem description.
    pub description: String,
    /// Equipment under service.
    pub equipment: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Construct a new ticket in `initial_state_id`.
    #[must_use]
    pub fn new(
        title: String,
        description: String,
        equipment: String,
        initial_state_id: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            admin_id: None,
            technician_id: None,
            client_id: None,
            state_id: initial_state_id,
            title,
            description,
            equipment,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the assigned technician.
    #[must_use]
    pub fn with_technician(mut self, user_id: impl Into<String>) -> Self {
        self.technician_id = Some(user_id.into());
        self
    }

    /// Set the requesting client.
    #[must_use]
    pub fn with_client(mut self, user_id: impl Into<String>) -> Self {
        self.client_id = Some(user_id.into());
        self
    }

    /// Set the supervising admin.
    #[must_use]
    pub fn with_admin(mut self, user_id: impl Into<String>) -> Self {
        self.admin_id = Some(user_id.into());
        self
    }
}
