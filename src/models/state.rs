//! Ticket lifecycle states and the seeded catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Ticket was received and awaits triage.
pub const OPEN: &str = "open";
/// Technician is diagnosing the equipment.
pub const DIAGNOSIS: &str = "diagnosis";
/// Repair work in progress.
pub const IN_REPAIR: &str = "in_repair";
/// Equipment under trial after repair.
pub const TRIAL: &str = "trial";
/// Trial finished; closure awaits an admin decision.
pub const TRIAL_PENDING_APPROVAL: &str = "trial_pending_approval";
/// Ticket resolved.
pub const CLOSED: &str = "closed";

/// A named stage in the ticket lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct State {
    /// Ordinal identifier; lower values come earlier in the lifecycle.
    pub id: i64,
    /// Stable machine code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Whether the state can be selected for new transitions.
    pub is_active: bool,
    /// Terminal states accept no further technician transitions.
    pub is_final: bool,
}

impl State {
    /// Whether this state carries the given code.
    #[must_use]
    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

/// Seed rows as `(ordinal, code, name, is_active, is_final)`.
pub const SEED: &[(i64, &str, &str, bool, bool)] = &[
    (1, OPEN, "Open", true, false),
    (2, DIAGNOSIS, "Diagnosis", true, false),
    (3, IN_REPAIR, "In Repair", true, false),
    (4, TRIAL, "Trial", true, false),
    (5, TRIAL_PENDING_APPROVAL, "Trial Pending Approval", true, false),
    (6, CLOSED, "Closed", false, true),
];

/// Immutable in-memory view of the seeded states.
#[derive(Debug, Clone)]
pub struct StateCatalog {
    states: Vec<State>,
    by_code: HashMap<String, usize>,
}

impl StateCatalog {
    /// Build a catalog from loaded rows.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StateNotFound` if `rows` is empty.
    pub fn new(mut rows: Vec<State>) -> Result<Self> {
        if rows.is_empty() {
            return Err(AppError::StateNotFound("state catalog is empty".into()));
        }
        rows.sort_by_key(|s| s.id);
        let by_code = rows
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.code.clone(), idx))
            .collect();
        Ok(Self {
            states: rows,
            by_code,
        })
    }

    /// Look up a state by code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StateNotFound` if no state carries `code`.
    pub fn require(&self, code: &str) -> Result<&State> {
        self.by_code
            .get(code)
            .map(|&idx| &self.states[idx])
            .ok_or_else(|| AppError::StateNotFound(format!("no state with code {code}")))
    }

    /// Look up a state by ordinal id.
    #[must_use]
    pub fn by_id(&self, id: i64) -> Option<&State> {
        self.states.iter().find(|s| s.id == id)
    }

    /// Look up a state by ordinal id, treating absence as misconfiguration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StateNotFound` if no state has `id`.
    pub fn require_id(&self, id: i64) -> Result<&State> {
        self.by_id(id)
            .ok_or_else(|| AppError::StateNotFound(format!("no state with id {id}")))
    }

    /// The lowest-ordinal state, assigned to new tickets.
    #[must_use]
    pub fn initial(&self) -> &State {
        &self.states[0]
    }

    /// All states in ordinal order.
    #[must_use]
    pub fn all(&self) -> &[State] {
        &self.states
    }
}
