//! Error types shared across the application.

use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure; the surrounding transaction was rolled back.
    Db(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Actor lacks the role or assignment required for the action.
    NotAuthorized(String),
    /// Ticket is in a final state and accepts no further transitions.
    TicketFinalized(String),
    /// Ticket is locked while an approval decision is outstanding.
    AwaitingApproval(String),
    /// Requested transition is not permitted from the current state.
    InvalidTransition(String),
    /// Ticket is not in a state where the operation applies.
    InvalidState(String),
    /// A state code is missing from the seeded catalog.
    StateNotFound(String),
    /// Email delivery failure; never surfaced past the dispatcher.
    Delivery(String),
    /// File-system or socket I/O failure.
    Io(String),
}

impl AppError {
    /// Stable machine-readable identifier for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Db(_) => "db",
            Self::NotFound(_) => "not_found",
            Self::NotAuthorized(_) => "not_authorized",
            Self::TicketFinalized(_) => "ticket_finalized",
            Self::AwaitingApproval(_) => "awaiting_approval",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::InvalidState(_) => "invalid_state",
            Self::StateNotFound(_) => "state_not_found",
            Self::Delivery(_) => "delivery",
            Self::Io(_) => "io",
        }
    }

    fn detail(&self) -> &str {
        match self {
            Self::Config(msg)
            | Self::Db(msg)
            | Self::NotFound(msg)
            | Self::NotAuthorized(msg)
            | Self::TicketFinalized(msg)
            | Self::AwaitingApproval(msg)
            | Self::InvalidTransition(msg)
            | Self::InvalidState(msg)
            | Self::StateNotFound(msg)
            | Self::Delivery(msg)
            | Self::Io(msg) => msg,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAuthorized(_) => StatusCode::FORBIDDEN,
            Self::TicketFinalized(_)
            | Self::AwaitingApproval(_)
            | Self::InvalidTransition(_)
            | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::Config(_)
            | Self::Db(_)
            | Self::StateNotFound(_)
            | Self::Delivery(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::NotAuthorized(msg) => write!(f, "not authorized: {msg}"),
            Self::TicketFinalized(msg) => write!(f, "ticket finalized: {msg}"),
            Self::AwaitingApproval(msg) => write!(f, "awaiting approval: {msg}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::StateNotFound(msg) => write!(f, "state not found: {msg}"),
            Self::Delivery(msg) => write!(f, "delivery: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Db(format!("invalid json column: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.detail(),
        });
        (status, Json(body)).into_response()
    }
}
