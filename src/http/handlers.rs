//! Route handlers and the caller extractor.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::models::notification::Notification;
use crate::models::state_change::StateChangeRequest;
use crate::workflow::policy::{self, Action};
use crate::workflow::{Decision, Resolution, TimelineEntry, TransitionResult};
use crate::{AppError, Result};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's document number.
pub const USER_DOCUMENT_HEADER: &str = "x-user-document";

/// Authenticated caller, resolved to a user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(id) = header_value(parts, USER_ID_HEADER) {
            return Ok(Self(id));
        }
        if let Some(document) = header_value(parts, USER_DOCUMENT_HEADER) {
            let user = state
                .directory
                .find_by_document(&document)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("no user with document {document}")))?;
            return Ok(Self(user.id));
        }
        Err(AppError::NotAuthorized(format!(
            "missing {USER_ID_HEADER} or {USER_DOCUMENT_HEADER} header"
        )))
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Body of `POST /tickets/{id}/transitions`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionBody {
    /// Code of the requested state.
    pub to_state: String,
    /// Optional justification.
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct InboxQuery {
    #[serde(default)]
    unread_only: bool,
}

pub(super) async fn health() -> &'static str {
    "ok"
}

pub(super) async fn request_transition(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(ticket_id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<TransitionResult>> {
    let result = state
        .engine
        .request_transition(&ticket_id, &user_id, &body.to_state, &body.reason)
        .await?;
    Ok(Json(result))
}

pub(super) async fn resolve_approval(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(ticket_id): Path<String>,
    Json(decision): Json<Decision>,
) -> Result<Json<Resolution>> {
    let resolution = state
        .approvals
        .resolve(&ticket_id, &user_id, decision)
        .await?;
    Ok(Json(resolution))
}

pub(super) async fn pending_approvals(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
) -> Result<Json<Vec<StateChangeRequest>>> {
    Ok(Json(state.approvals.list_pending(&user_id).await?))
}

pub(super) async fn timeline(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(ticket_id): Path<String>,
) -> Result<Json<Vec<TimelineEntry>>> {
    Ok(Json(state.timeline.build(&ticket_id, &user_id).await?))
}

pub(super) async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Value>> {
    require_reader(&state, &user_id).await?;
    let notifications = state.inbox.list(&user_id, query.unread_only).await?;
    let unread_count = state.inbox.unread_count(&user_id).await?;
    Ok(Json(json!({
        "unread_count": unread_count,
        "notifications": notifications,
    })))
}

pub(super) async fn mark_read(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(notification_id): Path<String>,
) -> Result<Json<Notification>> {
    require_reader(&state, &user_id).await?;
    Ok(Json(state.inbox.mark_read(&user_id, &notification_id).await?))
}

pub(super) async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
) -> Result<Json<Value>> {
    require_reader(&state, &user_id).await?;
    let updated = state.inbox.mark_all_read(&user_id).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn require_reader(state: &AppState, user_id: &str) -> Result<()> {
    let user = state
        .directory
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))?;
    policy::ensure_active(&user)?;
    policy::authorize(user.role, Action::ReadOwnNotifications)
}
