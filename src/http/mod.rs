//! JSON HTTP surface over the workflow services.
//!
//! Callers identify themselves with an `x-user-id` header, or an
//! `x-user-document` header resolved through the user directory.

mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::AppState;
use crate::{AppError, Result};

pub use handlers::{Caller, TransitionBody, USER_DOCUMENT_HEADER, USER_ID_HEADER};

/// Build the router with every workflow route.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/tickets/{id}/transitions", post(handlers::request_transition))
        .route("/tickets/{id}/approval", post(handlers::resolve_approval))
        .route("/tickets/{id}/timeline", get(handlers::timeline))
        .route("/approvals/pending", get(handlers::pending_approvals))
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/read-all", post(handlers::mark_all_read))
        .route("/notifications/{id}/read", post(handlers::mark_read))
        .with_state(state)
}

/// Serve the API on `listener` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("listener has no address: {err}")))?;
    info!(%addr, "starting HTTP API");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("http server error: {err}")))?;

    info!("HTTP API shut down");
    Ok(())
}

/// Bind `127.0.0.1:port` and serve the API until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if binding or serving fails.
pub async fn bind_and_serve(port: u16, state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|err| AppError::Io(format!("failed to bind port {port}: {err}")))?;
    serve(listener, state, ct).await
}
