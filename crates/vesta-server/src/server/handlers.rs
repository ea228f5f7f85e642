// HTTP request handlers
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::server::response::failure_response;
use crate::server::state::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Vesta is running")
}

/// Push endpoint - receives one catalog change notification and syncs it into the index.
///
/// Every handled notification, including ones that need no index change, is acknowledged
/// with `204`. Failures are answered with the error body and the status of their class.
pub async fn handle_event(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("Received push request with {} bytes", body.len());

    match state.sync.handle(&body).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(failure) => failure_response(&failure),
    }
}
