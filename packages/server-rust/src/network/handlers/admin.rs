//! Emulator control endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use tracing::info;

use super::AppState;

/// `POST /_emulator/reset`: clears the state of every registered service.
pub async fn reset_handler(State(state): State<AppState>) -> StatusCode {
    let registry = state.gateway.registry();
    for service in registry.services() {
        service.handler().reset().await;
    }
    info!(services = registry.len(), "emulator state reset");
    StatusCode::NO_CONTENT
}
