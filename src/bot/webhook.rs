use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, error, warn};

use super::telegram::Update;
use super::worker::UpdateWorker;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

// ------------------------------------------------------------
// TYPES
// ------------------------------------------------------------
#[derive(Clone)]
pub struct AppState {
    pub worker: UpdateWorker,
    pub webhook_secret: Option<String>,
}

// ------------------------------------------------------------
// ROUTER
// ------------------------------------------------------------
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/telegram/webhook", post(receive_update))
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "ok"
}

/// Queues the update and acknowledges at once; replies go out from the worker.
pub async fn receive_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if let Some(expected) = &state.webhook_secret {
        let given = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if given != expected.as_str() {
            warn!(update_id = update.update_id, "webhook call with a wrong secret");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update_id = update.update_id;
    match state.worker.enqueue(update).await {
        Ok(()) => {
            debug!(update_id, "update queued");
            StatusCode::OK
        }
        Err(_) => {
            error!(update_id, "update worker is gone");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
