pub mod auth;
pub mod index;
pub mod logs;
pub mod purchase;
pub mod sessions;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::state::AppState;

/// Build the full HTTP router.
///
/// Every route sits behind the Basic-auth middleware, which is a no-op
/// when no credentials are configured.
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(index::index))
        .route("/start", post(purchase::start_purchase))
        .route("/logs/:session_id", get(logs::stream_logs))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/:session_id", get(sessions::get_session))
        .route("/sessions/:session_id/stop", post(sessions::stop_session))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_basic_auth,
        ))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
