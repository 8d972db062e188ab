use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use super::api_error;
use crate::runtime::worker::{self, PurchaseRequest};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
}

impl StartBody {
    /// All three fields present and non-empty.
    fn into_request(self) -> Option<PurchaseRequest> {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());
        Some(PurchaseRequest {
            email: present(self.email)?,
            password: present(self.password)?,
            product_url: present(self.product_url)?,
        })
    }
}

/// `POST /start`: register a session and dispatch its worker.
///
/// A body that is missing, unparseable or lacks a field is rejected
/// before anything is created.
pub async fn start_purchase(
    State(state): State<AppState>,
    body: Result<Json<StartBody>, JsonRejection>,
) -> impl IntoResponse {
    let Some(request) = body.ok().and_then(|Json(body)| body.into_request()) else {
        return api_error(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    let session = state.registry.create();
    let session_id = session.id().to_string();
    tracing::info!(
        session_id = %session_id,
        product_url = %request.product_url,
        "purchase session started"
    );

    worker::spawn(
        &state.workers,
        session,
        state.engine.clone(),
        state.config.clone(),
        request,
    );

    Json(serde_json::json!({ "session_id": session_id })).into_response()
}
