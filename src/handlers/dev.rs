//! Local entry points that skip the Twilio webhook.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct DevMessage {
    pub from: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct DevTyping {
    pub from: String,
}

// POST /api/dev/message
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DevMessage>,
) -> (StatusCode, Json<Value>) {
    let from = payload.from.trim().to_string();
    if from.is_empty() || payload.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "from and message are required" })),
        );
    }

    let orchestrator = state.orchestrator.clone();
    let message = payload.message;
    let user = from.clone();
    tokio::spawn(async move { orchestrator.handle_inbound(&user, &message, None).await });

    (StatusCode::ACCEPTED, Json(json!({ "accepted": true, "from": from })))
}

// POST /api/dev/typing
pub async fn typing(State(state): State<Arc<AppState>>, Json(payload): Json<DevTyping>) -> StatusCode {
    state.orchestrator.handle_typing(payload.from.trim());
    StatusCode::NO_CONTENT
}
