use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::services::orchestrator::StatusReport;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if expected_token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusReport>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(state.orchestrator.status()))
}

// POST /api/admin/resume
#[derive(Serialize)]
pub struct ResumeResponse {
    was_paused: bool,
}

pub async fn resume_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ResumeResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let was_paused = state.orchestrator.resume_from_pause();
    tracing::info!(was_paused, "pause lifted through admin API");
    Ok(Json(ResumeResponse { was_paused }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_check_auth() {
        let mut headers = HeaderMap::new();
        assert!(check_auth(&headers, "secret").is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        assert!(check_auth(&headers, "secret").is_ok());
        assert!(check_auth(&headers, "other").is_err());
        assert!(check_auth(&headers, "").is_err());
    }
}
