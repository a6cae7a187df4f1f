use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("AI provider error: {0}")]
    Ai(String),

    #[error("calendar error: {0}")]
    Calendar(String),

    #[error("reply generation timed out after {0}s")]
    UpstreamTimeout(u64),

    #[error("malformed marker payload: {0}")]
    MalformedMarker(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Ai(_) => StatusCode::BAD_GATEWAY,
            AppError::Calendar(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::MalformedMarker(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::UpstreamTimeout(45).into_response().status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(AppError::Calendar("down".into()).into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
