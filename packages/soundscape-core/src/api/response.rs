//! JSON response helpers shared by the HTTP handlers.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// 200 OK with `body` as JSON.
pub fn api_success<T: Serialize>(body: T) -> (StatusCode, Json<T>) {
    (StatusCode::OK, Json(body))
}

/// Error response in the same `{error, message, status}` shape as
/// [`SoundscapeError`](crate::error::SoundscapeError).
pub fn api_error(
    status: StatusCode,
    code: &str,
    message: impl std::fmt::Display,
) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.to_string(),
            "status": status.as_u16(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_has_code_message_and_status() {
        let (status, Json(body)) = api_error(StatusCode::BAD_GATEWAY, "catalog_unavailable", "down");
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "catalog_unavailable");
        assert_eq!(body["message"], "down");
        assert_eq!(body["status"], 502);
    }
}
