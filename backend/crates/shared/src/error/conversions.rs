//! Error conversions - rendering [`AppError`] at the HTTP boundary.
//!
//! Body shape:
//! ```json
//! { "success": false,
//!   "error": { "code": "TOKEN_EXPIRED", "message": "...", "action": "...", "details": [] } }
//! ```
//! `action` and `details` are omitted when empty. The source chain is never
//! rendered.

#[cfg(feature = "axum")]
use super::app_error::AppError;

#[cfg(feature = "axum")]
impl AppError {
    /// JSON body for this error.
    pub fn to_body(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "code": self.code(),
            "message": self.message(),
        });
        if let Some(action) = self.action() {
            error["action"] = serde_json::Value::from(action);
        }
        if !self.details().is_empty() {
            error["details"] = serde_json::Value::from(self.details().to_vec());
        }
        serde_json::json!({ "success": false, "error": error })
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(self.to_body())).into_response()
    }
}
