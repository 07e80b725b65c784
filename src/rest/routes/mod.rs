pub mod health;
pub mod reports;
pub mod scrape;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// 500 with the error text in the body.
pub(crate) fn internal(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

/// 404 with a caller-facing message.
pub(crate) fn not_found(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": message.into() })),
    )
}

/// 400 with the rejection reason.
pub(crate) fn bad_request(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": e.to_string() })),
    )
}
