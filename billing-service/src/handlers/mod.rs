pub mod payments;
pub mod subscriptions;
pub mod usage;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "billing-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

pub async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}
