use crate::{db, handlers::AppState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::time::Instant;

/// Liveness plus a database ping
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let database = db::check_connection(&state.db).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (status, db_status) = match &database {
        Ok(()) => (StatusCode::OK, "up"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "down"),
    };

    (
        status,
        Json(json!({
            "status": db_status,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": {
                "database": { "status": db_status, "latency_ms": latency_ms }
            }
        })),
    )
}
