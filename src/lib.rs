//! Universal entity/metadata data layer for a multi-tenant restaurant ERP
//!
//! Business objects live in one `entities` table with their attribute groups
//! in a keyed `metadata` table. The inventory and staff services project those
//! rows into typed domain objects and record every mutation as an immutable
//! transaction entity.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use store::TenantScope;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    pub fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: ResponseMeta::capture(),
        }
    }

    /// A business-level failure that still carries a payload.
    pub fn failure(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(error.into()),
            meta: ResponseMeta::capture(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: ResponseMeta::capture(),
        }
    }
}

/// Routes under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::organizations::organization_routes())
        .nest(
            "/organizations/:org_id/inventory",
            handlers::inventory::inventory_router::<AppState>(),
        )
        .nest(
            "/organizations/:org_id/staff",
            handlers::staff::staff_router::<AppState>(),
        )
}

/// Full application router with shared middleware.
pub fn app_router(state: AppState) -> Router {
    let timeout = std::time::Duration::from_secs(state.config.request_timeout_secs);
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::timeout::TimeoutLayer::new(timeout))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_serialize_with_success_flag() {
        let ok = serde_json::to_value(ApiResponse::success(3)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"], 3);
        assert!(ok.get("error").is_none());
        assert!(ok["meta"]["timestamp"].is_string());

        let failed = serde_json::to_value(ApiResponse::<()>::error("nope")).unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "nope");
        assert!(failed["data"].is_null());
    }
}
