#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use erp_universal::{
    config::AppConfig,
    db,
    entities::EntityModel,
    events::{self, EventSender},
    models::EntityType,
    services::inventory::InventoryItemInput,
    store::{entity_store, organizations, NewEntity},
    AppState, TenantScope,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

/// Application state backed by a private in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let (event_sender, event_rx) = EventSender::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        Self {
            state,
            _event_task: event_task,
        }
    }

    pub fn router(&self) -> Router {
        erp_universal::app_router(self.state.clone())
    }

    pub fn db(&self) -> &db::DbPool {
        &self.state.db
    }

    /// Registers an organization and returns its scope.
    pub async fn organization(&self, code: &str) -> TenantScope {
        let org = organizations::create_organization(self.db(), &format!("{code} Bistro"), code)
            .await
            .expect("create organization");
        TenantScope::new(org.id)
    }

    pub async fn product(&self, scope: TenantScope, name: &str, code: &str) -> EntityModel {
        entity_store::create_entity(
            self.db(),
            scope,
            NewEntity::new(EntityType::Product, name).with_code(code),
        )
        .await
        .expect("create product")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }
}

/// Item input with the thresholds most tests use.
pub fn item_input(initial_stock: Decimal, reorder_point: Decimal, unit_cost: Decimal) -> InventoryItemInput {
    InventoryItemInput {
        initial_stock,
        reorder_point,
        reorder_quantity: Decimal::from(20),
        max_stock_level: Decimal::from(100),
        unit_cost,
        ..Default::default()
    }
}
