use super::{resolve_scope, AppState, TenantState};
use crate::{
    errors::ServiceError,
    models::inventory::{
        InventoryAnalytics, InventoryItem, InventoryTransactionDetails, InventoryTransactionType,
        OrderInventoryOutcome, OrderItem, ReorderAlert, StockReconciliation,
    },
    models::CreationOutcome,
    services::inventory::{InventoryItemInput, InventoryService, StockUpdate, UpdateStockOptions},
    services::transactions::RecordedTransaction,
    ApiResponse,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

// Trait for inventory handler state that provides access to inventory service
pub trait InventoryHandlerState: TenantState {
    fn inventory_service(&self) -> &InventoryService;
}

impl InventoryHandlerState for AppState {
    fn inventory_service(&self) -> &InventoryService {
        &self.services.inventory
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInventoryItemRequest {
    pub product_id: Uuid,
    #[serde(flatten)]
    pub item: InventoryItemInput,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub quantity: Decimal,
    pub transaction_type: InventoryTransactionType,
    #[serde(flatten)]
    pub options: UpdateStockOptions,
}

#[derive(Debug, Deserialize)]
pub struct OrderFulfillmentRequest {
    pub order_id: String,
    pub items: Vec<OrderItem>,
}

/// Create the inventory router
pub fn inventory_router<S>() -> Router<S>
where
    S: InventoryHandlerState,
{
    Router::new()
        .route("/", get(list_inventory::<S>).post(create_inventory_item::<S>))
        .route("/alerts", get(get_reorder_alerts::<S>))
        .route("/analytics", get(get_inventory_analytics::<S>))
        .route("/order-fulfillment", post(process_order::<S>))
        .route("/:id", get(get_inventory_item::<S>))
        .route("/:id/stock", post(update_stock::<S>))
        .route("/:id/transactions", get(list_item_transactions::<S>))
        .route("/:id/reconcile", get(reconcile_stock::<S>))
}

pub async fn list_inventory<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<InventoryItem>>>, ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let items = state.inventory_service().get_inventory_items(scope).await?;
    Ok(Json(ApiResponse::success(items)))
}

pub async fn get_inventory_item<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<InventoryItem>>, ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let item = state.inventory_service().get_inventory_item(scope, id).await?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn create_inventory_item<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateInventoryItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreationOutcome<InventoryItem>>>), ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let outcome = state
        .inventory_service()
        .create_inventory_item(scope, payload.product_id, payload.item)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

pub async fn update_stock<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateStockRequest>,
) -> Result<Json<ApiResponse<StockUpdate>>, ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let update = state
        .inventory_service()
        .update_stock(
            scope,
            id,
            payload.quantity,
            payload.transaction_type,
            payload.options,
        )
        .await?;
    Ok(Json(ApiResponse::success(update)))
}

pub async fn get_reorder_alerts<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ReorderAlert>>>, ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let alerts = state.inventory_service().get_reorder_alerts(scope).await?;
    Ok(Json(ApiResponse::success(alerts)))
}

pub async fn get_inventory_analytics<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ApiResponse<InventoryAnalytics>>, ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let analytics = state.inventory_service().get_inventory_analytics(scope).await?;
    Ok(Json(ApiResponse::success(analytics)))
}

/// A shortfall answers 422 with `success: false` and the short lines in
/// `data`; nothing has been deducted in that case.
pub async fn process_order<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<OrderFulfillmentRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let outcome = state
        .inventory_service()
        .process_order_inventory_update(scope, payload.items, &payload.order_id)
        .await?;

    Ok(match outcome {
        applied @ OrderInventoryOutcome::Applied { .. } => {
            (StatusCode::OK, Json(ApiResponse::success(applied)))
        }
        short @ OrderInventoryOutcome::InsufficientStock { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::failure(short, "Insufficient stock")),
        ),
    })
}

pub async fn list_item_transactions<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<Vec<RecordedTransaction<InventoryTransactionDetails>>>>, ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let history = state.inventory_service().get_item_transactions(scope, id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn reconcile_stock<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<StockReconciliation>>, ServiceError>
where
    S: InventoryHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let report = state.inventory_service().reconcile_stock(scope, id).await?;
    Ok(Json(ApiResponse::success(report)))
}
