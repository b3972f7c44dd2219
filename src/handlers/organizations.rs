use super::{resolve_scope, AppState};
use crate::{
    entities::{EntityModel, OrganizationModel},
    errors::ServiceError,
    models::EntityType,
    store::{entity_store, organizations as organization_store, EntityFilter, NewEntity},
    ApiResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilters {
    pub search: Option<String>,
    pub category: Option<String>,
}

pub fn organization_routes() -> Router<AppState> {
    Router::new()
        .route("/organizations", post(create_organization))
        .route("/organizations/:org_id", get(get_organization))
        .route(
            "/organizations/:org_id/products",
            get(list_products).post(create_product),
        )
}

pub async fn create_organization(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let organization =
        organization_store::create_organization(&*state.db, &payload.name, &payload.code).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(organization))))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrganizationModel>>, ServiceError> {
    let organization = organization_store::get_organization(&*state.db, org_id).await?;
    Ok(Json(ApiResponse::success(organization)))
}

/// Products are plain entities; inventory items reference them.
pub async fn create_product(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let scope = resolve_scope(&state, org_id).await?;

    let mut new_entity = NewEntity::new(EntityType::Product, payload.name.trim());
    if let Some(code) = payload.code {
        new_entity = new_entity.with_code(code);
    }
    if let Some(category) = payload.category {
        new_entity = new_entity.with_subtype(category);
    }
    let product = entity_store::create_entity(&*state.db, scope, new_entity).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

pub async fn list_products(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(filters): Query<ProductFilters>,
) -> Result<Json<ApiResponse<Vec<EntityModel>>>, ServiceError> {
    let scope = resolve_scope(&state, org_id).await?;
    let filter = EntityFilter {
        subtype: filters.category,
        name_contains: filters.search,
        ..Default::default()
    };
    let products = entity_store::list_entities(&*state.db, scope, EntityType::Product, &filter).await?;
    Ok(Json(ApiResponse::success(products)))
}
