use super::{resolve_scope, AppState, TenantState};
use crate::{
    errors::ServiceError,
    models::staff::{AttendanceDetails, Permission, PermissionSet, Shift, StaffAnalytics, StaffMember},
    models::CreationOutcome,
    services::staff::{ClockRequest, ClockResult, ShiftInput, StaffMemberInput, StaffService},
    services::transactions::RecordedTransaction,
    ApiResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use uuid::Uuid;

pub trait StaffHandlerState: TenantState {
    fn staff_service(&self) -> &StaffService;
}

impl StaffHandlerState for AppState {
    fn staff_service(&self) -> &StaffService {
        &self.services.staff
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePermissionsRequest {
    pub permissions: BTreeSet<Permission>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShiftFilters {
    pub staff_id: Option<Uuid>,
}

pub fn staff_router<S>() -> Router<S>
where
    S: StaffHandlerState,
{
    Router::new()
        .route("/", get(list_staff::<S>).post(create_staff_member::<S>))
        .route("/analytics", get(get_staff_analytics::<S>))
        .route("/shifts", get(list_shifts::<S>))
        .route("/:id", get(get_staff_member::<S>))
        .route("/:id/permissions", put(update_permissions::<S>))
        .route("/:id/clock", post(clock_in_out::<S>))
        .route("/:id/shifts", post(create_shift::<S>))
        .route("/:id/attendance", get(list_attendance::<S>))
}

pub async fn list_staff<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<StaffMember>>>, ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let members = state.staff_service().get_staff_members(scope).await?;
    Ok(Json(ApiResponse::success(members)))
}

pub async fn get_staff_member<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<StaffMember>>, ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let member = state.staff_service().get_staff_member(scope, id).await?;
    Ok(Json(ApiResponse::success(member)))
}

pub async fn create_staff_member<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<StaffMemberInput>,
) -> Result<(StatusCode, Json<ApiResponse<CreationOutcome<StaffMember>>>), ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let outcome = state.staff_service().create_staff_member(scope, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

pub async fn update_permissions<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdatePermissionsRequest>,
) -> Result<Json<ApiResponse<PermissionSet>>, ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let permissions = state
        .staff_service()
        .update_permissions(scope, id, payload.permissions)
        .await?;
    Ok(Json(ApiResponse::success(permissions)))
}

pub async fn clock_in_out<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ClockRequest>,
) -> Result<Json<ApiResponse<ClockResult>>, ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let result = state.staff_service().clock_in_out(scope, id, payload).await?;
    Ok(Json(ApiResponse::success(result)))
}

pub async fn create_shift<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ShiftInput>,
) -> Result<(StatusCode, Json<ApiResponse<Shift>>), ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let shift = state.staff_service().create_shift(scope, id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(shift))))
}

pub async fn list_shifts<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
    Query(filters): Query<ShiftFilters>,
) -> Result<Json<ApiResponse<Vec<Shift>>>, ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let shifts = state.staff_service().list_shifts(scope, filters.staff_id).await?;
    Ok(Json(ApiResponse::success(shifts)))
}

pub async fn list_attendance<S>(
    State(state): State<S>,
    Path((org_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<Vec<RecordedTransaction<AttendanceDetails>>>>, ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let history = state.staff_service().get_attendance_history(scope, id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn get_staff_analytics<S>(
    State(state): State<S>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ApiResponse<StaffAnalytics>>, ServiceError>
where
    S: StaffHandlerState,
{
    let scope = resolve_scope(&state, org_id).await?;
    let analytics = state.staff_service().get_staff_analytics(scope).await?;
    Ok(Json(ApiResponse::success(analytics)))
}
