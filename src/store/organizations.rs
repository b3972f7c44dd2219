use crate::entities::{organization, Organization, OrganizationModel};
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, SqlErr};
use tracing::info;
use uuid::Uuid;

/// Registers a tenant. `code` must be unique across organizations.
pub async fn create_organization<C: ConnectionTrait>(
    db: &C,
    name: &str,
    code: &str,
) -> Result<OrganizationModel, ServiceError> {
    if name.trim().is_empty() || code.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "organization name and code are required".to_string(),
        ));
    }

    let now = Utc::now();
    let row = organization::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.trim().to_string()),
        code: Set(code.trim().to_string()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = row.insert(db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict(format!("organization code `{}` already in use", code))
        }
        _ => ServiceError::DatabaseError(e),
    })?;

    info!(organization_id = %model.id, code = %model.code, "organization created");
    Ok(model)
}

pub async fn get_organization<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<OrganizationModel, ServiceError> {
    Organization::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Organization", id))
}
