use super::{TenantScope, TenantScoped};
use crate::entities::{entity, CoreEntity, EntityModel};
use crate::errors::ServiceError;
use crate::models::EntityType;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Row to insert into `entities`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub entity_type: EntityType,
    pub subtype: Option<String>,
    pub name: String,
    pub code: Option<String>,
    pub related_entity_id: Option<Uuid>,
}

impl NewEntity {
    pub fn new(entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            subtype: None,
            name: name.into(),
            code: None,
            related_entity_id: None,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn related_to(mut self, entity_id: Uuid) -> Self {
        self.related_entity_id = Some(entity_id);
        self
    }
}

/// Optional narrowing for [`list_entities`]. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    pub subtype: Option<String>,
    pub related_entity_id: Option<Uuid>,
    pub code: Option<String>,
    pub name_contains: Option<String>,
    /// Only rows created at or after this instant
    pub created_since: Option<DateTime<Utc>>,
}

impl EntityFilter {
    pub fn related_to(entity_id: Uuid) -> Self {
        Self {
            related_entity_id: Some(entity_id),
            ..Default::default()
        }
    }
}

/// Fields of an entity that may change after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub subtype: Option<String>,
}

pub async fn create_entity<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    new: NewEntity,
) -> Result<EntityModel, ServiceError> {
    let now = Utc::now();
    let row = entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(scope.organization_id()),
        entity_type: Set(new.entity_type.as_str().to_string()),
        entity_subtype: Set(new.subtype.clone()),
        entity_name: Set(new.name.clone()),
        entity_code: Set(new.code.clone()),
        related_entity_id: Set(new.related_entity_id),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = row.insert(db).await.map_err(|e| {
        ServiceError::from_insert(e, || match &new.code {
            Some(code) => format!("{} with code `{}` already exists", new.entity_type, code),
            None => format!("conflicting {} for {:?}", new.entity_type, new.related_entity_id),
        })
    })?;
    debug!(entity_id = %model.id, entity_type = %new.entity_type, %scope, "entity created");
    Ok(model)
}

/// Entities of one type, ordered by name.
pub async fn list_entities<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    filter: &EntityFilter,
) -> Result<Vec<EntityModel>, ServiceError> {
    let mut query = CoreEntity::find_in(scope)
        .filter(entity::Column::EntityType.eq(entity_type.as_str()));

    if let Some(subtype) = &filter.subtype {
        query = query.filter(entity::Column::EntitySubtype.eq(subtype.as_str()));
    }
    if let Some(related) = filter.related_entity_id {
        query = query.filter(entity::Column::RelatedEntityId.eq(related));
    }
    if let Some(code) = &filter.code {
        query = query.filter(entity::Column::EntityCode.eq(code.as_str()));
    }
    if let Some(fragment) = &filter.name_contains {
        query = query.filter(entity::Column::EntityName.contains(fragment.as_str()));
    }
    if let Some(since) = filter.created_since {
        query = query.filter(entity::Column::CreatedAt.gte(since));
    }

    Ok(query
        .order_by_asc(entity::Column::EntityName)
        .order_by_asc(entity::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Entities owned by another organization are reported as missing.
pub async fn get_entity<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    id: Uuid,
) -> Result<EntityModel, ServiceError> {
    CoreEntity::find_in(scope)
        .filter(entity::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Entity", id))
}

pub async fn get_entity_of_type<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    id: Uuid,
) -> Result<EntityModel, ServiceError> {
    CoreEntity::find_in(scope)
        .filter(entity::Column::Id.eq(id))
        .filter(entity::Column::EntityType.eq(entity_type.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found(entity_type.as_str(), id))
}

/// Applies `patch` and bumps `updated_at`.
pub async fn touch_entity<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    id: Uuid,
    patch: EntityPatch,
) -> Result<EntityModel, ServiceError> {
    let existing = get_entity(db, scope, id).await?;
    let mut active: entity::ActiveModel = existing.into();
    if let Some(name) = patch.name {
        active.entity_name = Set(name);
    }
    if let Some(subtype) = patch.subtype {
        active.entity_subtype = Set(Some(subtype));
    }
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

pub async fn count_entities<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
) -> Result<u64, ServiceError> {
    Ok(CoreEntity::find_in(scope)
        .filter(entity::Column::EntityType.eq(entity_type.as_str()))
        .count(db)
        .await?)
}
