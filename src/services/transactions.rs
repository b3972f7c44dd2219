//! Every mutation is also written as an immutable event: one entity row that
//! points at the affected entity through `related_entity_id`, plus a single
//! metadata document. Event rows are never updated.

use crate::entities::EntityModel;
use crate::errors::ServiceError;
use crate::models::{EntityType, MetadataDocument};
use crate::store::{entity_store, metadata_store, EntityFilter, NewEntity, TenantScope};
use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// A stored event together with its decoded details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedTransaction<D> {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub kind: Option<String>,
    pub details: D,
    pub recorded_at: DateTime<Utc>,
}

/// Appends one event about `subject_id`. `kind` is stored as the entity
/// subtype.
pub async fn record<C: ConnectionTrait, D: MetadataDocument>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    subject_id: Uuid,
    kind: &str,
    name: String,
    details: &D,
) -> Result<Uuid, ServiceError> {
    let entity = entity_store::create_entity(
        db,
        scope,
        NewEntity::new(entity_type, name)
            .with_subtype(kind)
            .related_to(subject_id),
    )
    .await?;

    metadata_store::create_document(db, scope, entity_type, entity.id, details).await?;

    debug!(transaction_id = %entity.id, %subject_id, kind, "transaction recorded");
    Ok(entity.id)
}

/// Events about `subject_id`, newest first.
pub async fn list_for_subject<C: ConnectionTrait, D: MetadataDocument>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    subject_id: Uuid,
) -> Result<Vec<RecordedTransaction<D>>, ServiceError> {
    let entities = entity_store::list_entities(
        db,
        scope,
        entity_type,
        &EntityFilter::related_to(subject_id),
    )
    .await?;
    decode_all(db, scope, entity_type, entities).await
}

/// Events of `entity_type` recorded at or after `since`, newest first.
pub async fn list_since<C: ConnectionTrait, D: MetadataDocument>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    since: DateTime<Utc>,
) -> Result<Vec<RecordedTransaction<D>>, ServiceError> {
    let filter = EntityFilter {
        created_since: Some(since),
        ..Default::default()
    };
    let entities = entity_store::list_entities(db, scope, entity_type, &filter).await?;
    decode_all(db, scope, entity_type, entities).await
}

async fn decode_all<C: ConnectionTrait, D: MetadataDocument>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    entities: Vec<EntityModel>,
) -> Result<Vec<RecordedTransaction<D>>, ServiceError> {
    let ids: Vec<Uuid> = entities.iter().map(|e| e.id).collect();
    let mut bags = metadata_store::group_by_entity(
        metadata_store::list_metadata_for_entities(db, scope, entity_type, &ids).await?,
    );

    let mut recorded = Vec::with_capacity(entities.len());
    for entity in entities {
        let bag = bags.remove(&entity.id).unwrap_or_default();
        let details = bag.require::<D>(entity.id)?;
        recorded.push(RecordedTransaction {
            id: entity.id,
            subject_id: entity.related_entity_id.unwrap_or_default(),
            kind: entity.entity_subtype,
            details,
            recorded_at: entity.created_at,
        });
    }

    recorded.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    Ok(recorded)
}
