use super::{TenantScope, TenantScoped};
use crate::entities::{metadata, CoreMetadata, MetadataModel};
use crate::errors::ServiceError;
use crate::models::{EntityType, MetadataDocument};
use chrono::Utc;
use sea_orm::entity::prelude::Json;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, QueryFilter, QueryOrder, Set};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Largest `IN (...)` list sent in one query. SQLite allows 32766 bound
/// parameters and Postgres 65535.
pub const ID_CHUNK_SIZE: usize = 500;

/// Row to insert into `metadata`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMetadata {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub key: String,
    pub category: String,
    pub value: Json,
}

impl NewMetadata {
    pub fn document<D: MetadataDocument>(
        entity_type: EntityType,
        entity_id: Uuid,
        document: &D,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            entity_type,
            entity_id,
            key: D::KEY.to_string(),
            category: D::CATEGORY.to_string(),
            value: document.to_json()?,
        })
    }
}

pub async fn create_metadata<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    new: NewMetadata,
) -> Result<MetadataModel, ServiceError> {
    let now = Utc::now();
    let row = metadata::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(scope.organization_id()),
        entity_type: Set(new.entity_type.as_str().to_string()),
        entity_id: Set(new.entity_id),
        metadata_type: Set(new.category.clone()),
        metadata_key: Set(new.key.clone()),
        metadata_value: Set(new.value.clone()),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    };

    row.insert(db).await.map_err(|e| {
        ServiceError::from_insert(e, || {
            format!(
                "metadata `{}` already exists for {} {}",
                new.key, new.entity_type, new.entity_id
            )
        })
    })
}

pub async fn create_document<C: ConnectionTrait, D: MetadataDocument>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    entity_id: Uuid,
    document: &D,
) -> Result<MetadataModel, ServiceError> {
    create_metadata(
        db,
        scope,
        NewMetadata::document(entity_type, entity_id, document)?,
    )
    .await
}

/// Inserts several records in order. Atomic only when `db` is a transaction.
pub async fn create_metadata_batch<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    records: Vec<NewMetadata>,
) -> Result<Vec<MetadataModel>, ServiceError> {
    let mut created = Vec::with_capacity(records.len());
    for record in records {
        created.push(create_metadata(db, scope, record).await?);
    }
    Ok(created)
}

pub async fn get_metadata<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    entity_id: Uuid,
    key: &str,
) -> Result<Option<MetadataModel>, ServiceError> {
    Ok(CoreMetadata::find_in(scope)
        .filter(metadata::Column::EntityType.eq(entity_type.as_str()))
        .filter(metadata::Column::EntityId.eq(entity_id))
        .filter(metadata::Column::MetadataKey.eq(key))
        .one(db)
        .await?)
}

pub async fn get_document<C: ConnectionTrait, D: MetadataDocument>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    entity_id: Uuid,
) -> Result<Option<(MetadataModel, D)>, ServiceError> {
    match get_metadata(db, scope, entity_type, entity_id, D::KEY).await? {
        Some(record) => {
            let document = D::from_json(&record.metadata_value)?;
            Ok(Some((record, document)))
        }
        None => Ok(None),
    }
}

/// Conditional replacement: succeeds only while the stored version still
/// equals `record.version`.
pub async fn compare_and_swap<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    record: &MetadataModel,
    new_value: Json,
) -> Result<MetadataModel, ServiceError> {
    let now = Utc::now();
    let next_version = record.version + 1;

    let result = CoreMetadata::update_many_in(scope)
        .col_expr(metadata::Column::MetadataValue, Expr::value(new_value.clone()))
        .col_expr(metadata::Column::Version, Expr::value(next_version))
        .col_expr(metadata::Column::UpdatedAt, Expr::value(now))
        .filter(metadata::Column::Id.eq(record.id))
        .filter(metadata::Column::Version.eq(record.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        warn!(
            metadata_id = %record.id,
            key = %record.metadata_key,
            expected_version = record.version,
            "metadata version moved"
        );
        return Err(ServiceError::ConcurrentModification(record.id));
    }

    debug!(metadata_id = %record.id, version = next_version, "metadata updated");
    Ok(MetadataModel {
        metadata_value: new_value,
        version: next_version,
        updated_at: now,
        ..record.clone()
    })
}

/// Wholesale replacement of the value under `key`.
pub async fn update_metadata_value<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    entity_id: Uuid,
    key: &str,
    new_value: Json,
) -> Result<MetadataModel, ServiceError> {
    let record = get_metadata(db, scope, entity_type, entity_id, key)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "metadata `{}` for {} {} not found",
                key, entity_type, entity_id
            ))
        })?;
    compare_and_swap(db, scope, &record, new_value).await
}

pub async fn update_document<C: ConnectionTrait, D: MetadataDocument>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    entity_id: Uuid,
    document: &D,
) -> Result<MetadataModel, ServiceError> {
    update_metadata_value(db, scope, entity_type, entity_id, D::KEY, document.to_json()?).await
}

/// All metadata of the given entities, in insertion order. Ids are queried
/// in chunks of [`ID_CHUNK_SIZE`] to stay under the bind-parameter limit.
pub async fn list_metadata_for_entities<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    entity_type: EntityType,
    entity_ids: &[Uuid],
) -> Result<Vec<MetadataModel>, ServiceError> {
    let mut records = Vec::new();
    for chunk in entity_ids.chunks(ID_CHUNK_SIZE) {
        let batch = CoreMetadata::find_in(scope)
            .filter(metadata::Column::EntityType.eq(entity_type.as_str()))
            .filter(metadata::Column::EntityId.is_in(chunk.iter().copied()))
            .order_by_asc(metadata::Column::CreatedAt)
            .all(db)
            .await?;
        records.extend(batch);
    }
    if entity_ids.len() > ID_CHUNK_SIZE {
        records.sort_by_key(|record| record.created_at);
    }
    Ok(records)
}

/// Metadata of one entity, keyed by `metadata_key`.
#[derive(Debug, Clone, Default)]
pub struct MetadataBag {
    records: HashMap<String, MetadataModel>,
}

impl MetadataBag {
    pub fn insert(&mut self, record: MetadataModel) {
        self.records.insert(record.metadata_key.clone(), record);
    }

    pub fn get(&self, key: &str) -> Option<&MetadataModel> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decodes `D` if present. A malformed value is an error, not `None`.
    pub fn document<D: MetadataDocument>(&self) -> Result<Option<D>, ServiceError> {
        self.records
            .get(D::KEY)
            .map(|record| D::from_json(&record.metadata_value))
            .transpose()
    }

    pub fn document_or_default<D: MetadataDocument + Default>(&self) -> Result<D, ServiceError> {
        Ok(self.document::<D>()?.unwrap_or_default())
    }

    /// Decodes `D`, failing with `NotFound` when the key is absent.
    pub fn require<D: MetadataDocument>(&self, entity_id: Uuid) -> Result<D, ServiceError> {
        self.document::<D>()?.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "metadata `{}` for entity {} not found",
                D::KEY,
                entity_id
            ))
        })
    }
}

/// Groups a batch fetch by owning entity.
pub fn group_by_entity(records: Vec<MetadataModel>) -> HashMap<Uuid, MetadataBag> {
    let mut grouped: HashMap<Uuid, MetadataBag> = HashMap::new();
    for record in records {
        grouped.entry(record.entity_id).or_default().insert(record);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::StockLevels;
    use rust_decimal_macros::dec;

    fn record(entity_id: Uuid, key: &str, value: Json) -> MetadataModel {
        let now = Utc::now();
        MetadataModel {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            entity_type: "inventory_item".into(),
            entity_id,
            metadata_type: "inventory".into(),
            metadata_key: key.into(),
            metadata_value: value,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn grouping_keeps_entities_apart() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let grouped = group_by_entity(vec![
            record(a, "stock_levels", serde_json::json!({})),
            record(a, "cost_info", serde_json::json!({})),
            record(b, "stock_levels", serde_json::json!({})),
        ]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&a].len(), 2);
        assert_eq!(grouped[&b].len(), 1);
    }

    #[test]
    fn bag_decodes_documents_and_defaults_missing_ones() {
        let id = Uuid::new_v4();
        let levels = StockLevels {
            current_stock: dec!(12),
            ..Default::default()
        };
        let mut bag = MetadataBag::default();
        bag.insert(record(id, "stock_levels", levels.to_json().unwrap()));

        assert_eq!(bag.require::<StockLevels>(id).unwrap(), levels);

        let empty = MetadataBag::default();
        assert_eq!(
            empty.document_or_default::<StockLevels>().unwrap(),
            StockLevels::default()
        );
        assert!(matches!(
            empty.require::<StockLevels>(id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_document_is_an_error() {
        let id = Uuid::new_v4();
        let mut bag = MetadataBag::default();
        bag.insert(record(
            id,
            "stock_levels",
            serde_json::json!({ "current_stock": "lots" }),
        ));
        assert!(matches!(
            bag.document::<StockLevels>(),
            Err(ServiceError::SerializationError(_))
        ));
    }
}
