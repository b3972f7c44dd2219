//! Tenant-scoped access to the universal schema.
//!
//! Every accessor takes a [`TenantScope`]; queries are built from
//! [`TenantScoped::find_in`] / [`TenantScoped::update_many_in`], which add the
//! organization filter before any other condition. There is no accessor that
//! reads across organizations.
//!
//! Accessors are generic over [`sea_orm::ConnectionTrait`] so the same calls
//! run against the pool or inside a `DatabaseTransaction`.

pub mod entity_store;
pub mod metadata_store;
pub mod organizations;

pub use entity_store::{EntityFilter, EntityPatch, NewEntity};
pub use metadata_store::{MetadataBag, NewMetadata};

use crate::entities::{entity, metadata, CoreEntity, CoreMetadata};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select, UpdateMany};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Organization a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantScope(Uuid);

impl TenantScope {
    pub fn new(organization_id: Uuid) -> Self {
        Self(organization_id)
    }

    pub fn organization_id(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "org:{}", self.0)
    }
}

impl From<Uuid> for TenantScope {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Table whose rows belong to exactly one organization.
pub trait TenantScoped: EntityTrait {
    /// Column holding the owning organization id.
    fn tenant_col() -> Self::Column;

    fn find_in(scope: TenantScope) -> Select<Self> {
        Self::find().filter(Self::tenant_col().eq(scope.organization_id()))
    }

    fn update_many_in(scope: TenantScope) -> UpdateMany<Self> {
        Self::update_many().filter(Self::tenant_col().eq(scope.organization_id()))
    }
}

impl TenantScoped for CoreEntity {
    fn tenant_col() -> Self::Column {
        entity::Column::OrganizationId
    }
}

impl TenantScoped for CoreMetadata {
    fn tenant_col() -> Self::Column {
        metadata::Column::OrganizationId
    }
}
