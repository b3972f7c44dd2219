//! Typed views over the universal schema.
//!
//! Each metadata key is bound to one document struct through
//! [`MetadataDocument`], so a value is decoded (and rejected when malformed)
//! at the store boundary instead of being read field-by-field from loose JSON.

pub mod inventory;
pub mod staff;

use crate::errors::ServiceError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::Json;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// Largest quantity, price or rate accepted on input and the ceiling for
/// stored stock. The product of two such values stays inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000);

/// Discriminator stored in `entities.entity_type`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
    Product,
    MenuCategory,
    InventoryItem,
    InventoryTransaction,
    StaffMember,
    TimeEntry,
    Shift,
    AttendanceEvent,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// A struct stored under one metadata key.
pub trait MetadataDocument: Serialize + DeserializeOwned + Send + Sync {
    /// Logical attribute group name (`metadata_key`)
    const KEY: &'static str;
    /// Classification stored in `metadata_type`
    const CATEGORY: &'static str;

    fn to_json(&self) -> Result<Json, ServiceError> {
        serde_json::to_value(self).map_err(|e| {
            ServiceError::SerializationError(format!("metadata `{}`: {}", Self::KEY, e))
        })
    }

    fn from_json(value: &Json) -> Result<Self, ServiceError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            ServiceError::SerializationError(format!("metadata `{}`: {}", Self::KEY, e))
        })
    }
}

/// Outcome of a create operation whose optional enrichment writes may fail
/// without failing the primary record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreationOutcome<T> {
    Created { value: T },
    CreatedWithWarnings { value: T, warnings: Vec<String> },
}

impl<T> CreationOutcome<T> {
    pub fn from_parts(value: T, warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            CreationOutcome::Created { value }
        } else {
            CreationOutcome::CreatedWithWarnings { value, warnings }
        }
    }

    pub fn value(&self) -> &T {
        match self {
            CreationOutcome::Created { value } => value,
            CreationOutcome::CreatedWithWarnings { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            CreationOutcome::Created { value } => value,
            CreationOutcome::CreatedWithWarnings { value, .. } => value,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            CreationOutcome::Created { .. } => &[],
            CreationOutcome::CreatedWithWarnings { warnings, .. } => warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn entity_type_round_trips_through_strings() {
        assert_eq!(EntityType::InventoryItem.as_str(), "inventory_item");
        assert_eq!(EntityType::AttendanceEvent.to_string(), "attendance_event");
        assert_eq!(
            EntityType::from_str("time_entry").unwrap(),
            EntityType::TimeEntry
        );
        assert!(EntityType::from_str("invoice").is_err());
    }

    #[test]
    fn creation_outcome_distinguishes_warnings() {
        let clean = CreationOutcome::from_parts(7, vec![]);
        assert!(matches!(clean, CreationOutcome::Created { value: 7 }));
        assert!(clean.warnings().is_empty());

        let warned = CreationOutcome::from_parts(7, vec!["analytics seed failed".into()]);
        assert_eq!(warned.warnings().len(), 1);
        assert_eq!(*warned.value(), 7);
        assert_eq!(warned.into_value(), 7);
    }
}
