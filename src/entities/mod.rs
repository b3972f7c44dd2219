//! Tables of the universal schema.
//!
//! Every business object lives in `entities`, its attribute groups in
//! `metadata`; both carry the owning organization id.

pub mod entity;
pub mod metadata;
pub mod organization;

pub use entity::{Entity as CoreEntity, Model as EntityModel};
pub use metadata::{Entity as CoreMetadata, Model as MetadataModel};
pub use organization::{Entity as Organization, Model as OrganizationModel};
