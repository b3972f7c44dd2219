pub mod health;
pub mod inventory;
pub mod organizations;
pub mod staff;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{inventory::InventoryService, staff::StaffService},
    store::{organizations as organization_store, TenantScope},
};
use std::sync::Arc;
use uuid::Uuid;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub staff: Arc<StaffService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: &AppConfig) -> Self {
        Self {
            inventory: Arc::new(InventoryService::new(
                db_pool.clone(),
                event_sender.clone(),
                config.stock_update_max_retries,
            )),
            staff: Arc::new(StaffService::new(db_pool, event_sender)),
        }
    }
}

/// State every tenant-scoped handler needs.
pub trait TenantState: Clone + Send + Sync + 'static {
    fn db(&self) -> &DbPool;
}

impl TenantState for AppState {
    fn db(&self) -> &DbPool {
        &self.db
    }
}

/// Turns the organization in the path into a scope. Unknown organizations are
/// `NotFound`; inactive ones are refused.
pub async fn resolve_scope<S: TenantState>(
    state: &S,
    organization_id: Uuid,
) -> Result<TenantScope, ServiceError> {
    let organization = organization_store::get_organization(state.db(), organization_id).await?;
    if !organization.is_active {
        return Err(ServiceError::InvalidOperation(format!(
            "Organization {} is inactive",
            organization_id
        )));
    }
    Ok(TenantScope::new(organization.id))
}
