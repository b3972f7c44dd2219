use super::transactions::{self, RecordedTransaction};
use super::{check_quantity, retry_in_transaction, validate_non_negative_decimal};
use crate::{
    db::DbPool,
    entities::EntityModel,
    errors::ServiceError,
    events::{Event, EventSender},
    models::inventory::{
        days_remaining, weighted_average_cost, AlertPriority, CategorySummary, CostInfo,
        InsufficientStock, InventoryAnalytics, InventoryItem, InventoryTransactionDetails,
        InventoryTransactionType, InventoryUsageAnalytics, OrderInventoryOutcome, OrderItem,
        ReorderAlert, StatusBreakdown, StockLevels, StockMovement, StockReconciliation,
        StockStatus, TrackingInfo, TransactionTotals, ValueRanking,
    },
    models::{CreationOutcome, EntityType, MetadataDocument, MAX_AMOUNT},
    store::{
        entity_store, metadata_store, EntityFilter, MetadataBag, NewEntity, NewMetadata,
        TenantScope,
    },
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Number of items reported in the analytics value ranking.
const TOP_VALUE_ITEMS: usize = 5;

/// Look-back window for transaction totals in the analytics report.
const ANALYTICS_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_thresholds"))]
pub struct InventoryItemInput {
    #[serde(default)]
    #[validate(custom = "validate_non_negative_decimal")]
    pub initial_stock: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_decimal")]
    pub reorder_point: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_decimal")]
    pub reorder_quantity: Decimal,
    /// Zero means no upper bound is tracked
    #[serde(default)]
    #[validate(custom = "validate_non_negative_decimal")]
    pub max_stock_level: Decimal,
    #[serde(default)]
    #[validate(length(min = 1, max = 32))]
    pub unit_of_measure: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_decimal")]
    pub unit_cost: Decimal,
    #[serde(default)]
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub storage_location: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<Uuid>,
    #[serde(default)]
    pub track_expiry: bool,
    #[serde(default)]
    pub shelf_life_days: Option<u32>,
    /// Expected units consumed per day, seeds the usage analytics
    #[serde(default)]
    #[validate(custom = "validate_non_negative_decimal")]
    pub consumption_rate: Decimal,
    #[serde(default)]
    pub performed_by: Option<Uuid>,
}

impl Default for InventoryItemInput {
    fn default() -> Self {
        Self {
            initial_stock: Decimal::ZERO,
            reorder_point: Decimal::ZERO,
            reorder_quantity: Decimal::ZERO,
            max_stock_level: Decimal::ZERO,
            unit_of_measure: None,
            unit_cost: Decimal::ZERO,
            currency: None,
            category: None,
            storage_location: None,
            supplier_id: None,
            track_expiry: false,
            shelf_life_days: None,
            consumption_rate: Decimal::ZERO,
            performed_by: None,
        }
    }
}

fn validate_thresholds(input: &InventoryItemInput) -> Result<(), ValidationError> {
    if input.max_stock_level > Decimal::ZERO && input.max_stock_level < input.reorder_point {
        let mut err = ValidationError::new("max_stock_level");
        err.message = Some("Max stock level must not be below the reorder point".into());
        return Err(err);
    }
    Ok(())
}

impl InventoryItemInput {
    fn stock_levels(&self) -> StockLevels {
        let mut levels = StockLevels {
            current_stock: self.initial_stock,
            reorder_point: self.reorder_point,
            reorder_quantity: self.reorder_quantity,
            max_stock_level: self.max_stock_level,
            ..Default::default()
        };
        if let Some(unit) = &self.unit_of_measure {
            levels.unit_of_measure = unit.clone();
        }
        levels
    }

    fn cost_info(&self) -> CostInfo {
        let mut cost = CostInfo {
            unit_cost: self.unit_cost,
            avg_cost: Some(self.unit_cost),
            ..Default::default()
        };
        if let Some(currency) = &self.currency {
            cost.currency = currency.to_uppercase();
        }
        cost
    }

    fn tracking_info(&self) -> TrackingInfo {
        TrackingInfo {
            category: self.category.clone(),
            storage_location: self.storage_location.clone(),
            supplier_id: self.supplier_id,
            track_expiry: self.track_expiry,
            shelf_life_days: self.shelf_life_days,
            lot_tracking: false,
        }
    }
}

/// Optional context for a stock movement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateStockOptions {
    /// Purchase price per unit; only receipts use it
    #[serde(default)]
    #[validate(custom = "validate_non_negative_decimal")]
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Free-form link to the triggering operation, never checked
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub performed_by: Option<Uuid>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Result of a committed stock movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub inventory_item_id: Uuid,
    pub transaction_id: Uuid,
    pub transaction_type: InventoryTransactionType,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub applied_delta: Decimal,
    pub status: StockStatus,
    pub avg_cost: Decimal,
    #[serde(skip)]
    reorder_point: Decimal,
    #[serde(skip)]
    consumption_rate: Decimal,
}

impl StockUpdate {
    /// Set when this movement took the item from above to at-or-below its
    /// reorder point.
    fn crossed_reorder_point(&self) -> Option<AlertPriority> {
        if self.previous_stock > self.reorder_point && self.new_stock <= self.reorder_point {
            let days = days_remaining(self.new_stock, self.consumption_rate);
            Some(AlertPriority::classify(self.new_stock, days))
        } else {
            None
        }
    }
}

/// Builds the inventory projection from an entity row and its metadata.
/// Absent documents project as their defaults.
pub fn project_inventory_item(
    entity: EntityModel,
    bag: &MetadataBag,
) -> Result<InventoryItem, ServiceError> {
    let stock: StockLevels = bag.document_or_default()?;
    let cost: CostInfo = bag.document_or_default()?;
    let tracking: TrackingInfo = bag.document_or_default()?;
    let analytics: InventoryUsageAnalytics = bag.document_or_default()?;

    let status = StockStatus::of(&stock);
    let days = days_remaining(stock.current_stock, analytics.consumption_rate);
    let total_value = stock.current_stock.saturating_mul(cost.effective_cost());

    Ok(InventoryItem {
        id: entity.id,
        organization_id: entity.organization_id,
        product_id: entity.related_entity_id,
        name: entity.entity_name,
        code: entity.entity_code,
        stock,
        cost,
        tracking,
        analytics,
        status,
        days_remaining: days,
        total_value,
        created_at: entity.created_at,
        updated_at: entity.updated_at,
    })
}

async fn load_item<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    item_id: Uuid,
) -> Result<(EntityModel, MetadataBag), ServiceError> {
    let entity =
        entity_store::get_entity_of_type(db, scope, EntityType::InventoryItem, item_id).await?;
    let bag = metadata_store::group_by_entity(
        metadata_store::list_metadata_for_entities(
            db,
            scope,
            EntityType::InventoryItem,
            &[item_id],
        )
        .await?,
    )
    .remove(&item_id)
    .unwrap_or_default();
    Ok((entity, bag))
}

fn out_of_range(what: &str, item_id: Uuid) -> ServiceError {
    ServiceError::InvalidInput(format!(
        "{} of inventory item {} would exceed {}",
        what, item_id, MAX_AMOUNT
    ))
}

/// Applies one movement using `db`, which must be a transaction for the
/// steps to commit together.
pub async fn apply_stock_change<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    item_id: Uuid,
    quantity: Decimal,
    transaction_type: InventoryTransactionType,
    options: &UpdateStockOptions,
) -> Result<StockUpdate, ServiceError> {
    let (entity, bag) = load_item(db, scope, item_id).await?;
    let stock_record = bag.get(StockLevels::KEY).cloned().ok_or_else(|| {
        ServiceError::NotFound(format!("stock levels for inventory item {} not found", item_id))
    })?;
    let mut stock = StockLevels::from_json(&stock_record.metadata_value)?;

    let occurred_at = options.occurred_at.unwrap_or_else(Utc::now);
    let previous_stock = stock.current_stock;
    let delta = transaction_type.signed_delta(quantity);
    let new_stock = previous_stock
        .checked_add(delta)
        .map(|stock| stock.max(Decimal::ZERO))
        .filter(|stock| *stock <= MAX_AMOUNT)
        .ok_or_else(|| out_of_range("Stock", item_id))?;
    let applied_delta = new_stock - previous_stock;

    stock.current_stock = new_stock;
    metadata_store::compare_and_swap(db, scope, &stock_record, stock.to_json()?).await?;

    let mut cost: CostInfo = bag.document_or_default()?;
    if let (InventoryTransactionType::Receipt, Some(unit_cost)) =
        (transaction_type, options.unit_cost)
    {
        let new_avg = weighted_average_cost(
            previous_stock,
            cost.effective_cost(),
            applied_delta,
            unit_cost,
            new_stock,
        )
        .ok_or_else(|| out_of_range("Average cost", item_id))?
        .round_dp(4);
        cost.avg_cost = Some(new_avg);
        cost.last_purchase_cost = Some(unit_cost);
        match bag.get(CostInfo::KEY) {
            Some(record) => {
                metadata_store::compare_and_swap(db, scope, record, cost.to_json()?).await?;
            }
            None => {
                metadata_store::create_document(db, scope, EntityType::InventoryItem, item_id, &cost)
                    .await?;
            }
        }
    }

    let mut analytics: InventoryUsageAnalytics = bag.document_or_default()?;
    analytics.record(transaction_type, applied_delta, occurred_at);
    match bag.get(InventoryUsageAnalytics::KEY) {
        Some(record) => {
            metadata_store::compare_and_swap(db, scope, record, analytics.to_json()?).await?;
        }
        None => {
            metadata_store::create_document(
                db,
                scope,
                EntityType::InventoryItem,
                item_id,
                &analytics,
            )
            .await?;
        }
    }

    let details = InventoryTransactionDetails {
        inventory_item_id: item_id,
        transaction_type,
        quantity: delta,
        applied_delta,
        previous_stock,
        new_stock,
        unit_cost: options.unit_cost,
        total_cost: options
            .unit_cost
            .map(|c| {
                c.checked_mul(delta.abs())
                    .map(|total| total.round_dp(4))
                    .ok_or_else(|| out_of_range("Movement cost", item_id))
            })
            .transpose()?,
        reason: options.reason.clone(),
        notes: options.notes.clone(),
        reference_id: options.reference_id.clone(),
        performed_by: options.performed_by,
        occurred_at,
    };
    let transaction_id = transactions::record(
        db,
        scope,
        EntityType::InventoryTransaction,
        item_id,
        &transaction_type.to_string(),
        format!("{} {}", transaction_type, entity.entity_name),
        &details,
    )
    .await?;

    Ok(StockUpdate {
        inventory_item_id: item_id,
        transaction_id,
        transaction_type,
        previous_stock,
        new_stock,
        applied_delta,
        status: StockStatus::of(&stock),
        avg_cost: cost.effective_cost(),
        reorder_point: stock.reorder_point,
        consumption_rate: analytics.consumption_rate,
    })
}

/// Service for inventory items stored in the universal schema
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    max_retries: u32,
}

impl InventoryService {
    /// Creates a new inventory service instance
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender, max_retries: u32) -> Self {
        Self {
            db_pool,
            event_sender,
            max_retries,
        }
    }

    /// All inventory items of the organization, ordered by name
    #[instrument(skip(self))]
    pub async fn get_inventory_items(
        &self,
        scope: TenantScope,
    ) -> Result<Vec<InventoryItem>, ServiceError> {
        let db = &*self.db_pool;
        let entities = entity_store::list_entities(
            db,
            scope,
            EntityType::InventoryItem,
            &EntityFilter::default(),
        )
        .await?;
        let ids: Vec<Uuid> = entities.iter().map(|e| e.id).collect();
        let mut bags = metadata_store::group_by_entity(
            metadata_store::list_metadata_for_entities(db, scope, EntityType::InventoryItem, &ids)
                .await?,
        );

        let items = entities
            .into_iter()
            .map(|entity| {
                let bag = bags.remove(&entity.id).unwrap_or_default();
                project_inventory_item(entity, &bag)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = items.len(), "inventory items projected");
        Ok(items)
    }

    #[instrument(skip(self))]
    pub async fn get_inventory_item(
        &self,
        scope: TenantScope,
        item_id: Uuid,
    ) -> Result<InventoryItem, ServiceError> {
        let (entity, bag) = load_item(&*self.db_pool, scope, item_id).await?;
        project_inventory_item(entity, &bag)
    }

    /// Creates an inventory item tracking `product_id`.
    ///
    /// Stock levels, cost and tracking documents and the opening balance are
    /// written in one transaction. The analytics seed is written afterwards;
    /// if it fails the item still exists and the failure is returned as a
    /// warning.
    #[instrument(skip(self, input))]
    pub async fn create_inventory_item(
        &self,
        scope: TenantScope,
        product_id: Uuid,
        input: InventoryItemInput,
    ) -> Result<CreationOutcome<InventoryItem>, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;

        let product =
            entity_store::get_entity_of_type(db, scope, EntityType::Product, product_id).await?;
        let code = match &product.entity_code {
            Some(code) => format!("INV-{}", code),
            None => format!("INV-{}", &product.id.simple().to_string()[..8]),
        };

        let txn_input = input.clone();
        let item_id = db
            .transaction::<_, Uuid, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut new_entity = NewEntity::new(EntityType::InventoryItem, product.entity_name)
                        .with_code(code)
                        .related_to(product.id);
                    if let Some(category) = &txn_input.category {
                        new_entity = new_entity.with_subtype(category.clone());
                    }
                    let entity = entity_store::create_entity(txn, scope, new_entity).await?;

                    let levels = txn_input.stock_levels();
                    metadata_store::create_metadata_batch(
                        txn,
                        scope,
                        vec![
                            NewMetadata::document(EntityType::InventoryItem, entity.id, &levels)?,
                            NewMetadata::document(
                                EntityType::InventoryItem,
                                entity.id,
                                &txn_input.cost_info(),
                            )?,
                            NewMetadata::document(
                                EntityType::InventoryItem,
                                entity.id,
                                &txn_input.tracking_info(),
                            )?,
                        ],
                    )
                    .await?;

                    if txn_input.initial_stock > Decimal::ZERO {
                        let opening = InventoryTransactionDetails {
                            inventory_item_id: entity.id,
                            transaction_type: InventoryTransactionType::OpeningBalance,
                            quantity: txn_input.initial_stock,
                            applied_delta: txn_input.initial_stock,
                            previous_stock: Decimal::ZERO,
                            new_stock: txn_input.initial_stock,
                            unit_cost: Some(txn_input.unit_cost),
                            total_cost: Some(
                                txn_input
                                    .unit_cost
                                    .checked_mul(txn_input.initial_stock)
                                    .ok_or_else(|| out_of_range("Opening value", entity.id))?,
                            ),
                            reason: Some("Opening balance".to_string()),
                            notes: None,
                            reference_id: None,
                            performed_by: txn_input.performed_by,
                            occurred_at: entity.created_at,
                        };
                        transactions::record(
                            txn,
                            scope,
                            EntityType::InventoryTransaction,
                            entity.id,
                            &InventoryTransactionType::OpeningBalance.to_string(),
                            format!("opening_balance {}", entity.entity_name),
                            &opening,
                        )
                        .await?;
                    }

                    Ok(entity.id)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        let mut warnings = Vec::new();
        let mut seed = InventoryUsageAnalytics {
            consumption_rate: input.consumption_rate,
            ..Default::default()
        };
        if input.initial_stock > Decimal::ZERO {
            seed.record(
                InventoryTransactionType::OpeningBalance,
                input.initial_stock,
                Utc::now(),
            );
        }
        if let Err(e) =
            metadata_store::create_document(db, scope, EntityType::InventoryItem, item_id, &seed)
                .await
        {
            warn!(inventory_item_id = %item_id, error = %e, "analytics seed not written");
            warnings.push(format!("analytics not initialized: {}", e));
        }

        let item = self.get_inventory_item(scope, item_id).await?;
        info!(inventory_item_id = %item.id, code = ?item.code, "inventory item created");

        self.event_sender
            .send_or_log(Event::InventoryItemCreated {
                organization_id: scope.organization_id(),
                inventory_item_id: item.id,
                product_id,
                initial_stock: input.initial_stock,
            })
            .await;

        Ok(CreationOutcome::from_parts(item, warnings))
    }

    /// Applies a stock movement and records it.
    ///
    /// `quantity` is normalized by `transaction_type`: receipts add, usage and
    /// waste remove, adjustments keep their sign. Stock never drops below
    /// zero. On a concurrent write the whole movement is retried.
    #[instrument(skip(self, options))]
    pub async fn update_stock(
        &self,
        scope: TenantScope,
        item_id: Uuid,
        quantity: Decimal,
        transaction_type: InventoryTransactionType,
        options: UpdateStockOptions,
    ) -> Result<StockUpdate, ServiceError> {
        options.validate()?;
        check_quantity(quantity, "Stock movement quantity")?;
        if transaction_type == InventoryTransactionType::OpeningBalance {
            return Err(ServiceError::InvalidInput(
                "Opening balances are recorded when the item is created".to_string(),
            ));
        }

        let update = retry_in_transaction(&self.db_pool, self.max_retries, move |txn| {
            let options = options.clone();
            Box::pin(async move {
                apply_stock_change(txn, scope, item_id, quantity, transaction_type, &options)
                    .await
            })
        })
        .await?;

        info!(
            inventory_item_id = %item_id,
            previous = %update.previous_stock,
            new = %update.new_stock,
            "stock updated"
        );
        self.publish_stock_update(scope, &update).await;
        Ok(update)
    }

    async fn publish_stock_update(&self, scope: TenantScope, update: &StockUpdate) {
        self.event_sender
            .send_or_log(Event::StockUpdated {
                organization_id: scope.organization_id(),
                inventory_item_id: update.inventory_item_id,
                transaction_type: update.transaction_type,
                previous_stock: update.previous_stock,
                new_stock: update.new_stock,
                transaction_id: update.transaction_id,
            })
            .await;

        if let Some(priority) = update.crossed_reorder_point() {
            self.event_sender
                .send_or_log(Event::ReorderThresholdCrossed {
                    organization_id: scope.organization_id(),
                    inventory_item_id: update.inventory_item_id,
                    current_stock: update.new_stock,
                    reorder_point: update.reorder_point,
                    priority,
                })
                .await;
        }
    }

    /// Items at or below their reorder point, most urgent first.
    #[instrument(skip(self))]
    pub async fn get_reorder_alerts(
        &self,
        scope: TenantScope,
    ) -> Result<Vec<ReorderAlert>, ServiceError> {
        let items = self.get_inventory_items(scope).await?;
        Ok(reorder_alerts(&items))
    }

    #[instrument(skip(self))]
    pub async fn get_inventory_analytics(
        &self,
        scope: TenantScope,
    ) -> Result<InventoryAnalytics, ServiceError> {
        let since = Utc::now() - Duration::days(ANALYTICS_WINDOW_DAYS);
        let (items, history): (Vec<InventoryItem>, Vec<RecordedTransaction<InventoryTransactionDetails>>) =
            futures::try_join!(
                self.get_inventory_items(scope),
                transactions::list_since(
                    &*self.db_pool,
                    scope,
                    EntityType::InventoryTransaction,
                    since,
                ),
            )?;

        // Rows are windowed by recording time, totals by occurrence time
        let mut last_30_days = TransactionTotals::default();
        for tx in history.iter().filter(|tx| tx.details.occurred_at >= since) {
            last_30_days.add(&tx.details);
        }

        let mut status_breakdown = StatusBreakdown::default();
        let mut categories: BTreeMap<String, (usize, Decimal)> = BTreeMap::new();
        for item in &items {
            status_breakdown.add(item.status);
            let category = item
                .tracking
                .category
                .clone()
                .unwrap_or_else(|| "uncategorized".to_string());
            let entry = categories.entry(category).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 = entry.1.saturating_add(item.total_value);
        }

        let mut ranked: Vec<&InventoryItem> = items.iter().collect();
        ranked.sort_by(|a, b| {
            b.total_value
                .cmp(&a.total_value)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(InventoryAnalytics {
            total_items: items.len(),
            total_value: items
                .iter()
                .fold(Decimal::ZERO, |sum, i| sum.saturating_add(i.total_value)),
            status_breakdown,
            reorder_alert_count: reorder_alerts(&items).len(),
            categories: categories
                .into_iter()
                .map(|(category, (item_count, total_value))| CategorySummary {
                    category,
                    item_count,
                    total_value,
                })
                .collect(),
            top_value_items: ranked
                .into_iter()
                .take(TOP_VALUE_ITEMS)
                .map(|item| ValueRanking {
                    inventory_item_id: item.id,
                    name: item.name.clone(),
                    total_value: item.total_value,
                })
                .collect(),
            last_30_days,
        })
    }

    /// Deducts stock for an order.
    ///
    /// Every line is checked before anything is written; if any line is
    /// short, nothing is deducted and the short lines are returned. Products
    /// without an inventory item are not stock-tracked and are skipped.
    #[instrument(skip(self, order_items), fields(lines = order_items.len()))]
    pub async fn process_order_inventory_update(
        &self,
        scope: TenantScope,
        order_items: Vec<OrderItem>,
        order_id: &str,
    ) -> Result<OrderInventoryOutcome, ServiceError> {
        if let Some(bad) = order_items.iter().find(|l| l.quantity <= Decimal::ZERO) {
            return Err(ServiceError::InvalidInput(format!(
                "Order quantity for product {} must be positive",
                bad.product_id
            )));
        }

        let requested = requested_by_product(&order_items);
        for (product_id, quantity) in &requested {
            check_quantity(*quantity, &format!("Order quantity for product {}", product_id))?;
        }

        // Short orders return before any write
        let order_ref = order_id.to_string();
        let outcome = retry_in_transaction(&self.db_pool, self.max_retries, move |txn| {
            let requested = requested.clone();
            let order_ref = order_ref.clone();
            Box::pin(async move { fulfill_order(txn, scope, &requested, &order_ref).await })
        })
        .await?;

        match &outcome {
            OrderInventoryOutcome::Applied { movements } => {
                info!(%order_id, lines = movements.len(), "order inventory applied");
                self.event_sender
                    .send_or_log(Event::OrderInventoryApplied {
                        organization_id: scope.organization_id(),
                        order_id: order_id.to_string(),
                        lines: movements.len(),
                    })
                    .await;
            }
            OrderInventoryOutcome::InsufficientStock { lines } => {
                warn!(%order_id, short = lines.len(), "order rejected for insufficient stock");
                self.event_sender
                    .send_or_log(Event::OrderInventoryRejected {
                        organization_id: scope.organization_id(),
                        order_id: order_id.to_string(),
                        short_lines: lines.len(),
                    })
                    .await;
            }
        }
        Ok(outcome)
    }

    /// Recorded movements of one item, newest first.
    #[instrument(skip(self))]
    pub async fn get_item_transactions(
        &self,
        scope: TenantScope,
        item_id: Uuid,
    ) -> Result<Vec<RecordedTransaction<InventoryTransactionDetails>>, ServiceError> {
        let db = &*self.db_pool;
        entity_store::get_entity_of_type(db, scope, EntityType::InventoryItem, item_id).await?;
        transactions::list_for_subject(db, scope, EntityType::InventoryTransaction, item_id).await
    }

    /// Replays an item's recorded movements and compares the result with its
    /// stored stock level.
    #[instrument(skip(self))]
    pub async fn reconcile_stock(
        &self,
        scope: TenantScope,
        item_id: Uuid,
    ) -> Result<StockReconciliation, ServiceError> {
        let item = self.get_inventory_item(scope, item_id).await?;
        let history = self.get_item_transactions(scope, item_id).await?;
        let replayed_stock = history
            .iter()
            .fold(Decimal::ZERO, |sum, tx| sum.saturating_add(tx.details.applied_delta));
        let consistent = replayed_stock == item.stock.current_stock;
        if !consistent {
            warn!(
                inventory_item_id = %item_id,
                recorded = %item.stock.current_stock,
                replayed = %replayed_stock,
                "stock does not match transaction history"
            );
        }

        Ok(StockReconciliation {
            inventory_item_id: item_id,
            recorded_stock: item.stock.current_stock,
            replayed_stock,
            transaction_count: history.len(),
            consistent,
        })
    }
}

/// Checks every line, then deducts all of them or none.
async fn fulfill_order<C: ConnectionTrait>(
    db: &C,
    scope: TenantScope,
    requested: &[(Uuid, Decimal)],
    order_id: &str,
) -> Result<OrderInventoryOutcome, ServiceError> {
    let mut planned = Vec::new();
    let mut short = Vec::new();

    for (product_id, quantity) in requested {
        let tracked = entity_store::list_entities(
            db,
            scope,
            EntityType::InventoryItem,
            &EntityFilter::related_to(*product_id),
        )
        .await?;
        let Some(item) = tracked.into_iter().next() else {
            debug!(%product_id, "product not stock-tracked, skipping");
            continue;
        };

        let available = metadata_store::get_document::<_, StockLevels>(
            db,
            scope,
            EntityType::InventoryItem,
            item.id,
        )
        .await?
        .map(|(_, levels)| levels.current_stock)
        .unwrap_or(Decimal::ZERO);

        if *quantity > available {
            short.push(InsufficientStock {
                product_id: *product_id,
                inventory_item_id: item.id,
                name: item.entity_name.clone(),
                requested: *quantity,
                available,
            });
        } else {
            planned.push((item.id, *quantity));
        }
    }

    if !short.is_empty() {
        return Ok(OrderInventoryOutcome::InsufficientStock { lines: short });
    }

    let options = UpdateStockOptions {
        reason: Some("Order fulfillment".to_string()),
        reference_id: Some(order_id.to_string()),
        ..Default::default()
    };
    let mut movements = Vec::with_capacity(planned.len());
    for (item_id, quantity) in planned {
        let update = apply_stock_change(
            db,
            scope,
            item_id,
            quantity,
            InventoryTransactionType::Usage,
            &options,
        )
        .await?;
        movements.push(StockMovement {
            inventory_item_id: item_id,
            previous_stock: update.previous_stock,
            new_stock: update.new_stock,
            transaction_id: update.transaction_id,
        });
    }
    Ok(OrderInventoryOutcome::Applied { movements })
}

/// Alerts for `items`, sorted by priority, then days remaining, then name.
pub fn reorder_alerts(items: &[InventoryItem]) -> Vec<ReorderAlert> {
    let mut alerts: Vec<ReorderAlert> = items.iter().filter_map(ReorderAlert::for_item).collect();
    alerts.sort_by(|a, b| {
        a.priority
            .rank()
            .cmp(&b.priority.rank())
            .then_with(|| a.days_remaining.cmp(&b.days_remaining))
            .then_with(|| a.name.cmp(&b.name))
    });
    alerts
}

/// Sums lines per product, keeping first-seen order. Lines for the same
/// product are checked against stock together.
pub fn requested_by_product(lines: &[OrderItem]) -> Vec<(Uuid, Decimal)> {
    let mut requested: Vec<(Uuid, Decimal)> = Vec::new();
    for line in lines {
        match requested.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty = qty.saturating_add(line.quantity),
            None => requested.push((line.product_id, line.quantity)),
        }
    }
    requested
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entity(name: &str) -> EntityModel {
        let now = Utc::now();
        EntityModel {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            entity_type: "inventory_item".into(),
            entity_subtype: None,
            entity_name: name.into(),
            entity_code: None,
            related_entity_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(name: &str, stock: Decimal, reorder: Decimal, rate: Decimal) -> InventoryItem {
        let mut bag = MetadataBag::default();
        let levels = StockLevels {
            current_stock: stock,
            reorder_point: reorder,
            reorder_quantity: dec!(10),
            max_stock_level: dec!(100),
            ..Default::default()
        };
        let analytics = InventoryUsageAnalytics {
            consumption_rate: rate,
            ..Default::default()
        };
        let e = entity(name);
        let now = Utc::now();
        for (key, value) in [
            (StockLevels::KEY, levels.to_json().unwrap()),
            (InventoryUsageAnalytics::KEY, analytics.to_json().unwrap()),
        ] {
            bag.insert(crate::entities::MetadataModel {
                id: Uuid::new_v4(),
                organization_id: e.organization_id,
                entity_type: "inventory_item".into(),
                entity_id: e.id,
                metadata_type: "inventory".into(),
                metadata_key: key.into(),
                metadata_value: value,
                version: 1,
                created_at: now,
                updated_at: now,
            });
        }
        project_inventory_item(e, &bag).unwrap()
    }

    #[test]
    fn projection_defaults_missing_documents() {
        let projected = project_inventory_item(entity("Flour"), &MetadataBag::default()).unwrap();
        assert_eq!(projected.stock, StockLevels::default());
        assert_eq!(projected.status, StockStatus::Critical);
        assert_eq!(projected.days_remaining, 999);
        assert_eq!(projected.total_value, Decimal::ZERO);
    }

    #[test]
    fn alerts_sort_by_priority_then_days_then_name() {
        let items = vec![
            item("Basil", dec!(8), dec!(10), dec!(1)),
            item("Cream", dec!(2), dec!(10), dec!(1)),
            item("Apples", dec!(8), dec!(10), dec!(1)),
            item("Salt", dec!(50), dec!(10), dec!(1)),
            item("Butter", dec!(0), dec!(10), dec!(0)),
        ];
        let alerts = reorder_alerts(&items);
        let names: Vec<&str> = alerts.iter().map(|a| a.name.as_str()).collect();
        // Butter never runs out by rate but has no stock at all
        assert_eq!(names, vec!["Cream", "Butter", "Apples", "Basil"]);
        assert_eq!(alerts[1].priority, AlertPriority::Critical);
        assert_eq!(alerts[2].priority, AlertPriority::Medium);
    }

    #[test]
    fn threshold_validation_rejects_inverted_levels() {
        let input = InventoryItemInput {
            reorder_point: dec!(20),
            max_stock_level: dec!(10),
            ..Default::default()
        };
        assert!(input.validate().is_err());

        let unbounded = InventoryItemInput {
            reorder_point: dec!(20),
            ..Default::default()
        };
        assert!(unbounded.validate().is_ok());

        let negative = InventoryItemInput {
            initial_stock: dec!(-1),
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn lines_for_one_product_are_summed() {
        let p = Uuid::new_v4();
        let q = Uuid::new_v4();
        let totals = requested_by_product(&[
            OrderItem { product_id: p, quantity: dec!(2) },
            OrderItem { product_id: q, quantity: dec!(1) },
            OrderItem { product_id: p, quantity: dec!(3) },
        ]);
        assert_eq!(totals, vec![(p, dec!(5)), (q, dec!(1))]);
    }
}
