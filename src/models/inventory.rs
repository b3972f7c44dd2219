//! Inventory documents and the derived-state rules computed from them.

use super::MetadataDocument;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Reported when an item has no consumption rate and therefore never runs out.
pub const NEVER_RUNS_OUT_DAYS: i64 = 999;

/// Stock at or above this share of the max level counts as optimal.
pub const OPTIMAL_STOCK_RATIO: Decimal = dec!(0.8);

/// Reorder suggestions cover this many days of projected use.
pub const REORDER_COVERAGE_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevels {
    pub current_stock: Decimal,
    #[serde(default)]
    pub reorder_point: Decimal,
    #[serde(default)]
    pub reorder_quantity: Decimal,
    #[serde(default)]
    pub max_stock_level: Decimal,
    #[serde(default = "default_unit")]
    pub unit_of_measure: String,
}

impl Default for StockLevels {
    fn default() -> Self {
        Self {
            current_stock: Decimal::ZERO,
            reorder_point: Decimal::ZERO,
            reorder_quantity: Decimal::ZERO,
            max_stock_level: Decimal::ZERO,
            unit_of_measure: default_unit(),
        }
    }
}

impl MetadataDocument for StockLevels {
    const KEY: &'static str = "stock_levels";
    const CATEGORY: &'static str = "inventory";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    #[serde(default)]
    pub unit_cost: Decimal,
    #[serde(default)]
    pub avg_cost: Option<Decimal>,
    #[serde(default)]
    pub last_purchase_cost: Option<Decimal>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for CostInfo {
    fn default() -> Self {
        Self {
            unit_cost: Decimal::ZERO,
            avg_cost: None,
            last_purchase_cost: None,
            currency: default_currency(),
        }
    }
}

impl CostInfo {
    /// Average cost, or the list unit cost when no receipt has set one yet.
    pub fn effective_cost(&self) -> Decimal {
        self.avg_cost.unwrap_or(self.unit_cost)
    }
}

impl MetadataDocument for CostInfo {
    const KEY: &'static str = "cost_info";
    const CATEGORY: &'static str = "financial";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackingInfo {
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
    #[serde(default)]
    pub lot_tracking: bool,
}

impl MetadataDocument for TrackingInfo {
    const KEY: &'static str = "tracking_info";
    const CATEGORY: &'static str = "inventory";
}

/// Running consumption figures for an item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InventoryUsageAnalytics {
    /// Units consumed per day
    #[serde(default)]
    pub consumption_rate: Decimal,
    #[serde(default)]
    pub total_received: Decimal,
    #[serde(default)]
    pub total_used: Decimal,
    #[serde(default)]
    pub total_wasted: Decimal,
    #[serde(default)]
    pub total_adjusted: Decimal,
    #[serde(default)]
    pub last_restock_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_usage_at: Option<DateTime<Utc>>,
}

impl InventoryUsageAnalytics {
    /// Folds one applied stock movement into the running totals.
    pub fn record(
        &mut self,
        transaction_type: InventoryTransactionType,
        applied_delta: Decimal,
        at: DateTime<Utc>,
    ) {
        match transaction_type {
            InventoryTransactionType::Receipt | InventoryTransactionType::OpeningBalance => {
                self.total_received = self.total_received.saturating_add(applied_delta.abs());
                self.last_restock_at = Some(at);
            }
            InventoryTransactionType::Usage => {
                self.total_used = self.total_used.saturating_add(applied_delta.abs());
                self.last_usage_at = Some(at);
            }
            InventoryTransactionType::Waste => {
                self.total_wasted = self.total_wasted.saturating_add(applied_delta.abs());
            }
            InventoryTransactionType::Adjustment => {
                self.total_adjusted = self.total_adjusted.saturating_add(applied_delta);
            }
        }
    }
}

impl MetadataDocument for InventoryUsageAnalytics {
    const KEY: &'static str = "analytics";
    const CATEGORY: &'static str = "analytics";
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InventoryTransactionType {
    Receipt,
    Usage,
    Adjustment,
    Waste,
    OpeningBalance,
}

impl InventoryTransactionType {
    /// Normalizes a requested quantity to the direction the type implies:
    /// receipts always add, usage and waste always remove, adjustments keep
    /// the caller's sign.
    pub fn signed_delta(self, quantity: Decimal) -> Decimal {
        match self {
            Self::Receipt | Self::OpeningBalance => quantity.abs(),
            Self::Usage | Self::Waste => -quantity.abs(),
            Self::Adjustment => quantity,
        }
    }
}

/// Append-only record of one stock movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransactionDetails {
    pub inventory_item_id: Uuid,
    pub transaction_type: InventoryTransactionType,
    /// Signed quantity that was requested
    pub quantity: Decimal,
    /// `new_stock - previous_stock`; differs from `quantity` when clamped at zero
    pub applied_delta: Decimal,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub unit_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub reference_id: Option<String>,
    pub performed_by: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl MetadataDocument for InventoryTransactionDetails {
    const KEY: &'static str = "transaction_details";
    const CATEGORY: &'static str = "transaction";
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StockStatus {
    Critical,
    Low,
    Good,
    Optimal,
}

impl StockStatus {
    /// Classifies a stock level. The checks run in a fixed order (critical,
    /// low, optimal, then good) because the ranges overlap when the max level
    /// is small.
    pub fn classify(
        current_stock: Decimal,
        reorder_point: Decimal,
        max_stock_level: Decimal,
    ) -> Self {
        if current_stock <= Decimal::ZERO {
            StockStatus::Critical
        } else if current_stock <= reorder_point {
            StockStatus::Low
        } else if current_stock
            >= max_stock_level
                .checked_mul(OPTIMAL_STOCK_RATIO)
                .unwrap_or(max_stock_level)
        {
            StockStatus::Optimal
        } else {
            StockStatus::Good
        }
    }

    pub fn of(levels: &StockLevels) -> Self {
        Self::classify(
            levels.current_stock,
            levels.reorder_point,
            levels.max_stock_level,
        )
    }
}

/// Whole days of stock left at the current consumption rate.
pub fn days_remaining(current_stock: Decimal, consumption_rate: Decimal) -> i64 {
    if consumption_rate <= Decimal::ZERO {
        return NEVER_RUNS_OUT_DAYS;
    }
    current_stock
        .checked_div(consumption_rate)
        .and_then(|days| days.floor().to_i64())
        .unwrap_or(NEVER_RUNS_OUT_DAYS)
}

/// Weighted average cost after receiving `received` units at `unit_cost`.
/// `None` when the intermediate products leave `Decimal` range.
pub fn weighted_average_cost(
    old_stock: Decimal,
    old_avg_cost: Decimal,
    received: Decimal,
    unit_cost: Decimal,
    new_stock: Decimal,
) -> Option<Decimal> {
    if new_stock <= Decimal::ZERO {
        return Some(unit_cost);
    }
    let held = old_stock.max(Decimal::ZERO).checked_mul(old_avg_cost)?;
    let bought = received.abs().checked_mul(unit_cost)?;
    held.checked_add(bought)?.checked_div(new_stock)
}

/// Quantity to order: the configured reorder quantity or enough for
/// [`REORDER_COVERAGE_DAYS`] of use, whichever is larger.
pub fn suggested_reorder_quantity(reorder_quantity: Decimal, consumption_rate: Decimal) -> Decimal {
    let coverage = consumption_rate
        .max(Decimal::ZERO)
        .saturating_mul(Decimal::from(REORDER_COVERAGE_DAYS))
        .ceil();
    reorder_quantity.max(coverage)
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl AlertPriority {
    pub fn classify(current_stock: Decimal, days_remaining: i64) -> Self {
        if current_stock <= Decimal::ZERO || days_remaining <= 3 {
            AlertPriority::Critical
        } else if days_remaining <= 7 {
            AlertPriority::High
        } else if days_remaining <= 14 {
            AlertPriority::Medium
        } else {
            AlertPriority::Low
        }
    }

    /// Sort rank, most urgent first.
    pub fn rank(self) -> u8 {
        match self {
            AlertPriority::Critical => 0,
            AlertPriority::High => 1,
            AlertPriority::Medium => 2,
            AlertPriority::Low => 3,
        }
    }
}

/// Inventory item assembled from its entity row and metadata documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub product_id: Option<Uuid>,
    pub name: String,
    pub code: Option<String>,
    pub stock: StockLevels,
    pub cost: CostInfo,
    pub tracking: TrackingInfo,
    pub analytics: InventoryUsageAnalytics,
    pub status: StockStatus,
    pub days_remaining: i64,
    pub total_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderAlert {
    pub inventory_item_id: Uuid,
    pub name: String,
    pub current_stock: Decimal,
    pub reorder_point: Decimal,
    pub days_remaining: i64,
    pub priority: AlertPriority,
    pub suggested_quantity: Decimal,
    pub estimated_cost: Decimal,
    pub unit_of_measure: String,
}

impl ReorderAlert {
    /// Builds an alert for items at or below their reorder point that are not
    /// already classed optimal.
    pub fn for_item(item: &InventoryItem) -> Option<Self> {
        if item.stock.current_stock > item.stock.reorder_point
            || item.status == StockStatus::Optimal
        {
            return None;
        }

        let suggested_quantity = suggested_reorder_quantity(
            item.stock.reorder_quantity,
            item.analytics.consumption_rate,
        );
        Some(Self {
            inventory_item_id: item.id,
            name: item.name.clone(),
            current_stock: item.stock.current_stock,
            reorder_point: item.stock.reorder_point,
            days_remaining: item.days_remaining,
            priority: AlertPriority::classify(item.stock.current_stock, item.days_remaining),
            suggested_quantity,
            estimated_cost: suggested_quantity.saturating_mul(item.cost.effective_cost()),
            unit_of_measure: item.stock.unit_of_measure.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub critical: usize,
    pub low: usize,
    pub good: usize,
    pub optimal: usize,
}

impl StatusBreakdown {
    pub fn add(&mut self, status: StockStatus) {
        match status {
            StockStatus::Critical => self.critical += 1,
            StockStatus::Low => self.low += 1,
            StockStatus::Good => self.good += 1,
            StockStatus::Optimal => self.optimal += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub item_count: usize,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRanking {
    pub inventory_item_id: Uuid,
    pub name: String,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionTotals {
    pub receipts: usize,
    pub usage: usize,
    pub waste: usize,
    pub adjustments: usize,
    pub received_quantity: Decimal,
    pub used_quantity: Decimal,
    pub wasted_quantity: Decimal,
}

impl TransactionTotals {
    pub fn add(&mut self, details: &InventoryTransactionDetails) {
        match details.transaction_type {
            InventoryTransactionType::Receipt => {
                self.receipts += 1;
                self.received_quantity =
                    self.received_quantity.saturating_add(details.applied_delta.abs());
            }
            InventoryTransactionType::Usage => {
                self.usage += 1;
                self.used_quantity = self.used_quantity.saturating_add(details.applied_delta.abs());
            }
            InventoryTransactionType::Waste => {
                self.waste += 1;
                self.wasted_quantity =
                    self.wasted_quantity.saturating_add(details.applied_delta.abs());
            }
            InventoryTransactionType::Adjustment => self.adjustments += 1,
            InventoryTransactionType::OpeningBalance => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAnalytics {
    pub total_items: usize,
    pub total_value: Decimal,
    pub status_breakdown: StatusBreakdown,
    pub reorder_alert_count: usize,
    pub categories: Vec<CategorySummary>,
    pub top_value_items: Vec<ValueRanking>,
    pub last_30_days: TransactionTotals,
}

/// One line of an order to be fulfilled from stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsufficientStock {
    pub product_id: Uuid,
    pub inventory_item_id: Uuid,
    pub name: String,
    pub requested: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub inventory_item_id: Uuid,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub transaction_id: Uuid,
}

/// Result of applying an order to inventory. Shortfalls are a business
/// outcome, not an error: nothing is deducted when any line is short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrderInventoryOutcome {
    Applied { movements: Vec<StockMovement> },
    InsufficientStock { lines: Vec<InsufficientStock> },
}

/// Result of replaying an item's transaction history against its stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReconciliation {
    pub inventory_item_id: Uuid,
    pub recorded_stock: Decimal,
    pub replayed_stock: Decimal,
    pub transaction_count: usize,
    pub consistent: bool,
}

fn default_unit() -> String {
    "unit".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(dec!(0), dec!(5), dec!(100), StockStatus::Critical)]
    #[case(dec!(-2), dec!(0), dec!(0), StockStatus::Critical)]
    #[case(dec!(4), dec!(5), dec!(100), StockStatus::Low)]
    #[case(dec!(5), dec!(5), dec!(100), StockStatus::Low)]
    #[case(dec!(10), dec!(5), dec!(100), StockStatus::Good)]
    #[case(dec!(80), dec!(5), dec!(100), StockStatus::Optimal)]
    // Overlapping ranges: low wins over optimal when max level is tiny
    #[case(dec!(3), dec!(5), dec!(2), StockStatus::Low)]
    #[case(dec!(6), dec!(5), dec!(2), StockStatus::Optimal)]
    fn classifies_stock_status(
        #[case] stock: Decimal,
        #[case] reorder: Decimal,
        #[case] max: Decimal,
        #[case] expected: StockStatus,
    ) {
        assert_eq!(StockStatus::classify(stock, reorder, max), expected);
    }

    #[test]
    fn days_remaining_floors_and_uses_sentinel() {
        assert_eq!(days_remaining(dec!(10), dec!(3)), 3);
        assert_eq!(days_remaining(dec!(10), dec!(0)), NEVER_RUNS_OUT_DAYS);
        assert_eq!(days_remaining(dec!(0), dec!(2)), 0);
    }

    #[test]
    fn weighted_average_matches_receipt_formula() {
        let avg = weighted_average_cost(dec!(10), dec!(3), dec!(20), dec!(5), dec!(30)).unwrap();
        assert_eq!(avg.round_dp(3), dec!(4.333));
        // Empty starting stock takes the new unit cost
        assert_eq!(
            weighted_average_cost(dec!(0), dec!(9), dec!(4), dec!(2), dec!(4)),
            Some(dec!(2))
        );
        assert_eq!(
            weighted_average_cost(Decimal::MAX, dec!(2), dec!(1), dec!(1), Decimal::MAX),
            None
        );
    }

    #[test]
    fn derived_values_saturate_instead_of_overflowing() {
        assert_eq!(
            StockStatus::classify(Decimal::MAX, dec!(0), Decimal::MAX),
            StockStatus::Optimal
        );
        assert_eq!(suggested_reorder_quantity(dec!(1), Decimal::MAX), Decimal::MAX);

        let mut totals = InventoryUsageAnalytics {
            total_used: Decimal::MAX,
            ..Default::default()
        };
        totals.record(InventoryTransactionType::Usage, dec!(-5), Utc::now());
        assert_eq!(totals.total_used, Decimal::MAX);
    }

    #[test]
    fn reorder_suggestion_covers_thirty_days() {
        assert_eq!(suggested_reorder_quantity(dec!(10), dec!(1.5)), dec!(45));
        assert_eq!(suggested_reorder_quantity(dec!(50), dec!(1)), dec!(50));
        assert_eq!(suggested_reorder_quantity(dec!(0), dec!(0.01)), dec!(1));
    }

    #[rstest]
    #[case(dec!(0), 50, AlertPriority::Critical)]
    #[case(dec!(4), 3, AlertPriority::Critical)]
    #[case(dec!(4), 7, AlertPriority::High)]
    #[case(dec!(4), 14, AlertPriority::Medium)]
    #[case(dec!(4), 15, AlertPriority::Low)]
    fn classifies_alert_priority(
        #[case] stock: Decimal,
        #[case] days: i64,
        #[case] expected: AlertPriority,
    ) {
        assert_eq!(AlertPriority::classify(stock, days), expected);
    }

    #[test]
    fn transaction_types_normalize_direction() {
        use InventoryTransactionType::*;
        assert_eq!(Receipt.signed_delta(dec!(-20)), dec!(20));
        assert_eq!(Usage.signed_delta(dec!(6)), dec!(-6));
        assert_eq!(Usage.signed_delta(dec!(-6)), dec!(-6));
        assert_eq!(Waste.signed_delta(dec!(2)), dec!(-2));
        assert_eq!(Adjustment.signed_delta(dec!(-3)), dec!(-3));
    }

    #[test]
    fn stock_levels_decode_with_missing_thresholds() {
        let levels = StockLevels::from_json(&serde_json::json!({ "current_stock": "12.5" }))
            .expect("decode");
        assert_eq!(levels.current_stock, dec!(12.5));
        assert_eq!(levels.reorder_point, Decimal::ZERO);
        assert_eq!(levels.unit_of_measure, "unit");
    }

    #[test]
    fn malformed_document_is_a_serialization_error() {
        let err = StockLevels::from_json(&serde_json::json!({ "reorder_point": 5 })).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::ServiceError::SerializationError(ref msg) if msg.contains("stock_levels")
        ));
    }
}
