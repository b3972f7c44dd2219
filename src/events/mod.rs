use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::inventory::{AlertPriority, InventoryTransactionType};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sender plus the receiving end for [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes after a committed mutation. A closed channel is logged and
    /// otherwise ignored.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "domain event dropped");
        }
    }
}

/// Domain events published by the services after their database work commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    InventoryItemCreated {
        organization_id: Uuid,
        inventory_item_id: Uuid,
        product_id: Uuid,
        initial_stock: Decimal,
    },
    StockUpdated {
        organization_id: Uuid,
        inventory_item_id: Uuid,
        transaction_type: InventoryTransactionType,
        previous_stock: Decimal,
        new_stock: Decimal,
        transaction_id: Uuid,
    },
    ReorderThresholdCrossed {
        organization_id: Uuid,
        inventory_item_id: Uuid,
        current_stock: Decimal,
        reorder_point: Decimal,
        priority: AlertPriority,
    },
    OrderInventoryApplied {
        organization_id: Uuid,
        order_id: String,
        lines: usize,
    },
    OrderInventoryRejected {
        organization_id: Uuid,
        order_id: String,
        short_lines: usize,
    },
    StaffMemberCreated {
        organization_id: Uuid,
        staff_member_id: Uuid,
        employee_id: String,
    },
    StaffPermissionsChanged {
        organization_id: Uuid,
        staff_member_id: Uuid,
    },
    StaffClockedIn {
        organization_id: Uuid,
        staff_member_id: Uuid,
        time_entry_id: Uuid,
        at: DateTime<Utc>,
    },
    StaffClockedOut {
        organization_id: Uuid,
        staff_member_id: Uuid,
        time_entry_id: Uuid,
        total_hours: Decimal,
        at: DateTime<Utc>,
    },
    ShiftScheduled {
        organization_id: Uuid,
        staff_member_id: Uuid,
        shift_id: Uuid,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::InventoryItemCreated { .. } => "inventory_item_created",
            Event::StockUpdated { .. } => "stock_updated",
            Event::ReorderThresholdCrossed { .. } => "reorder_threshold_crossed",
            Event::OrderInventoryApplied { .. } => "order_inventory_applied",
            Event::OrderInventoryRejected { .. } => "order_inventory_rejected",
            Event::StaffMemberCreated { .. } => "staff_member_created",
            Event::StaffPermissionsChanged { .. } => "staff_permissions_changed",
            Event::StaffClockedIn { .. } => "staff_clocked_in",
            Event::StaffClockedOut { .. } => "staff_clocked_out",
            Event::ShiftScheduled { .. } => "shift_scheduled",
        }
    }
}

/// Drains the channel, logging each event, until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ReorderThresholdCrossed {
                organization_id,
                inventory_item_id,
                current_stock,
                reorder_point,
                priority,
            } => {
                warn!(
                    %organization_id,
                    %inventory_item_id,
                    %current_stock,
                    %reorder_point,
                    %priority,
                    "inventory item needs reordering"
                );
            }
            Event::OrderInventoryRejected {
                organization_id,
                order_id,
                short_lines,
            } => {
                warn!(%organization_id, %order_id, short_lines, "order could not be fulfilled from stock");
            }
            other => match serde_json::to_string(other) {
                Ok(payload) => info!(event = other.name(), %payload, "domain event"),
                Err(e) => error!(event = other.name(), error = %e, "failed to encode event"),
            },
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (sender, rx) = EventSender::channel(4);
        drop(rx);
        sender
            .send_or_log(Event::ShiftScheduled {
                organization_id: Uuid::new_v4(),
                staff_member_id: Uuid::new_v4(),
                shift_id: Uuid::new_v4(),
            })
            .await;
        assert!(sender
            .send(Event::StaffPermissionsChanged {
                organization_id: Uuid::new_v4(),
                staff_member_id: Uuid::new_v4(),
            })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn events_are_delivered_in_order() {
        let (sender, mut rx) = EventSender::channel(4);
        let org = Uuid::new_v4();
        let first = Event::StaffMemberCreated {
            organization_id: org,
            staff_member_id: Uuid::new_v4(),
            employee_id: "EMP-0001".into(),
        };
        let second = Event::StaffPermissionsChanged {
            organization_id: org,
            staff_member_id: Uuid::new_v4(),
        };
        sender.send(first.clone()).await.unwrap();
        sender.send(second.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("staff_permissions_changed"));
    }
}
