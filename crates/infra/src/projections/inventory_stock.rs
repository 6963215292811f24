use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use harborerp_core::TenantId;
use harborerp_events::EventEnvelope;
use harborerp_inventory::{InventoryEvent, InventoryItemId, item};

use super::{CursorCheck, ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

/// Queryable stock snapshot per item: the `getStock` read surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReadModel {
    pub item_id: InventoryItemId,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub on_hand: i64,
    pub min_stock_level: i64,
    pub avg_cost: Decimal,
}

impl StockReadModel {
    pub fn is_below_min_stock(&self) -> bool {
        self.on_hand < self.min_stock_level
    }
}

/// Inventory stock projection.
///
/// Consumes published envelopes and maintains a tenant-isolated read model.
/// Non-inventory envelopes are ignored (the bus carries every aggregate).
#[derive(Debug)]
pub struct InventoryStockProjection<S>
where
    S: TenantStore<InventoryItemId, StockReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> InventoryStockProjection<S>
where
    S: TenantStore<InventoryItemId, StockReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Query the stock snapshot for one tenant/item.
    pub fn get(&self, tenant_id: TenantId, item_id: &InventoryItemId) -> Option<StockReadModel> {
        self.store.get(tenant_id, item_id)
    }

    /// List all items for a tenant.
    pub fn list(&self, tenant_id: TenantId) -> Vec<StockReadModel> {
        self.store.list(tenant_id)
    }

    /// List items whose on-hand stock sits below their minimum level.
    pub fn list_below_min_stock(&self, tenant_id: TenantId) -> Vec<StockReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(StockReadModel::is_below_min_stock)
            .collect()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != item::AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let CursorCheck::Duplicate = self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        // Validate tenant isolation at the event level.
        let (event_tenant, item_id) = match &event {
            InventoryEvent::ItemRegistered(e) => (e.tenant_id, e.item_id),
            InventoryEvent::StockReceived(e) => (e.tenant_id, e.item_id),
            InventoryEvent::StockIssued(e) => (e.tenant_id, e.item_id),
            InventoryEvent::StockIssueReversed(e) => (e.tenant_id, e.item_id),
            InventoryEvent::StockReceiptReversed(e) => (e.tenant_id, e.item_id),
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if item_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event item_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            InventoryEvent::ItemRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.item_id,
                    StockReadModel {
                        item_id: e.item_id,
                        name: e.name,
                        category: e.category,
                        unit: e.unit,
                        on_hand: 0,
                        min_stock_level: e.min_stock_level,
                        avg_cost: Decimal::ZERO,
                    },
                );
            }
            InventoryEvent::StockReceived(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.item_id) {
                    rm.on_hand = e.new_on_hand;
                    rm.avg_cost = e.new_avg_cost;
                    self.store.upsert(tenant_id, e.item_id, rm);
                }
            }
            InventoryEvent::StockIssued(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.item_id) {
                    rm.on_hand = e.new_on_hand;
                    self.store.upsert(tenant_id, e.item_id, rm);
                }
            }
            InventoryEvent::StockIssueReversed(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.item_id) {
                    rm.on_hand = e.new_on_hand;
                    self.store.upsert(tenant_id, e.item_id, rm);
                }
            }
            InventoryEvent::StockReceiptReversed(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.item_id) {
                    rm.on_hand = e.new_on_hand;
                    rm.avg_cost = e.new_avg_cost;
                    self.store.upsert(tenant_id, e.item_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
