use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use harborerp_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use harborerp_events::Event;

/// Stream type identifier for inventory item aggregates.
pub const AGGREGATE_TYPE: &str = "inventory.item";

/// Inventory item identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: InventoryItem.
///
/// Holds the two fields this module alone may mutate: `on_hand` (never
/// negative) and `avg_cost` (weighted average of all inbound cost). Issues
/// never move the average; receipts blend their unit cost into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: InventoryItemId,
    tenant_id: Option<TenantId>,
    name: String,
    category: String,
    unit: String,
    on_hand: i64,
    min_stock_level: i64,
    avg_cost: Decimal,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: InventoryItemId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            category: String::new(),
            unit: String::new(),
            on_hand: 0,
            min_stock_level: 0,
            avg_cost: Decimal::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn min_stock_level(&self) -> i64 {
        self.min_stock_level
    }

    pub fn avg_cost(&self) -> Decimal {
        self.avg_cost
    }

    pub fn is_below_min_stock(&self) -> bool {
        self.on_hand < self.min_stock_level
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub min_stock_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveStock (inbound movement; blends unit cost into the average).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueStock (outbound movement; cost basis untouched).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseIssue.
///
/// Compensating action for a multi-line goods issue that failed partway:
/// restores quantity without touching the cost basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseIssue {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseReceipt.
///
/// Compensating action for a multi-line goods receipt that failed partway:
/// backs the received batch out of both quantity and cost basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseReceipt {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    RegisterItem(RegisterItem),
    ReceiveStock(ReceiveStock),
    IssueStock(IssueStock),
    ReverseIssue(ReverseIssue),
    ReverseReceipt(ReverseReceipt),
}

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub min_stock_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceived.
///
/// Carries the post-movement snapshot so projections and document flows can
/// report the updated stock without re-deriving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub new_on_hand: i64,
    pub new_avg_cost: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssued {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub new_on_hand: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIssueReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssueReversed {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub new_on_hand: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceiptReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceiptReversed {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub new_on_hand: i64,
    pub new_avg_cost: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemRegistered(ItemRegistered),
    StockReceived(StockReceived),
    StockIssued(StockIssued),
    StockIssueReversed(StockIssueReversed),
    StockReceiptReversed(StockReceiptReversed),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemRegistered(_) => "inventory.item.registered",
            InventoryEvent::StockReceived(_) => "inventory.item.stock_received",
            InventoryEvent::StockIssued(_) => "inventory.item.stock_issued",
            InventoryEvent::StockIssueReversed(_) => "inventory.item.stock_issue_reversed",
            InventoryEvent::StockReceiptReversed(_) => "inventory.item.stock_receipt_reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemRegistered(e) => e.occurred_at,
            InventoryEvent::StockReceived(e) => e.occurred_at,
            InventoryEvent::StockIssued(e) => e.occurred_at,
            InventoryEvent::StockIssueReversed(e) => e.occurred_at,
            InventoryEvent::StockReceiptReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemRegistered(e) => {
                self.id = e.item_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.unit = e.unit.clone();
                self.on_hand = 0;
                self.min_stock_level = e.min_stock_level;
                self.avg_cost = Decimal::ZERO;
                self.created = true;
            }
            InventoryEvent::StockReceived(e) => {
                self.on_hand = e.new_on_hand;
                self.avg_cost = e.new_avg_cost;
            }
            InventoryEvent::StockIssued(e) => {
                self.on_hand = e.new_on_hand;
            }
            InventoryEvent::StockIssueReversed(e) => {
                self.on_hand = e.new_on_hand;
            }
            InventoryEvent::StockReceiptReversed(e) => {
                self.on_hand = e.new_on_hand;
                self.avg_cost = e.new_avg_cost;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::RegisterItem(cmd) => self.handle_register(cmd),
            InventoryCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
            InventoryCommand::IssueStock(cmd) => self.handle_issue(cmd),
            InventoryCommand::ReverseIssue(cmd) => self.handle_reverse_issue(cmd),
            InventoryCommand::ReverseReceipt(cmd) => self.handle_reverse_receipt(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::validation("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_item_id(&self, item_id: InventoryItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::validation("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_registered(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_item_id(item_id)
    }

    fn handle_register(&self, cmd: &RegisterItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already registered"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.unit.trim().is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        if cmd.min_stock_level < 0 {
            return Err(DomainError::validation("min_stock_level cannot be negative"));
        }
        Ok(vec![InventoryEvent::ItemRegistered(ItemRegistered {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            unit: cmd.unit.clone(),
            min_stock_level: cmd.min_stock_level,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.tenant_id, cmd.item_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::invalid_quantity(
                "receipt quantity must be positive",
            ));
        }
        // Zero-cost receipts are legal (donated stock) and pull the average
        // toward zero; negative cost is not.
        if cmd.unit_cost < Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "unit cost cannot be negative",
            ));
        }

        let new_on_hand = self
            .on_hand
            .checked_add(cmd.quantity)
            .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;

        let new_avg_cost = blend_average(self.on_hand, self.avg_cost, cmd.quantity, cmd.unit_cost);

        Ok(vec![InventoryEvent::StockReceived(StockReceived {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            unit_cost: cmd.unit_cost,
            new_on_hand,
            new_avg_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.tenant_id, cmd.item_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::invalid_quantity(
                "issue quantity must be positive",
            ));
        }
        if cmd.quantity > self.on_hand {
            return Err(DomainError::insufficient_stock(cmd.quantity, self.on_hand));
        }

        Ok(vec![InventoryEvent::StockIssued(StockIssued {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            new_on_hand: self.on_hand - cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse_issue(&self, cmd: &ReverseIssue) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.tenant_id, cmd.item_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::invalid_quantity(
                "reversal quantity must be positive",
            ));
        }

        let new_on_hand = self
            .on_hand
            .checked_add(cmd.quantity)
            .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;

        Ok(vec![InventoryEvent::StockIssueReversed(
            StockIssueReversed {
                tenant_id: cmd.tenant_id,
                item_id: cmd.item_id,
                quantity: cmd.quantity,
                new_on_hand,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reverse_receipt(
        &self,
        cmd: &ReverseReceipt,
    ) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.tenant_id, cmd.item_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::invalid_quantity(
                "reversal quantity must be positive",
            ));
        }
        if cmd.quantity > self.on_hand {
            return Err(DomainError::insufficient_stock(cmd.quantity, self.on_hand));
        }

        let new_on_hand = self.on_hand - cmd.quantity;
        // Remove the batch from the cost basis; the last batch out resets the
        // average to zero.
        let new_avg_cost = if new_on_hand == 0 {
            Decimal::ZERO
        } else {
            let remaining_value = Decimal::from(self.on_hand) * self.avg_cost
                - Decimal::from(cmd.quantity) * cmd.unit_cost;
            if remaining_value < Decimal::ZERO {
                return Err(DomainError::validation(
                    "receipt reversal would make cost basis negative",
                ));
            }
            remaining_value / Decimal::from(new_on_hand)
        };

        Ok(vec![InventoryEvent::StockReceiptReversed(
            StockReceiptReversed {
                tenant_id: cmd.tenant_id,
                item_id: cmd.item_id,
                quantity: cmd.quantity,
                unit_cost: cmd.unit_cost,
                new_on_hand,
                new_avg_cost,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

/// Weighted-average blend: `(on_hand * avg + qty * cost) / (on_hand + qty)`.
///
/// First receipt (on_hand = 0) reduces to exactly `cost`.
fn blend_average(on_hand: i64, avg_cost: Decimal, quantity: i64, unit_cost: Decimal) -> Decimal {
    let current_value = Decimal::from(on_hand) * avg_cost;
    let incoming_value = Decimal::from(quantity) * unit_cost;
    (current_value + incoming_value) / Decimal::from(on_hand + quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harborerp_core::AggregateId;
    use proptest::prelude::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_item_id() -> InventoryItemId {
        InventoryItemId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered_item(tenant_id: TenantId, item_id: InventoryItemId) -> InventoryItem {
        let mut item = InventoryItem::empty(item_id);
        let events = item
            .handle(&InventoryCommand::RegisterItem(RegisterItem {
                tenant_id,
                item_id,
                name: "Anchor chain".to_string(),
                category: "deck".to_string(),
                unit: "m".to_string(),
                min_stock_level: 5,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }
        item
    }

    fn receive(item: &mut InventoryItem, quantity: i64, unit_cost: Decimal) {
        let events = item
            .handle(&InventoryCommand::ReceiveStock(ReceiveStock {
                tenant_id: item.tenant_id().unwrap(),
                item_id: item.id_typed(),
                quantity,
                unit_cost,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }
    }

    fn issue(item: &mut InventoryItem, quantity: i64) -> Result<(), DomainError> {
        let events = item.handle(&InventoryCommand::IssueStock(IssueStock {
            tenant_id: item.tenant_id().unwrap(),
            item_id: item.id_typed(),
            quantity,
            occurred_at: test_time(),
        }))?;
        for e in &events {
            item.apply(e);
        }
        Ok(())
    }

    #[test]
    fn first_receipt_sets_average_to_unit_cost() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = registered_item(tenant_id, item_id);

        receive(&mut item, 10, Decimal::from(5));

        assert_eq!(item.on_hand(), 10);
        assert_eq!(item.avg_cost(), Decimal::from(5));
    }

    #[test]
    fn receipts_blend_into_weighted_average() {
        // Receive(10, $5) -> stock 10 @ $5; Receive(10, $7) -> stock 20 @ $6.
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = registered_item(tenant_id, item_id);

        receive(&mut item, 10, Decimal::from(5));
        receive(&mut item, 10, Decimal::from(7));

        assert_eq!(item.on_hand(), 20);
        assert_eq!(item.avg_cost(), Decimal::from(6));
    }

    #[test]
    fn zero_cost_receipt_pulls_average_down() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = registered_item(tenant_id, item_id);

        receive(&mut item, 10, Decimal::from(8));
        receive(&mut item, 10, Decimal::ZERO);

        assert_eq!(item.avg_cost(), Decimal::from(4));
    }

    #[test]
    fn issue_reduces_stock_but_not_average() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = registered_item(tenant_id, item_id);

        receive(&mut item, 10, Decimal::from(5));
        receive(&mut item, 10, Decimal::from(7));

        issue(&mut item, 15).unwrap();

        assert_eq!(item.on_hand(), 5);
        assert_eq!(item.avg_cost(), Decimal::from(6));
    }

    #[test]
    fn issue_beyond_stock_fails_and_leaves_state_unchanged() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = registered_item(tenant_id, item_id);

        receive(&mut item, 10, Decimal::from(5));
        receive(&mut item, 10, Decimal::from(7));

        let err = issue(&mut item, 25).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                requested,
                available,
            } => {
                assert_eq!(requested, 25);
                assert_eq!(available, 20);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(item.on_hand(), 20);
        assert_eq!(item.avg_cost(), Decimal::from(6));
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let item = registered_item(tenant_id, item_id);

        let err = item
            .handle(&InventoryCommand::ReceiveStock(ReceiveStock {
                tenant_id,
                item_id,
                quantity: 0,
                unit_cost: Decimal::from(5),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));

        let err = item
            .handle(&InventoryCommand::IssueStock(IssueStock {
                tenant_id,
                item_id,
                quantity: -3,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn negative_unit_cost_is_rejected() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let item = registered_item(tenant_id, item_id);

        let err = item
            .handle(&InventoryCommand::ReceiveStock(ReceiveStock {
                tenant_id,
                item_id,
                quantity: 1,
                unit_cost: Decimal::from(-1),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn movements_on_unregistered_item_are_not_found() {
        let item = InventoryItem::empty(test_item_id());

        let err = item
            .handle(&InventoryCommand::ReceiveStock(ReceiveStock {
                tenant_id: test_tenant_id(),
                item_id: item.id_typed(),
                quantity: 1,
                unit_cost: Decimal::ONE,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn reverse_issue_restores_stock_without_moving_average() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = registered_item(tenant_id, item_id);

        receive(&mut item, 10, Decimal::from(6));
        issue(&mut item, 4).unwrap();

        let events = item
            .handle(&InventoryCommand::ReverseIssue(ReverseIssue {
                tenant_id,
                item_id,
                quantity: 4,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }

        assert_eq!(item.on_hand(), 10);
        assert_eq!(item.avg_cost(), Decimal::from(6));
    }

    #[test]
    fn reverse_receipt_backs_batch_out_of_cost_basis() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = registered_item(tenant_id, item_id);

        receive(&mut item, 10, Decimal::from(5));
        receive(&mut item, 10, Decimal::from(7));

        let events = item
            .handle(&InventoryCommand::ReverseReceipt(ReverseReceipt {
                tenant_id,
                item_id,
                quantity: 10,
                unit_cost: Decimal::from(7),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }

        assert_eq!(item.on_hand(), 10);
        assert_eq!(item.avg_cost(), Decimal::from(5));
    }

    #[test]
    fn reversing_the_only_batch_resets_average() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = registered_item(tenant_id, item_id);

        receive(&mut item, 10, Decimal::from(5));

        let events = item
            .handle(&InventoryCommand::ReverseReceipt(ReverseReceipt {
                tenant_id,
                item_id,
                quantity: 10,
                unit_cost: Decimal::from(5),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }

        assert_eq!(item.on_hand(), 0);
        assert_eq!(item.avg_cost(), Decimal::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of receipts, on-hand stock equals the
        /// sum of quantities, the average sits within the received cost range,
        /// and `on_hand * avg_cost` matches the exact running cost basis
        /// within a fixed decimal tolerance.
        #[test]
        fn receipts_track_the_weighted_average(
            batches in prop::collection::vec((1i64..1_000i64, 0i64..10_000i64), 1..12)
        ) {
            let tenant_id = test_tenant_id();
            let item_id = test_item_id();
            let mut item = registered_item(tenant_id, item_id);

            let mut total_qty: i64 = 0;
            let mut total_value = Decimal::ZERO;
            let mut min_cost: Option<Decimal> = None;
            let mut max_cost: Option<Decimal> = None;

            for (qty, cost_cents) in batches {
                let unit_cost = Decimal::new(cost_cents, 2);
                receive(&mut item, qty, unit_cost);

                total_qty += qty;
                total_value += Decimal::from(qty) * unit_cost;
                min_cost = Some(min_cost.map_or(unit_cost, |m: Decimal| m.min(unit_cost)));
                max_cost = Some(max_cost.map_or(unit_cost, |m: Decimal| m.max(unit_cost)));

                prop_assert_eq!(item.on_hand(), total_qty);
                prop_assert!(item.avg_cost() >= min_cost.unwrap());
                prop_assert!(item.avg_cost() <= max_cost.unwrap());

                let basis = Decimal::from(item.on_hand()) * item.avg_cost();
                let drift = (basis - total_value).abs();
                prop_assert!(drift < Decimal::new(1, 6), "cost basis drift: {}", drift);
            }
        }

        /// Property: an issue fails with InsufficientStock exactly when the
        /// requested quantity exceeds on-hand stock, and a failed issue leaves
        /// the state untouched.
        #[test]
        fn issues_never_go_negative(
            received in 1i64..500i64,
            requested in 1i64..1_000i64,
        ) {
            let tenant_id = test_tenant_id();
            let item_id = test_item_id();
            let mut item = registered_item(tenant_id, item_id);
            receive(&mut item, received, Decimal::from(3));

            let before_stock = item.on_hand();
            let before_avg = item.avg_cost();
            let result = issue(&mut item, requested);

            if requested > received {
                let is_insufficient_stock = matches!(result, Err(DomainError::InsufficientStock { .. }));
                prop_assert!(is_insufficient_stock);
                prop_assert_eq!(item.on_hand(), before_stock);
            } else {
                prop_assert!(result.is_ok());
                prop_assert_eq!(item.on_hand(), received - requested);
            }
            prop_assert_eq!(item.avg_cost(), before_avg);
            prop_assert!(item.on_hand() >= 0);
        }
    }
}
