use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use harborerp_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use harborerp_events::Event;
use harborerp_inventory::InventoryItemId;

/// Stream type identifier for goods receipt aggregates.
pub const AGGREGATE_TYPE: &str = "procurement.goods_receipt";

/// Goods receipt identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoodsReceiptId(pub AggregateId);

impl GoodsReceiptId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GoodsReceiptId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One inbound movement line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub line_no: u32,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub unit_cost: Decimal,
}

/// Aggregate root: GoodsReceipt.
///
/// An append-only audit record of inbound stock. Accepts exactly one command;
/// anything after creation is a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsReceipt {
    id: GoodsReceiptId,
    tenant_id: Option<TenantId>,
    reference: String,
    lines: Vec<ReceiptLine>,
    received_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl GoodsReceipt {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: GoodsReceiptId) -> Self {
        Self {
            id,
            tenant_id: None,
            reference: String::new(),
            lines: Vec::new(),
            received_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GoodsReceiptId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn lines(&self) -> &[ReceiptLine] {
        &self.lines
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }
}

impl AggregateRoot for GoodsReceipt {
    type Id = GoodsReceiptId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateGoodsReceipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGoodsReceipt {
    pub tenant_id: TenantId,
    pub receipt_id: GoodsReceiptId,
    pub reference: String,
    pub lines: Vec<ReceiptLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodsReceiptCommand {
    CreateGoodsReceipt(CreateGoodsReceipt),
}

/// Event: GoodsReceiptCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceiptCreated {
    pub tenant_id: TenantId,
    pub receipt_id: GoodsReceiptId,
    pub reference: String,
    pub lines: Vec<ReceiptLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodsReceiptEvent {
    GoodsReceiptCreated(GoodsReceiptCreated),
}

impl Event for GoodsReceiptEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GoodsReceiptEvent::GoodsReceiptCreated(_) => "procurement.goods_receipt.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GoodsReceiptEvent::GoodsReceiptCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for GoodsReceipt {
    type Command = GoodsReceiptCommand;
    type Event = GoodsReceiptEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GoodsReceiptEvent::GoodsReceiptCreated(e) => {
                self.id = e.receipt_id;
                self.tenant_id = Some(e.tenant_id);
                self.reference = e.reference.clone();
                self.lines = e.lines.clone();
                self.received_at = Some(e.occurred_at);
                self.created = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GoodsReceiptCommand::CreateGoodsReceipt(cmd) => self.handle_create(cmd),
        }
    }
}

impl GoodsReceipt {
    fn handle_create(&self, cmd: &CreateGoodsReceipt) -> Result<Vec<GoodsReceiptEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("goods receipt is immutable"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "goods receipt must have at least one line",
            ));
        }
        for line in &cmd.lines {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_quantity(format!(
                    "line {}: receipt quantity must be positive",
                    line.line_no
                )));
            }
            if line.unit_cost < Decimal::ZERO {
                return Err(DomainError::invalid_quantity(format!(
                    "line {}: unit cost cannot be negative",
                    line.line_no
                )));
            }
        }

        Ok(vec![GoodsReceiptEvent::GoodsReceiptCreated(
            GoodsReceiptCreated {
                tenant_id: cmd.tenant_id,
                receipt_id: cmd.receipt_id,
                reference: cmd.reference.clone(),
                lines: cmd.lines.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harborerp_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_receipt_id() -> GoodsReceiptId {
        GoodsReceiptId::new(AggregateId::new())
    }

    fn test_item_id() -> InventoryItemId {
        InventoryItemId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn valid_create(receipt_id: GoodsReceiptId, tenant_id: TenantId) -> CreateGoodsReceipt {
        CreateGoodsReceipt {
            tenant_id,
            receipt_id,
            reference: "GR-2026-0001".to_string(),
            lines: vec![ReceiptLine {
                line_no: 1,
                item_id: test_item_id(),
                quantity: 10,
                unit_cost: Decimal::from(5),
            }],
            occurred_at: test_time(),
        }
    }

    #[test]
    fn create_emits_created_event() {
        let tenant_id = test_tenant_id();
        let receipt_id = test_receipt_id();
        let receipt = GoodsReceipt::empty(receipt_id);

        let cmd = valid_create(receipt_id, tenant_id);
        let events = receipt
            .handle(&GoodsReceiptCommand::CreateGoodsReceipt(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            GoodsReceiptEvent::GoodsReceiptCreated(e) => {
                assert_eq!(e.tenant_id, tenant_id);
                assert_eq!(e.receipt_id, receipt_id);
                assert_eq!(e.reference, "GR-2026-0001");
                assert_eq!(e.lines.len(), 1);
            }
        }
    }

    #[test]
    fn receipt_is_immutable_after_creation() {
        let tenant_id = test_tenant_id();
        let receipt_id = test_receipt_id();
        let mut receipt = GoodsReceipt::empty(receipt_id);

        let cmd = valid_create(receipt_id, tenant_id);
        let events = receipt
            .handle(&GoodsReceiptCommand::CreateGoodsReceipt(cmd.clone()))
            .unwrap();
        receipt.apply(&events[0]);

        let err = receipt
            .handle(&GoodsReceiptCommand::CreateGoodsReceipt(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn bad_line_rejects_the_whole_document() {
        let tenant_id = test_tenant_id();
        let receipt_id = test_receipt_id();
        let receipt = GoodsReceipt::empty(receipt_id);

        let mut cmd = valid_create(receipt_id, tenant_id);
        cmd.lines.push(ReceiptLine {
            line_no: 2,
            item_id: test_item_id(),
            quantity: 0,
            unit_cost: Decimal::ONE,
        });

        let err = receipt
            .handle(&GoodsReceiptCommand::CreateGoodsReceipt(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn empty_reference_and_empty_lines_are_rejected() {
        let tenant_id = test_tenant_id();
        let receipt_id = test_receipt_id();
        let receipt = GoodsReceipt::empty(receipt_id);

        let mut cmd = valid_create(receipt_id, tenant_id);
        cmd.reference = "  ".to_string();
        let err = receipt
            .handle(&GoodsReceiptCommand::CreateGoodsReceipt(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut cmd = valid_create(receipt_id, tenant_id);
        cmd.lines.clear();
        let err = receipt
            .handle(&GoodsReceiptCommand::CreateGoodsReceipt(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
