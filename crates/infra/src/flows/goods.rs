//! Goods receipt and goods issue flows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use harborerp_core::{Aggregate, AggregateId, DomainError, ProjectId, TenantId};
use harborerp_events::{EventBus, EventEnvelope};
use harborerp_inventory::{
    InventoryCommand, InventoryEvent, InventoryItem, InventoryItemId, IssueStock, ReceiveStock,
    ReverseIssue, ReverseReceipt, item,
};
use harborerp_procurement::{
    CreateGoodsIssue, CreateGoodsReceipt, GoodsIssue, GoodsIssueCommand, GoodsIssueId,
    GoodsReceipt, GoodsReceiptCommand, GoodsReceiptId, IssueLine, ReceiptLine, issue, receipt,
};

use super::dispatch_with_retry;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::reference_index::{ReferenceIndex, ReferenceKind};

/// Post-movement stock snapshot for one line, returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub item_id: InventoryItemId,
    pub on_hand: i64,
    pub avg_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsReceiptOutcome {
    pub receipt_id: GoodsReceiptId,
    pub reference: String,
    pub received_at: DateTime<Utc>,
    pub stock: Vec<StockLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsIssueOutcome {
    pub issue_id: GoodsIssueId,
    pub reference: String,
    pub project_id: Option<ProjectId>,
    pub issued_at: DateTime<Utc>,
    pub stock: Vec<StockLevel>,
}

/// Orchestrates goods receipts and goods issues across the document
/// aggregate and one inventory stream per line.
pub struct GoodsFlows<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    references: Arc<ReferenceIndex>,
}

impl<S, B> GoodsFlows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, references: Arc<ReferenceIndex>) -> Self {
        Self {
            dispatcher,
            references,
        }
    }

    /// Create a goods receipt and apply every line to the inventory ledger.
    ///
    /// Ordering: dry-run document validation, item existence checks, and the
    /// reference claim all happen before anything is written. The receive
    /// commands themselves cannot fail deterministically after that, so the
    /// document is persisted first; a storage fault midway through the lines
    /// is compensated with `ReverseReceipt` so no partial stock change
    /// survives.
    pub fn create_goods_receipt(
        &self,
        tenant_id: TenantId,
        reference: String,
        lines: Vec<ReceiptLine>,
        occurred_at: DateTime<Utc>,
    ) -> Result<GoodsReceiptOutcome, DispatchError> {
        let receipt_agg = AggregateId::new();
        let receipt_id = GoodsReceiptId::new(receipt_agg);
        let cmd = CreateGoodsReceipt {
            tenant_id,
            receipt_id,
            reference: reference.clone(),
            lines: lines.clone(),
            occurred_at,
        };

        // Whole-document dry run: full validation, zero side effects.
        GoodsReceipt::empty(receipt_id)
            .handle(&GoodsReceiptCommand::CreateGoodsReceipt(cmd.clone()))
            .map_err(DispatchError::from)?;

        // Every line's item must exist before the ledger is touched.
        for line in &lines {
            let item = self.load_item(tenant_id, line.item_id)?;
            if !item.is_registered() {
                return Err(DomainError::not_found().into());
            }
        }

        if !self
            .references
            .claim(tenant_id, ReferenceKind::GoodsReceipt, &reference)
        {
            return Err(DomainError::conflict(format!(
                "goods receipt reference '{reference}' already used"
            ))
            .into());
        }

        if let Err(e) = self.dispatcher.dispatch::<GoodsReceipt>(
            tenant_id,
            receipt_agg,
            receipt::AGGREGATE_TYPE,
            GoodsReceiptCommand::CreateGoodsReceipt(cmd),
            |id| GoodsReceipt::empty(GoodsReceiptId::new(id)),
        ) {
            self.references
                .release(tenant_id, ReferenceKind::GoodsReceipt, &reference);
            return Err(e);
        }

        let mut applied: Vec<&ReceiptLine> = Vec::new();
        let mut stock = Vec::with_capacity(lines.len());
        for line in &lines {
            let receive = InventoryCommand::ReceiveStock(ReceiveStock {
                tenant_id,
                item_id: line.item_id,
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                occurred_at,
            });

            match dispatch_with_retry::<InventoryItem, _, _>(
                &self.dispatcher,
                tenant_id,
                line.item_id.0,
                item::AGGREGATE_TYPE,
                receive,
                |id| InventoryItem::empty(InventoryItemId::new(id)),
            ) {
                Ok(committed) => {
                    if let Some(level) = received_stock_level(&committed) {
                        stock.push(level);
                    }
                    applied.push(line);
                }
                Err(e) => {
                    tracing::error!(
                        %reference,
                        error = %e,
                        "goods receipt failed mid-batch; reversing received lines"
                    );
                    self.reverse_received_lines(tenant_id, &applied, occurred_at);
                    return Err(e);
                }
            }
        }

        Ok(GoodsReceiptOutcome {
            receipt_id,
            reference,
            received_at: occurred_at,
            stock,
        })
    }

    /// Create a goods issue, decrementing stock for every line or nothing.
    ///
    /// Availability is checked twice: once against a snapshot of every line's
    /// item before any decrement (fail fast, nothing written), and then
    /// authoritatively inside each `IssueStock` handler under the
    /// expected-version check. If line k fails there, lines 0..k are
    /// compensated with `ReverseIssue` and the batch fails. The document is
    /// persisted only after every line moved.
    pub fn create_goods_issue(
        &self,
        tenant_id: TenantId,
        reference: String,
        project_id: Option<ProjectId>,
        lines: Vec<IssueLine>,
        occurred_at: DateTime<Utc>,
    ) -> Result<GoodsIssueOutcome, DispatchError> {
        let issue_agg = AggregateId::new();
        let issue_id = GoodsIssueId::new(issue_agg);
        let cmd = CreateGoodsIssue {
            tenant_id,
            issue_id,
            reference: reference.clone(),
            project_id,
            lines: lines.clone(),
            occurred_at,
        };

        // Whole-document dry run: full validation, zero side effects.
        GoodsIssue::empty(issue_id)
            .handle(&GoodsIssueCommand::CreateGoodsIssue(cmd.clone()))
            .map_err(DispatchError::from)?;

        // Snapshot pre-check: every line must be satisfiable before any
        // decrement happens.
        for line in &lines {
            let item = self.load_item(tenant_id, line.item_id)?;
            if !item.is_registered() {
                return Err(DomainError::not_found().into());
            }
            if line.quantity > item.on_hand() {
                return Err(
                    DomainError::insufficient_stock(line.quantity, item.on_hand()).into(),
                );
            }
        }

        if !self
            .references
            .claim(tenant_id, ReferenceKind::GoodsIssue, &reference)
        {
            return Err(DomainError::conflict(format!(
                "goods issue reference '{reference}' already used"
            ))
            .into());
        }

        let mut applied: Vec<&IssueLine> = Vec::new();
        let mut stock = Vec::with_capacity(lines.len());
        for line in &lines {
            let issue_cmd = InventoryCommand::IssueStock(IssueStock {
                tenant_id,
                item_id: line.item_id,
                quantity: line.quantity,
                occurred_at,
            });

            match dispatch_with_retry::<InventoryItem, _, _>(
                &self.dispatcher,
                tenant_id,
                line.item_id.0,
                item::AGGREGATE_TYPE,
                issue_cmd,
                |id| InventoryItem::empty(InventoryItemId::new(id)),
            ) {
                Ok(_) => {
                    if let Ok(current) = self.load_item(tenant_id, line.item_id) {
                        stock.push(StockLevel {
                            item_id: line.item_id,
                            on_hand: current.on_hand(),
                            avg_cost: current.avg_cost(),
                        });
                    }
                    applied.push(line);
                }
                Err(e) => {
                    self.reverse_issued_lines(tenant_id, &applied, occurred_at);
                    self.references
                        .release(tenant_id, ReferenceKind::GoodsIssue, &reference);
                    return Err(e);
                }
            }
        }

        // Document persisted last: no goods issue exists unless every line moved.
        if let Err(e) = self.dispatcher.dispatch::<GoodsIssue>(
            tenant_id,
            issue_agg,
            issue::AGGREGATE_TYPE,
            GoodsIssueCommand::CreateGoodsIssue(cmd),
            |id| GoodsIssue::empty(GoodsIssueId::new(id)),
        ) {
            self.reverse_issued_lines(tenant_id, &applied, occurred_at);
            self.references
                .release(tenant_id, ReferenceKind::GoodsIssue, &reference);
            return Err(e);
        }

        Ok(GoodsIssueOutcome {
            issue_id,
            reference,
            project_id,
            issued_at: occurred_at,
            stock,
        })
    }

    fn load_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<InventoryItem, DispatchError> {
        self.dispatcher
            .load_aggregate::<InventoryItem>(tenant_id, item_id.0, |id| {
                InventoryItem::empty(InventoryItemId::new(id))
            })
    }

    fn reverse_issued_lines(
        &self,
        tenant_id: TenantId,
        applied: &[&IssueLine],
        occurred_at: DateTime<Utc>,
    ) {
        for line in applied.iter().rev() {
            let reverse = InventoryCommand::ReverseIssue(ReverseIssue {
                tenant_id,
                item_id: line.item_id,
                quantity: line.quantity,
                occurred_at,
            });
            if let Err(e) = dispatch_with_retry::<InventoryItem, _, _>(
                &self.dispatcher,
                tenant_id,
                line.item_id.0,
                item::AGGREGATE_TYPE,
                reverse,
                |id| InventoryItem::empty(InventoryItemId::new(id)),
            ) {
                tracing::error!(
                    item_id = %line.item_id,
                    quantity = line.quantity,
                    error = %e,
                    "failed to reverse issued line during batch rollback"
                );
            }
        }
    }

    fn reverse_received_lines(
        &self,
        tenant_id: TenantId,
        applied: &[&ReceiptLine],
        occurred_at: DateTime<Utc>,
    ) {
        for line in applied.iter().rev() {
            let reverse = InventoryCommand::ReverseReceipt(ReverseReceipt {
                tenant_id,
                item_id: line.item_id,
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                occurred_at,
            });
            if let Err(e) = dispatch_with_retry::<InventoryItem, _, _>(
                &self.dispatcher,
                tenant_id,
                line.item_id.0,
                item::AGGREGATE_TYPE,
                reverse,
                |id| InventoryItem::empty(InventoryItemId::new(id)),
            ) {
                tracing::error!(
                    item_id = %line.item_id,
                    quantity = line.quantity,
                    error = %e,
                    "failed to reverse received line during batch rollback"
                );
            }
        }
    }
}

/// Extract the post-receipt stock level out of the committed events.
fn received_stock_level(committed: &[StoredEvent]) -> Option<StockLevel> {
    for stored in committed {
        if let Ok(InventoryEvent::StockReceived(e)) =
            serde_json::from_value::<InventoryEvent>(stored.payload.clone())
        {
            return Some(StockLevel {
                item_id: e.item_id,
                on_hand: e.new_on_hand,
                avg_cost: e.new_avg_cost,
            });
        }
    }
    None
}
