use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use harborerp_core::{AssetInstanceId, ProjectId, SupplierId, TenantId};
use harborerp_events::EventEnvelope;
use harborerp_invoicing::{
    ApprovalStatus, CreditNote, InvoiceLine, Payment, PurchaseInvoiceEvent, PurchaseInvoiceId,
    SettlementStatus, invoice,
};

use super::{CursorCheck, ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

/// Purchase invoice read model.
///
/// Settlement status is intentionally absent from the stored shape; call
/// [`InvoiceReadModel::settlement_status`] with the current clock instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceReadModel {
    pub invoice_id: PurchaseInvoiceId,
    pub invoice_number: String,
    pub supplier_id: SupplierId,
    pub project_id: Option<ProjectId>,
    pub asset_instance_id: Option<AssetInstanceId>,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub credited_amount: Decimal,
    pub approval_status: ApprovalStatus,
    pub due_date: DateTime<Utc>,
    pub payments: Vec<Payment>,
    pub credit_notes: Vec<CreditNote>,
}

impl InvoiceReadModel {
    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.paid_amount - self.credited_amount
    }

    /// Derived settlement status at `now` (same derivation the aggregate uses).
    pub fn settlement_status(&self, now: DateTime<Utc>) -> SettlementStatus {
        SettlementStatus::derive(
            self.total_amount,
            self.paid_amount,
            self.credited_amount,
            Some(self.due_date),
            now,
        )
    }
}

/// Purchase invoices projection.
#[derive(Debug)]
pub struct PurchaseInvoicesProjection<S>
where
    S: TenantStore<PurchaseInvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PurchaseInvoicesProjection<S>
where
    S: TenantStore<PurchaseInvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, invoice_id: &PurchaseInvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(tenant_id, invoice_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.store.list(tenant_id)
    }

    /// List invoices that are overdue at `now`.
    pub fn list_overdue(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Vec<InvoiceReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.settlement_status(now) == SettlementStatus::Overdue)
            .collect()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != invoice::AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let seq = envelope.sequence_number();
        if let CursorCheck::Duplicate = self.cursors.check(tenant_id, envelope.aggregate_id(), seq)? {
            return Ok(());
        }

        let event: PurchaseInvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            PurchaseInvoiceEvent::PurchaseInvoiceRecorded(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.invoice_id,
                    InvoiceReadModel {
                        invoice_id: e.invoice_id,
                        invoice_number: e.invoice_number,
                        supplier_id: e.supplier_id,
                        project_id: e.project_id,
                        asset_instance_id: e.asset_instance_id,
                        lines: e.lines,
                        subtotal: e.subtotal,
                        tax_amount: e.tax_amount,
                        total_amount: e.total_amount,
                        paid_amount: Decimal::ZERO,
                        credited_amount: Decimal::ZERO,
                        approval_status: ApprovalStatus::Pending,
                        due_date: e.due_date,
                        payments: Vec::new(),
                        credit_notes: Vec::new(),
                    },
                );
            }
            PurchaseInvoiceEvent::PaymentRecorded(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.payments.push(e.payment);
                    rm.paid_amount = e.new_paid_amount;
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
            PurchaseInvoiceEvent::CreditNoteApplied(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.credit_notes.push(e.credit_note);
                    rm.credited_amount = e.new_credited_amount;
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
            PurchaseInvoiceEvent::InvoiceApproved(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.approval_status = ApprovalStatus::Approved;
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
            PurchaseInvoiceEvent::InvoiceRejected(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.approval_status = ApprovalStatus::Rejected;
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, envelope.aggregate_id(), seq);
        Ok(())
    }
}

fn ensure_event_tenant(event_tenant: TenantId, envelope_tenant: TenantId) -> Result<(), ProjectionError> {
    if event_tenant != envelope_tenant {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    Ok(())
}
