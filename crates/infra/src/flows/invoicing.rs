//! Purchase invoice flows: recording, payment reconciliation, approval.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use harborerp_core::{
    Aggregate, AggregateId, AssetInstanceId, DomainError, ProjectId, SupplierId, TenantId,
};
use harborerp_events::{EventBus, EventEnvelope};
use harborerp_invoicing::{
    ApplyCreditNote, ApprovalStatus, ApproveInvoice, InvoiceLine, PaymentMethod,
    PurchaseInvoice, PurchaseInvoiceCommand, PurchaseInvoiceEvent, PurchaseInvoiceId,
    RecordInvoice, RecordPayment, RejectInvoice, SettlementStatus, invoice,
};

use super::dispatch_with_retry;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::reference_index::{ReferenceIndex, ReferenceKind};
use crate::sinks::{AssetMaintenanceSink, ProjectCostSink};

/// Input for recording a new purchase invoice.
#[derive(Debug, Clone)]
pub struct RecordInvoiceParams {
    pub invoice_number: String,
    pub supplier_id: SupplierId,
    pub project_id: Option<ProjectId>,
    pub asset_instance_id: Option<AssetInstanceId>,
    pub lines: Vec<InvoiceLine>,
    pub tax_amount: Decimal,
    pub due_date: DateTime<Utc>,
}

/// Input for recording a payment against an invoice.
#[derive(Debug, Clone)]
pub struct RecordPaymentParams {
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub files: Vec<String>,
}

/// Authoritative post-command invoice state, returned by every flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceSnapshot {
    pub invoice_id: PurchaseInvoiceId,
    pub invoice_number: String,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub credited_amount: Decimal,
    pub outstanding: Decimal,
    pub approval_status: ApprovalStatus,
    pub due_date: Option<DateTime<Utc>>,
}

impl InvoiceSnapshot {
    fn from_aggregate(invoice: &PurchaseInvoice) -> Self {
        Self {
            invoice_id: invoice.id_typed(),
            invoice_number: invoice.invoice_number().to_string(),
            subtotal: invoice.subtotal(),
            tax_amount: invoice.tax_amount(),
            total_amount: invoice.total_amount(),
            paid_amount: invoice.paid_amount(),
            credited_amount: invoice.credited_amount(),
            outstanding: invoice.outstanding(),
            approval_status: invoice.approval_status(),
            due_date: invoice.due_date(),
        }
    }

    pub fn settlement_status(&self, now: DateTime<Utc>) -> SettlementStatus {
        SettlementStatus::derive(
            self.total_amount,
            self.paid_amount,
            self.credited_amount,
            self.due_date,
            now,
        )
    }
}

/// Orchestrates invoice commands plus the external-collaborator side effects
/// of approval.
pub struct InvoiceFlows<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    references: Arc<ReferenceIndex>,
    project_costs: Arc<dyn ProjectCostSink>,
    asset_maintenance: Arc<dyn AssetMaintenanceSink>,
}

impl<S, B> InvoiceFlows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        references: Arc<ReferenceIndex>,
        project_costs: Arc<dyn ProjectCostSink>,
        asset_maintenance: Arc<dyn AssetMaintenanceSink>,
    ) -> Self {
        Self {
            dispatcher,
            references,
            project_costs,
            asset_maintenance,
        }
    }

    /// Record a new invoice. Invoice numbers are unique per tenant.
    pub fn record_invoice(
        &self,
        tenant_id: TenantId,
        params: RecordInvoiceParams,
        occurred_at: DateTime<Utc>,
    ) -> Result<InvoiceSnapshot, DispatchError> {
        let invoice_agg = AggregateId::new();
        let invoice_id = PurchaseInvoiceId::new(invoice_agg);
        let cmd = RecordInvoice {
            tenant_id,
            invoice_id,
            invoice_number: params.invoice_number.clone(),
            supplier_id: params.supplier_id,
            project_id: params.project_id,
            asset_instance_id: params.asset_instance_id,
            lines: params.lines,
            tax_amount: params.tax_amount,
            due_date: params.due_date,
            occurred_at,
        };

        // Dry-run validation before claiming the number.
        PurchaseInvoice::empty(invoice_id)
            .handle(&PurchaseInvoiceCommand::RecordInvoice(cmd.clone()))
            .map_err(DispatchError::from)?;

        if !self.references.claim(
            tenant_id,
            ReferenceKind::PurchaseInvoice,
            &params.invoice_number,
        ) {
            return Err(DomainError::conflict(format!(
                "invoice number '{}' already used",
                params.invoice_number
            ))
            .into());
        }

        if let Err(e) = self.dispatcher.dispatch::<PurchaseInvoice>(
            tenant_id,
            invoice_agg,
            invoice::AGGREGATE_TYPE,
            PurchaseInvoiceCommand::RecordInvoice(cmd),
            |id| PurchaseInvoice::empty(PurchaseInvoiceId::new(id)),
        ) {
            self.references.release(
                tenant_id,
                ReferenceKind::PurchaseInvoice,
                &params.invoice_number,
            );
            return Err(e);
        }

        self.snapshot(tenant_id, invoice_id)
    }

    /// Record a payment. Concurrent payments against one invoice serialize
    /// under the version check, so the outstanding-balance guard always sees
    /// the latest paid amount.
    pub fn record_payment(
        &self,
        tenant_id: TenantId,
        invoice_id: PurchaseInvoiceId,
        params: RecordPaymentParams,
        occurred_at: DateTime<Utc>,
    ) -> Result<InvoiceSnapshot, DispatchError> {
        let cmd = PurchaseInvoiceCommand::RecordPayment(RecordPayment {
            tenant_id,
            invoice_id,
            payment_id: Uuid::now_v7(),
            amount: params.amount,
            payment_date: params.payment_date,
            method: params.method,
            files: params.files,
            occurred_at,
        });

        dispatch_with_retry::<PurchaseInvoice, _, _>(
            &self.dispatcher,
            tenant_id,
            invoice_id.0,
            invoice::AGGREGATE_TYPE,
            cmd,
            |id| PurchaseInvoice::empty(PurchaseInvoiceId::new(id)),
        )?;

        self.snapshot(tenant_id, invoice_id)
    }

    /// Apply a credit note against the outstanding balance.
    pub fn apply_credit_note(
        &self,
        tenant_id: TenantId,
        invoice_id: PurchaseInvoiceId,
        amount: Decimal,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<InvoiceSnapshot, DispatchError> {
        let cmd = PurchaseInvoiceCommand::ApplyCreditNote(ApplyCreditNote {
            tenant_id,
            invoice_id,
            credit_note_id: Uuid::now_v7(),
            amount,
            reason,
            occurred_at,
        });

        dispatch_with_retry::<PurchaseInvoice, _, _>(
            &self.dispatcher,
            tenant_id,
            invoice_id.0,
            invoice::AGGREGATE_TYPE,
            cmd,
            |id| PurchaseInvoice::empty(PurchaseInvoiceId::new(id)),
        )?;

        self.snapshot(tenant_id, invoice_id)
    }

    /// Approve an invoice and notify the external collaborators.
    ///
    /// The side effects run after the approval committed: if the invoice is
    /// project-linked its total lands on the project's actual cost, and if it
    /// is asset-linked a maintenance record is created. Delivery is
    /// at-least-once: a crash between commit and notification is resolved by
    /// replaying the approval event.
    pub fn approve_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: PurchaseInvoiceId,
        occurred_at: DateTime<Utc>,
    ) -> Result<InvoiceSnapshot, DispatchError> {
        let cmd = PurchaseInvoiceCommand::ApproveInvoice(ApproveInvoice {
            tenant_id,
            invoice_id,
            occurred_at,
        });

        let committed = dispatch_with_retry::<PurchaseInvoice, _, _>(
            &self.dispatcher,
            tenant_id,
            invoice_id.0,
            invoice::AGGREGATE_TYPE,
            cmd,
            |id| PurchaseInvoice::empty(PurchaseInvoiceId::new(id)),
        )?;

        self.deliver_approval_side_effects(tenant_id, &committed);
        self.snapshot(tenant_id, invoice_id)
    }

    /// Reject an invoice (terminal, no side effects).
    pub fn reject_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: PurchaseInvoiceId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<InvoiceSnapshot, DispatchError> {
        let cmd = PurchaseInvoiceCommand::RejectInvoice(RejectInvoice {
            tenant_id,
            invoice_id,
            reason,
            occurred_at,
        });

        dispatch_with_retry::<PurchaseInvoice, _, _>(
            &self.dispatcher,
            tenant_id,
            invoice_id.0,
            invoice::AGGREGATE_TYPE,
            cmd,
            |id| PurchaseInvoice::empty(PurchaseInvoiceId::new(id)),
        )?;

        self.snapshot(tenant_id, invoice_id)
    }

    /// Load the current invoice state.
    pub fn snapshot(
        &self,
        tenant_id: TenantId,
        invoice_id: PurchaseInvoiceId,
    ) -> Result<InvoiceSnapshot, DispatchError> {
        let invoice = self
            .dispatcher
            .load_aggregate::<PurchaseInvoice>(tenant_id, invoice_id.0, |id| {
                PurchaseInvoice::empty(PurchaseInvoiceId::new(id))
            })?;
        Ok(InvoiceSnapshot::from_aggregate(&invoice))
    }

    fn deliver_approval_side_effects(&self, tenant_id: TenantId, committed: &[StoredEvent]) {
        for stored in committed {
            let Ok(PurchaseInvoiceEvent::InvoiceApproved(e)) =
                serde_json::from_value::<PurchaseInvoiceEvent>(stored.payload.clone())
            else {
                continue;
            };

            if let Some(project_id) = e.project_id {
                self.project_costs
                    .add_actual_cost(tenant_id, project_id, e.total_amount);
            }
            if let Some(asset_instance_id) = e.asset_instance_id {
                self.asset_maintenance.create_maintenance_record(
                    tenant_id,
                    asset_instance_id,
                    e.total_amount,
                    &e.invoice_number,
                );
            }
        }
    }
}
