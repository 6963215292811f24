use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use harborerp_core::{
    Aggregate, AggregateId, AggregateRoot, AssetInstanceId, DomainError, ProjectId, SupplierId,
    TenantId,
};
use harborerp_events::Event;
use harborerp_inventory::InventoryItemId;

/// Stream type identifier for purchase invoice aggregates.
pub const AGGREGATE_TYPE: &str = "invoicing.purchase_invoice";

/// Purchase invoice identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseInvoiceId(pub AggregateId);

impl PurchaseInvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseInvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Approval workflow state. Approved and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Settlement status, derived at read time from amounts and the clock.
///
/// Never persisted: `overdue` depends on wall-clock time, and storing it
/// would drift the moment the due date passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
}

impl SettlementStatus {
    /// Derive the settlement status from amounts and the clock.
    ///
    /// `paid` wins over `overdue`: a fully settled invoice past its due date
    /// is still `paid`. Used by the aggregate and by read models so the
    /// derivation cannot drift between them.
    pub fn derive(
        total_amount: Decimal,
        paid_amount: Decimal,
        credited_amount: Decimal,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let settled = paid_amount + credited_amount;
        if settled >= total_amount {
            return SettlementStatus::Paid;
        }
        if let Some(due) = due_date {
            if due < now {
                return SettlementStatus::Overdue;
            }
        }
        if settled > Decimal::ZERO {
            SettlementStatus::PartiallyPaid
        } else {
            SettlementStatus::Pending
        }
    }

}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Cash,
    Cheque,
    Card,
}

/// One invoiced line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub item_id: InventoryItemId,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// An immutable payment record. The sum of an invoice's payments always
/// equals its paid amount; both are maintained from the same events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub files: Vec<String>,
}

/// An immutable credit note: reduces the amount owed without cash movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNote {
    pub credit_note_id: Uuid,
    pub amount: Decimal,
    pub reason: Option<String>,
}

/// Aggregate root: PurchaseInvoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseInvoice {
    id: PurchaseInvoiceId,
    tenant_id: Option<TenantId>,
    invoice_number: String,
    supplier_id: Option<SupplierId>,
    project_id: Option<ProjectId>,
    asset_instance_id: Option<AssetInstanceId>,
    lines: Vec<InvoiceLine>,
    subtotal: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    paid_amount: Decimal,
    credited_amount: Decimal,
    approval_status: ApprovalStatus,
    due_date: Option<DateTime<Utc>>,
    payments: Vec<Payment>,
    credit_notes: Vec<CreditNote>,
    version: u64,
    created: bool,
}

impl PurchaseInvoice {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: PurchaseInvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            invoice_number: String::new(),
            supplier_id: None,
            project_id: None,
            asset_instance_id: None,
            lines: Vec::new(),
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            credited_amount: Decimal::ZERO,
            approval_status: ApprovalStatus::Pending,
            due_date: None,
            payments: Vec::new(),
            credit_notes: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseInvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    pub fn asset_instance_id(&self) -> Option<AssetInstanceId> {
        self.asset_instance_id
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Decimal {
        self.tax_amount
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn paid_amount(&self) -> Decimal {
        self.paid_amount
    }

    pub fn credited_amount(&self) -> Decimal {
        self.credited_amount
    }

    pub fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn credit_notes(&self) -> &[CreditNote] {
        &self.credit_notes
    }

    /// Amount still owed: total minus payments minus credit notes.
    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.paid_amount - self.credited_amount
    }

    /// Derived settlement status at `now`.
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

impl AggregateRoot for PurchaseInvoice {
    type Id = PurchaseInvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub invoice_number: String,
    pub supplier_id: SupplierId,
    pub project_id: Option<ProjectId>,
    pub asset_instance_id: Option<AssetInstanceId>,
    pub lines: Vec<InvoiceLine>,
    pub tax_amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub files: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyCreditNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCreditNote {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub credit_note_id: Uuid,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveInvoice (only legal from pending approval).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectInvoice (only legal from pending approval).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseInvoiceCommand {
    RecordInvoice(RecordInvoice),
    RecordPayment(RecordPayment),
    ApplyCreditNote(ApplyCreditNote),
    ApproveInvoice(ApproveInvoice),
    RejectInvoice(RejectInvoice),
}

/// Event: PurchaseInvoiceRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInvoiceRecorded {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub invoice_number: String,
    pub supplier_id: SupplierId,
    pub project_id: Option<ProjectId>,
    pub asset_instance_id: Option<AssetInstanceId>,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub payment: Payment,
    pub new_paid_amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditNoteApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteApplied {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub credit_note: CreditNote,
    pub new_credited_amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceApproved.
///
/// Carries the collaborator links and the invoice reference so downstream
/// consumers (project cost, asset maintenance) need no extra lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceApproved {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub project_id: Option<ProjectId>,
    pub asset_instance_id: Option<AssetInstanceId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRejected {
    pub tenant_id: TenantId,
    pub invoice_id: PurchaseInvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseInvoiceEvent {
    PurchaseInvoiceRecorded(PurchaseInvoiceRecorded),
    PaymentRecorded(PaymentRecorded),
    CreditNoteApplied(CreditNoteApplied),
    InvoiceApproved(InvoiceApproved),
    InvoiceRejected(InvoiceRejected),
}

impl Event for PurchaseInvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseInvoiceEvent::PurchaseInvoiceRecorded(_) => "invoicing.invoice.recorded",
            PurchaseInvoiceEvent::PaymentRecorded(_) => "invoicing.invoice.payment_recorded",
            PurchaseInvoiceEvent::CreditNoteApplied(_) => "invoicing.invoice.credit_note_applied",
            PurchaseInvoiceEvent::InvoiceApproved(_) => "invoicing.invoice.approved",
            PurchaseInvoiceEvent::InvoiceRejected(_) => "invoicing.invoice.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseInvoiceEvent::PurchaseInvoiceRecorded(e) => e.occurred_at,
            PurchaseInvoiceEvent::PaymentRecorded(e) => e.occurred_at,
            PurchaseInvoiceEvent::CreditNoteApplied(e) => e.occurred_at,
            PurchaseInvoiceEvent::InvoiceApproved(e) => e.occurred_at,
            PurchaseInvoiceEvent::InvoiceRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseInvoice {
    type Command = PurchaseInvoiceCommand;
    type Event = PurchaseInvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseInvoiceEvent::PurchaseInvoiceRecorded(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.invoice_number = e.invoice_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.project_id = e.project_id;
                self.asset_instance_id = e.asset_instance_id;
                self.lines = e.lines.clone();
                self.subtotal = e.subtotal;
                self.tax_amount = e.tax_amount;
                self.total_amount = e.total_amount;
                self.paid_amount = Decimal::ZERO;
                self.credited_amount = Decimal::ZERO;
                self.approval_status = ApprovalStatus::Pending;
                self.due_date = Some(e.due_date);
                self.created = true;
            }
            PurchaseInvoiceEvent::PaymentRecorded(e) => {
                self.payments.push(e.payment.clone());
                self.paid_amount = e.new_paid_amount;
            }
            PurchaseInvoiceEvent::CreditNoteApplied(e) => {
                self.credit_notes.push(e.credit_note.clone());
                self.credited_amount = e.new_credited_amount;
            }
            PurchaseInvoiceEvent::InvoiceApproved(_) => {
                self.approval_status = ApprovalStatus::Approved;
            }
            PurchaseInvoiceEvent::InvoiceRejected(_) => {
                self.approval_status = ApprovalStatus::Rejected;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseInvoiceCommand::RecordInvoice(cmd) => self.handle_record(cmd),
            PurchaseInvoiceCommand::RecordPayment(cmd) => self.handle_payment(cmd),
            PurchaseInvoiceCommand::ApplyCreditNote(cmd) => self.handle_credit_note(cmd),
            PurchaseInvoiceCommand::ApproveInvoice(cmd) => self.handle_approve(cmd),
            PurchaseInvoiceCommand::RejectInvoice(cmd) => self.handle_reject(cmd),
        }
    }
}

impl PurchaseInvoice {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::validation("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_recorded(&self, tenant_id: TenantId, invoice_id: PurchaseInvoiceId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        if self.id != invoice_id {
            return Err(DomainError::validation("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordInvoice) -> Result<Vec<PurchaseInvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already recorded"));
        }
        if cmd.invoice_number.trim().is_empty() {
            return Err(DomainError::validation("invoice_number cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "invoice must have at least one line",
            ));
        }
        if cmd.tax_amount < Decimal::ZERO {
            return Err(DomainError::validation("tax_amount cannot be negative"));
        }

        // Totals are computed here, never trusted from the caller.
        let mut subtotal = Decimal::ZERO;
        for line in &cmd.lines {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_quantity(format!(
                    "line {}: invoiced quantity must be positive",
                    line.line_no
                )));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(DomainError::invalid_quantity(format!(
                    "line {}: unit price cannot be negative",
                    line.line_no
                )));
            }
            subtotal += Decimal::from(line.quantity) * line.unit_price;
        }

        let total_amount = subtotal + cmd.tax_amount;
        if total_amount <= Decimal::ZERO {
            return Err(DomainError::validation(
                "invoice total must be positive",
            ));
        }

        Ok(vec![PurchaseInvoiceEvent::PurchaseInvoiceRecorded(
            PurchaseInvoiceRecorded {
                tenant_id: cmd.tenant_id,
                invoice_id: cmd.invoice_id,
                invoice_number: cmd.invoice_number.clone(),
                supplier_id: cmd.supplier_id,
                project_id: cmd.project_id,
                asset_instance_id: cmd.asset_instance_id,
                lines: cmd.lines.clone(),
                subtotal,
                tax_amount: cmd.tax_amount,
                total_amount,
                due_date: cmd.due_date,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_payment(&self, cmd: &RecordPayment) -> Result<Vec<PurchaseInvoiceEvent>, DomainError> {
        self.ensure_recorded(cmd.tenant_id, cmd.invoice_id)?;

        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "payment amount must be positive",
            ));
        }

        let outstanding = self.outstanding();
        if cmd.amount > outstanding {
            return Err(DomainError::overpayment(cmd.amount, outstanding));
        }

        Ok(vec![PurchaseInvoiceEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            payment: Payment {
                payment_id: cmd.payment_id,
                amount: cmd.amount,
                payment_date: cmd.payment_date,
                method: cmd.method,
                files: cmd.files.clone(),
            },
            new_paid_amount: self.paid_amount + cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_credit_note(
        &self,
        cmd: &ApplyCreditNote,
    ) -> Result<Vec<PurchaseInvoiceEvent>, DomainError> {
        self.ensure_recorded(cmd.tenant_id, cmd.invoice_id)?;

        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "credit note amount must be positive",
            ));
        }

        let outstanding = self.outstanding();
        if cmd.amount > outstanding {
            return Err(DomainError::overpayment(cmd.amount, outstanding));
        }

        Ok(vec![PurchaseInvoiceEvent::CreditNoteApplied(
            CreditNoteApplied {
                tenant_id: cmd.tenant_id,
                invoice_id: cmd.invoice_id,
                credit_note: CreditNote {
                    credit_note_id: cmd.credit_note_id,
                    amount: cmd.amount,
                    reason: cmd.reason.clone(),
                },
                new_credited_amount: self.credited_amount + cmd.amount,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_approve(&self, cmd: &ApproveInvoice) -> Result<Vec<PurchaseInvoiceEvent>, DomainError> {
        self.ensure_recorded(cmd.tenant_id, cmd.invoice_id)?;

        if self.approval_status != ApprovalStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "cannot approve an invoice that is already {:?}",
                self.approval_status
            )));
        }

        Ok(vec![PurchaseInvoiceEvent::InvoiceApproved(InvoiceApproved {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            invoice_number: self.invoice_number.clone(),
            total_amount: self.total_amount,
            project_id: self.project_id,
            asset_instance_id: self.asset_instance_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectInvoice) -> Result<Vec<PurchaseInvoiceEvent>, DomainError> {
        self.ensure_recorded(cmd.tenant_id, cmd.invoice_id)?;

        if self.approval_status != ApprovalStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "cannot reject an invoice that is already {:?}",
                self.approval_status
            )));
        }

        Ok(vec![PurchaseInvoiceEvent::InvoiceRejected(InvoiceRejected {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
