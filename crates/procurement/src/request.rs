use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harborerp_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use harborerp_events::Event;
use harborerp_inventory::InventoryItemId;

/// Stream type identifier for purchase request aggregates.
pub const AGGREGATE_TYPE: &str = "procurement.purchase_request";

/// Purchase request identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseRequestId(pub AggregateId);

impl PurchaseRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase request approval lifecycle. Approved and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// How urgently the requested goods are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Critical,
}

/// One requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    pub line_no: u32,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub note: Option<String>,
}

/// Aggregate root: PurchaseRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    id: PurchaseRequestId,
    tenant_id: Option<TenantId>,
    request_number: String,
    lines: Vec<RequestLine>,
    urgency: Urgency,
    status: PurchaseRequestStatus,
    version: u64,
    created: bool,
}

impl PurchaseRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseRequestId) -> Self {
        Self {
            id,
            tenant_id: None,
            request_number: String::new(),
            lines: Vec::new(),
            urgency: Urgency::Normal,
            status: PurchaseRequestStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseRequestId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn request_number(&self) -> &str {
        &self.request_number
    }

    pub fn lines(&self) -> &[RequestLine] {
        &self.lines
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn status(&self) -> PurchaseRequestStatus {
        self.status
    }
}

impl AggregateRoot for PurchaseRequest {
    type Id = PurchaseRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseRequest {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub request_number: String,
    pub lines: Vec<RequestLine>,
    pub urgency: Urgency,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveRequest (only legal from pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectRequest (only legal from pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseRequestCommand {
    CreatePurchaseRequest(CreatePurchaseRequest),
    ApproveRequest(ApproveRequest),
    RejectRequest(RejectRequest),
}

/// Event: PurchaseRequestCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestCreated {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub request_number: String,
    pub lines: Vec<RequestLine>,
    pub urgency: Urgency,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseRequestApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestApproved {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseRequestRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestRejected {
    pub tenant_id: TenantId,
    pub request_id: PurchaseRequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseRequestEvent {
    PurchaseRequestCreated(PurchaseRequestCreated),
    PurchaseRequestApproved(PurchaseRequestApproved),
    PurchaseRequestRejected(PurchaseRequestRejected),
}

impl Event for PurchaseRequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseRequestEvent::PurchaseRequestCreated(_) => "procurement.request.created",
            PurchaseRequestEvent::PurchaseRequestApproved(_) => "procurement.request.approved",
            PurchaseRequestEvent::PurchaseRequestRejected(_) => "procurement.request.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseRequestEvent::PurchaseRequestCreated(e) => e.occurred_at,
            PurchaseRequestEvent::PurchaseRequestApproved(e) => e.occurred_at,
            PurchaseRequestEvent::PurchaseRequestRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseRequest {
    type Command = PurchaseRequestCommand;
    type Event = PurchaseRequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseRequestEvent::PurchaseRequestCreated(e) => {
                self.id = e.request_id;
                self.tenant_id = Some(e.tenant_id);
                self.request_number = e.request_number.clone();
                self.lines = e.lines.clone();
                self.urgency = e.urgency;
                self.status = PurchaseRequestStatus::Pending;
                self.created = true;
            }
            PurchaseRequestEvent::PurchaseRequestApproved(_) => {
                self.status = PurchaseRequestStatus::Approved;
            }
            PurchaseRequestEvent::PurchaseRequestRejected(_) => {
                self.status = PurchaseRequestStatus::Rejected;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseRequestCommand::CreatePurchaseRequest(cmd) => self.handle_create(cmd),
            PurchaseRequestCommand::ApproveRequest(cmd) => self.handle_approve(cmd),
            PurchaseRequestCommand::RejectRequest(cmd) => self.handle_reject(cmd),
        }
    }
}

impl PurchaseRequest {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::validation("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_pending(&self, action: &str) -> Result<(), DomainError> {
        if self.status != PurchaseRequestStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "cannot {action} a request that is already {:?}",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseRequest,
    ) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase request already exists"));
        }
        if cmd.request_number.trim().is_empty() {
            return Err(DomainError::validation("request_number cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "purchase request must have at least one line",
            ));
        }
        for line in &cmd.lines {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_quantity(format!(
                    "line {}: requested quantity must be positive",
                    line.line_no
                )));
            }
        }

        Ok(vec![PurchaseRequestEvent::PurchaseRequestCreated(
            PurchaseRequestCreated {
                tenant_id: cmd.tenant_id,
                request_id: cmd.request_id,
                request_number: cmd.request_number.clone(),
                lines: cmd.lines.clone(),
                urgency: cmd.urgency,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_approve(&self, cmd: &ApproveRequest) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_pending("approve")?;

        Ok(vec![PurchaseRequestEvent::PurchaseRequestApproved(
            PurchaseRequestApproved {
                tenant_id: cmd.tenant_id,
                request_id: cmd.request_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reject(&self, cmd: &RejectRequest) -> Result<Vec<PurchaseRequestEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_pending("reject")?;

        Ok(vec![PurchaseRequestEvent::PurchaseRequestRejected(
            PurchaseRequestRejected {
                tenant_id: cmd.tenant_id,
                request_id: cmd.request_id,
                reason: cmd.reason.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
