use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harborerp_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ProjectId, TenantId};
use harborerp_events::Event;
use harborerp_inventory::InventoryItemId;

/// Stream type identifier for goods issue aggregates.
pub const AGGREGATE_TYPE: &str = "procurement.goods_issue";

/// Goods issue identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoodsIssueId(pub AggregateId);

impl GoodsIssueId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GoodsIssueId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One outbound movement line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLine {
    pub line_no: u32,
    pub item_id: InventoryItemId,
    pub quantity: i64,
}

/// Aggregate root: GoodsIssue.
///
/// An append-only audit record of outbound stock, optionally consumed by a
/// project. Stock sufficiency is the goods-issue flow's responsibility; the
/// document only validates its own shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsIssue {
    id: GoodsIssueId,
    tenant_id: Option<TenantId>,
    reference: String,
    project_id: Option<ProjectId>,
    lines: Vec<IssueLine>,
    issued_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl GoodsIssue {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: GoodsIssueId) -> Self {
        Self {
            id,
            tenant_id: None,
            reference: String::new(),
            project_id: None,
            lines: Vec::new(),
            issued_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GoodsIssueId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    pub fn lines(&self) -> &[IssueLine] {
        &self.lines
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }
}

impl AggregateRoot for GoodsIssue {
    type Id = GoodsIssueId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateGoodsIssue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGoodsIssue {
    pub tenant_id: TenantId,
    pub issue_id: GoodsIssueId,
    pub reference: String,
    pub project_id: Option<ProjectId>,
    pub lines: Vec<IssueLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodsIssueCommand {
    CreateGoodsIssue(CreateGoodsIssue),
}

/// Event: GoodsIssueCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsIssueCreated {
    pub tenant_id: TenantId,
    pub issue_id: GoodsIssueId,
    pub reference: String,
    pub project_id: Option<ProjectId>,
    pub lines: Vec<IssueLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodsIssueEvent {
    GoodsIssueCreated(GoodsIssueCreated),
}

impl Event for GoodsIssueEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GoodsIssueEvent::GoodsIssueCreated(_) => "procurement.goods_issue.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GoodsIssueEvent::GoodsIssueCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for GoodsIssue {
    type Command = GoodsIssueCommand;
    type Event = GoodsIssueEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GoodsIssueEvent::GoodsIssueCreated(e) => {
                self.id = e.issue_id;
                self.tenant_id = Some(e.tenant_id);
                self.reference = e.reference.clone();
                self.project_id = e.project_id;
                self.lines = e.lines.clone();
                self.issued_at = Some(e.occurred_at);
                self.created = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GoodsIssueCommand::CreateGoodsIssue(cmd) => self.handle_create(cmd),
        }
    }
}

impl GoodsIssue {
    fn handle_create(&self, cmd: &CreateGoodsIssue) -> Result<Vec<GoodsIssueEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("goods issue is immutable"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "goods issue must have at least one line",
            ));
        }
        for line in &cmd.lines {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_quantity(format!(
                    "line {}: issue quantity must be positive",
                    line.line_no
                )));
            }
        }

        Ok(vec![GoodsIssueEvent::GoodsIssueCreated(GoodsIssueCreated {
            tenant_id: cmd.tenant_id,
            issue_id: cmd.issue_id,
            reference: cmd.reference.clone(),
            project_id: cmd.project_id,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
