use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use harborerp_core::{ProjectId, TenantId};
use harborerp_events::EventEnvelope;
use harborerp_procurement::{
    GoodsIssueEvent, GoodsIssueId, GoodsReceiptEvent, GoodsReceiptId, IssueLine,
    PurchaseRequestEvent, PurchaseRequestId, PurchaseRequestStatus, ReceiptLine, RequestLine,
    Urgency, issue, receipt, request,
};

use super::{CursorCheck, ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsReceiptReadModel {
    pub receipt_id: GoodsReceiptId,
    pub reference: String,
    pub lines: Vec<ReceiptLine>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsIssueReadModel {
    pub issue_id: GoodsIssueId,
    pub reference: String,
    pub project_id: Option<ProjectId>,
    pub lines: Vec<IssueLine>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequestReadModel {
    pub request_id: PurchaseRequestId,
    pub request_number: String,
    pub lines: Vec<RequestLine>,
    pub urgency: Urgency,
    pub status: PurchaseRequestStatus,
    pub requested_at: DateTime<Utc>,
}

/// Procurement document projection: receipts, issues, and requests.
///
/// One consumer over the shared bus, three read-model stores. Documents are
/// immutable apart from the request status transition, so the apply logic is
/// mostly create-once.
#[derive(Debug)]
pub struct ProcurementDocsProjection<R, I, Q>
where
    R: TenantStore<GoodsReceiptId, GoodsReceiptReadModel>,
    I: TenantStore<GoodsIssueId, GoodsIssueReadModel>,
    Q: TenantStore<PurchaseRequestId, PurchaseRequestReadModel>,
{
    receipts: R,
    issues: I,
    requests: Q,
    cursors: StreamCursors,
}

impl<R, I, Q> ProcurementDocsProjection<R, I, Q>
where
    R: TenantStore<GoodsReceiptId, GoodsReceiptReadModel>,
    I: TenantStore<GoodsIssueId, GoodsIssueReadModel>,
    Q: TenantStore<PurchaseRequestId, PurchaseRequestReadModel>,
{
    pub fn new(receipts: R, issues: I, requests: Q) -> Self {
        Self {
            receipts,
            issues,
            requests,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: &GoodsReceiptId,
    ) -> Option<GoodsReceiptReadModel> {
        self.receipts.get(tenant_id, receipt_id)
    }

    pub fn list_receipts(&self, tenant_id: TenantId) -> Vec<GoodsReceiptReadModel> {
        self.receipts.list(tenant_id)
    }

    pub fn get_issue(
        &self,
        tenant_id: TenantId,
        issue_id: &GoodsIssueId,
    ) -> Option<GoodsIssueReadModel> {
        self.issues.get(tenant_id, issue_id)
    }

    pub fn list_issues(&self, tenant_id: TenantId) -> Vec<GoodsIssueReadModel> {
        self.issues.list(tenant_id)
    }

    pub fn get_request(
        &self,
        tenant_id: TenantId,
        request_id: &PurchaseRequestId,
    ) -> Option<PurchaseRequestReadModel> {
        self.requests.get(tenant_id, request_id)
    }

    pub fn list_requests(&self, tenant_id: TenantId) -> Vec<PurchaseRequestReadModel> {
        self.requests.list(tenant_id)
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match envelope.aggregate_type() {
            t if t == receipt::AGGREGATE_TYPE => self.apply_receipt(envelope),
            t if t == issue::AGGREGATE_TYPE => self.apply_issue(envelope),
            t if t == request::AGGREGATE_TYPE => self.apply_request(envelope),
            _ => Ok(()),
        }
    }

    fn apply_receipt(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let seq = envelope.sequence_number();
        if let CursorCheck::Duplicate = self.cursors.check(tenant_id, envelope.aggregate_id(), seq)? {
            return Ok(());
        }

        let event: GoodsReceiptEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            GoodsReceiptEvent::GoodsReceiptCreated(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                self.receipts.upsert(
                    tenant_id,
                    e.receipt_id,
                    GoodsReceiptReadModel {
                        receipt_id: e.receipt_id,
                        reference: e.reference,
                        lines: e.lines,
                        received_at: e.occurred_at,
                    },
                );
            }
        }

        self.cursors.advance(tenant_id, envelope.aggregate_id(), seq);
        Ok(())
    }

    fn apply_issue(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let seq = envelope.sequence_number();
        if let CursorCheck::Duplicate = self.cursors.check(tenant_id, envelope.aggregate_id(), seq)? {
            return Ok(());
        }

        let event: GoodsIssueEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            GoodsIssueEvent::GoodsIssueCreated(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                self.issues.upsert(
                    tenant_id,
                    e.issue_id,
                    GoodsIssueReadModel {
                        issue_id: e.issue_id,
                        reference: e.reference,
                        project_id: e.project_id,
                        lines: e.lines,
                        issued_at: e.occurred_at,
                    },
                );
            }
        }

        self.cursors.advance(tenant_id, envelope.aggregate_id(), seq);
        Ok(())
    }

    fn apply_request(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let seq = envelope.sequence_number();
        if let CursorCheck::Duplicate = self.cursors.check(tenant_id, envelope.aggregate_id(), seq)? {
            return Ok(());
        }

        let event: PurchaseRequestEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            PurchaseRequestEvent::PurchaseRequestCreated(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                self.requests.upsert(
                    tenant_id,
                    e.request_id,
                    PurchaseRequestReadModel {
                        request_id: e.request_id,
                        request_number: e.request_number,
                        lines: e.lines,
                        urgency: e.urgency,
                        status: PurchaseRequestStatus::Pending,
                        requested_at: e.occurred_at,
                    },
                );
            }
            PurchaseRequestEvent::PurchaseRequestApproved(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                if let Some(mut rm) = self.requests.get(tenant_id, &e.request_id) {
                    rm.status = PurchaseRequestStatus::Approved;
                    self.requests.upsert(tenant_id, e.request_id, rm);
                }
            }
            PurchaseRequestEvent::PurchaseRequestRejected(e) => {
                ensure_event_tenant(e.tenant_id, tenant_id)?;
                if let Some(mut rm) = self.requests.get(tenant_id, &e.request_id) {
                    rm.status = PurchaseRequestStatus::Rejected;
                    self.requests.upsert(tenant_id, e.request_id, rm);
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
