//! Purchase request flow: creation and the one-way approval workflow.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use harborerp_core::{Aggregate, AggregateId, DomainError, TenantId};
use harborerp_events::{EventBus, EventEnvelope};
use harborerp_procurement::{
    ApproveRequest, CreatePurchaseRequest, PurchaseRequest, PurchaseRequestCommand,
    PurchaseRequestId, RejectRequest, RequestLine, Urgency, request,
};

use super::dispatch_with_retry;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::reference_index::{ReferenceIndex, ReferenceKind};

pub struct RequestFlows<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    references: Arc<ReferenceIndex>,
}

impl<S, B> RequestFlows<S, B>
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

    /// Create a purchase request. Request numbers are unique per tenant.
    pub fn create_request(
        &self,
        tenant_id: TenantId,
        request_number: String,
        lines: Vec<RequestLine>,
        urgency: Urgency,
        occurred_at: DateTime<Utc>,
    ) -> Result<PurchaseRequestId, DispatchError> {
        let request_agg = AggregateId::new();
        let request_id = PurchaseRequestId::new(request_agg);
        let cmd = CreatePurchaseRequest {
            tenant_id,
            request_id,
            request_number: request_number.clone(),
            lines,
            urgency,
            occurred_at,
        };

        // Dry-run validation before claiming the number.
        PurchaseRequest::empty(request_id)
            .handle(&PurchaseRequestCommand::CreatePurchaseRequest(cmd.clone()))
            .map_err(DispatchError::from)?;

        if !self
            .references
            .claim(tenant_id, ReferenceKind::PurchaseRequest, &request_number)
        {
            return Err(DomainError::conflict(format!(
                "request number '{request_number}' already used"
            ))
            .into());
        }

        if let Err(e) = self.dispatcher.dispatch::<PurchaseRequest>(
            tenant_id,
            request_agg,
            request::AGGREGATE_TYPE,
            PurchaseRequestCommand::CreatePurchaseRequest(cmd),
            |id| PurchaseRequest::empty(PurchaseRequestId::new(id)),
        ) {
            self.references
                .release(tenant_id, ReferenceKind::PurchaseRequest, &request_number);
            return Err(e);
        }

        Ok(request_id)
    }

    /// Approve a pending request. Terminal states fail with
    /// `InvalidStateTransition`, concurrent approvals serialize under the
    /// version check so exactly one wins.
    pub fn approve_request(
        &self,
        tenant_id: TenantId,
        request_id: PurchaseRequestId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        let cmd = PurchaseRequestCommand::ApproveRequest(ApproveRequest {
            tenant_id,
            request_id,
            occurred_at,
        });

        dispatch_with_retry::<PurchaseRequest, _, _>(
            &self.dispatcher,
            tenant_id,
            request_id.0,
            request::AGGREGATE_TYPE,
            cmd,
            |id| PurchaseRequest::empty(PurchaseRequestId::new(id)),
        )?;
        Ok(())
    }

    /// Reject a pending request.
    pub fn reject_request(
        &self,
        tenant_id: TenantId,
        request_id: PurchaseRequestId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        let cmd = PurchaseRequestCommand::RejectRequest(RejectRequest {
            tenant_id,
            request_id,
            reason,
            occurred_at,
        });

        dispatch_with_retry::<PurchaseRequest, _, _>(
            &self.dispatcher,
            tenant_id,
            request_id.0,
            request::AGGREGATE_TYPE,
            cmd,
            |id| PurchaseRequest::empty(PurchaseRequestId::new(id)),
        )?;
        Ok(())
    }
}
