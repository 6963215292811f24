//! Document flows: multi-aggregate orchestration for procurement documents
//! and invoices.
//!
//! A document spans its own aggregate plus one inventory stream per line, so
//! creation cannot be a single append. The flows make it observably
//! all-or-nothing anyway:
//!
//! - full document validation runs as a dry-run `handle` on a fresh
//!   aggregate before anything is written;
//! - ledger lines are applied sequentially under optimistic concurrency with
//!   bounded retry, so concurrent writers serialize per item;
//! - a failed line triggers compensating commands for the lines already
//!   applied (`ReverseIssue` / `ReverseReceipt`).

pub mod goods;
pub mod invoicing;
pub mod requests;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use harborerp_core::{Aggregate, AggregateId, DomainError, TenantId};
use harborerp_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};

/// How often a flow re-runs a command after losing an optimistic-concurrency
/// race before giving up with a conflict.
const MAX_CONFLICT_RETRIES: usize = 8;

/// Dispatch a command, re-executing against fresh state after concurrency
/// conflicts. Domain failures are never retried: the re-run re-validates
/// (e.g. an issue that raced a competing issue sees the reduced stock and
/// fails with `InsufficientStock`, exactly once).
pub(crate) fn dispatch_with_retry<A, S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    command: A::Command,
    make_aggregate: impl Fn(AggregateId) -> A,
) -> Result<Vec<StoredEvent>, DispatchError>
where
    A: Aggregate<Error = DomainError>,
    A::Event: harborerp_events::Event + Serialize + DeserializeOwned,
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let mut attempts = 0;
    loop {
        match dispatcher.dispatch::<A>(
            tenant_id,
            aggregate_id,
            aggregate_type,
            command.clone(),
            &make_aggregate,
        ) {
            Err(DispatchError::Concurrency(msg)) => {
                attempts += 1;
                if attempts >= MAX_CONFLICT_RETRIES {
                    return Err(DispatchError::Concurrency(msg));
                }
                tracing::debug!(%aggregate_id, attempts, "retrying after concurrency conflict");
            }
            other => return other,
        }
    }
}
