//! Postgres-backed event store.
//!
//! Append runs inside a single transaction: the stream head is read with
//! `FOR UPDATE`, the expected version is checked, and the new rows are
//! inserted. The row-level lock serializes concurrent appends to one stream,
//! and the unique index on `(tenant_id, aggregate_id, sequence_number)`
//! backstops the version check. A duplicate-key failure maps to a
//! concurrency error so callers retry the same way they do against the
//! in-memory store.

use std::sync::Arc;

use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use harborerp_core::{AggregateId, ExpectedVersion, TenantId};

use super::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    event_id        UUID PRIMARY KEY,
    tenant_id       UUID NOT NULL,
    aggregate_id    UUID NOT NULL,
    aggregate_type  TEXT NOT NULL,
    sequence_number BIGINT NOT NULL,
    event_type      TEXT NOT NULL,
    event_version   INT NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL,
    payload         JSONB NOT NULL,
    UNIQUE (tenant_id, aggregate_id, sequence_number)
);

-- Document references (goods receipt/issue references, invoice numbers) are
-- unique per tenant; this is the persistent counterpart of the in-process
-- reference index.
CREATE TABLE IF NOT EXISTS document_references (
    tenant_id UUID NOT NULL,
    kind      TEXT NOT NULL,
    reference TEXT NOT NULL,
    PRIMARY KEY (tenant_id, kind, reference)
);
"#;

#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the events schema if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(SCHEMA_DDL)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    pub async fn load_stream_async(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, tenant_id, aggregate_id, aggregate_type,
                   sequence_number, event_type, event_version, occurred_at, payload
            FROM events
            WHERE tenant_id = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            stored.push(row_to_stored_event(&row)?);
        }
        Ok(stored)
    }

    pub async fn append_async(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events must target the same tenant + aggregate stream.
        let tenant_id = events[0].tenant_id;
        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.tenant_id != tenant_id {
                return Err(EventStoreError::TenantIsolation(format!(
                    "batch contains multiple tenant_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        // Lock the stream head and read its current version + type.
        let head = sqlx::query(
            r#"
            SELECT sequence_number, aggregate_type
            FROM events
            WHERE tenant_id = $1 AND aggregate_id = $2
            ORDER BY sequence_number DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("stream_head", e))?;

        let mut current: u64 = 0;
        if let Some(row) = &head {
            let seq: i64 = row
                .try_get("sequence_number")
                .map_err(|e| map_sqlx_error("stream_head", e))?;
            current = seq as u64;

            let existing_type: String = row
                .try_get("aggregate_type")
                .map_err(|e| map_sqlx_error("stream_head", e))?;
            if existing_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{existing_type}', attempted append with '{aggregate_type}'"
                )));
            }
        }

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let result = sqlx::query(
                r#"
                INSERT INTO events (
                    event_id, tenant_id, aggregate_id, aggregate_type,
                    sequence_number, event_type, event_version, occurred_at, payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(e.event_id)
            .bind(e.tenant_id.as_uuid())
            .bind(e.aggregate_id.as_uuid())
            .bind(&e.aggregate_type)
            .bind(next as i64)
            .bind(&e.event_type)
            .bind(e.event_version as i32)
            .bind(e.occurred_at)
            .bind(&e.payload)
            .execute(&mut *tx)
            .await;

            if let Err(err) = result {
                // Unique violation on the sequence index means a concurrent
                // writer got there first.
                if is_unique_violation(&err) {
                    return Err(EventStoreError::Concurrency(format!(
                        "concurrent append at sequence {next}"
                    )));
                }
                return Err(map_sqlx_error("insert_event", err));
            }

            committed.push(StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            });
            next += 1;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(committed)
    }
}

/// Sync `EventStore` adapter over the async pool.
///
/// Requires a multi-threaded tokio runtime: the calling worker is parked
/// with `block_in_place` while the query runs.
impl EventStore for PostgresEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.append_async(events, expected_version))
        })
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(self.load_stream_async(tenant_id, aggregate_id))
        })
    }
}

fn row_to_stored_event(row: &sqlx::postgres::PgRow) -> Result<StoredEvent, EventStoreError> {
    let read = |e: sqlx::Error| map_sqlx_error("decode_row", e);

    let event_id: Uuid = row.try_get("event_id").map_err(read)?;
    let tenant_id: Uuid = row.try_get("tenant_id").map_err(read)?;
    let aggregate_id: Uuid = row.try_get("aggregate_id").map_err(read)?;
    let aggregate_type: String = row.try_get("aggregate_type").map_err(read)?;
    let sequence_number: i64 = row.try_get("sequence_number").map_err(read)?;
    let event_type: String = row.try_get("event_type").map_err(read)?;
    let event_version: i32 = row.try_get("event_version").map_err(read)?;
    let occurred_at: chrono::DateTime<chrono::Utc> = row.try_get("occurred_at").map_err(read)?;
    let payload: serde_json::Value = row.try_get("payload").map_err(read)?;

    Ok(StoredEvent {
        event_id,
        tenant_id: TenantId::from_uuid(tenant_id),
        aggregate_id: AggregateId::from_uuid(aggregate_id),
        aggregate_type,
        sequence_number: sequence_number as u64,
        event_type,
        event_version: event_version as u32,
        occurred_at,
        payload,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    EventStoreError::Unavailable(format!("{operation}: {err}"))
}
