//! Infrastructure wiring: event store, bus, dispatcher, projections, flows.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use harborerp_core::{Aggregate, AggregateId, DomainError, TenantId};
use harborerp_events::{EventBus, EventEnvelope, InMemoryEventBus};
use harborerp_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    flows::{goods::GoodsFlows, invoicing::InvoiceFlows, requests::RequestFlows},
    projections::{
        inventory_stock::{InventoryStockProjection, StockReadModel},
        procurement_docs::{
            GoodsIssueReadModel, GoodsReceiptReadModel, ProcurementDocsProjection,
            PurchaseRequestReadModel,
        },
        purchase_invoices::{InvoiceReadModel, PurchaseInvoicesProjection},
    },
    read_model::InMemoryTenantStore,
    reference_index::ReferenceIndex,
    sinks::{RecordingAssetMaintenanceSink, RecordingProjectCostSink},
};
use harborerp_inventory::InventoryItemId;
use harborerp_invoicing::PurchaseInvoiceId;
use harborerp_procurement::{GoodsIssueId, GoodsReceiptId, PurchaseRequestId};

type Store = Arc<InMemoryEventStore>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Store, Bus>;

type StockStore = Arc<InMemoryTenantStore<InventoryItemId, StockReadModel>>;
type ReceiptStore = Arc<InMemoryTenantStore<GoodsReceiptId, GoodsReceiptReadModel>>;
type IssueStore = Arc<InMemoryTenantStore<GoodsIssueId, GoodsIssueReadModel>>;
type RequestStore = Arc<InMemoryTenantStore<PurchaseRequestId, PurchaseRequestReadModel>>;
type InvoiceStore = Arc<InMemoryTenantStore<PurchaseInvoiceId, InvoiceReadModel>>;

pub type StockProjection = InventoryStockProjection<StockStore>;
pub type DocsProjection = ProcurementDocsProjection<ReceiptStore, IssueStore, RequestStore>;
pub type InvoicesProjection = PurchaseInvoicesProjection<InvoiceStore>;

pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    pub goods: GoodsFlows<Store, Bus>,
    pub invoices: InvoiceFlows<Store, Bus>,
    pub requests: RequestFlows<Store, Bus>,
    pub stock_projection: Arc<StockProjection>,
    pub docs_projection: Arc<DocsProjection>,
    pub invoices_projection: Arc<InvoicesProjection>,
    pub project_costs: Arc<RecordingProjectCostSink>,
    pub asset_maintenance: Arc<RecordingAssetMaintenanceSink>,
}

/// Wire the in-memory stack: store + bus + dispatcher + projections + flows.
///
/// A background thread drains the bus into the projections; reads are
/// eventually consistent with the command path.
pub fn build_services() -> AppServices {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher: Arc<Dispatcher> = Arc::new(CommandDispatcher::new(store, bus.clone()));
    let references = Arc::new(ReferenceIndex::new());

    let stock_projection: Arc<StockProjection> =
        Arc::new(InventoryStockProjection::new(Arc::new(InMemoryTenantStore::new())));
    let docs_projection: Arc<DocsProjection> = Arc::new(ProcurementDocsProjection::new(
        Arc::new(InMemoryTenantStore::new()),
        Arc::new(InMemoryTenantStore::new()),
        Arc::new(InMemoryTenantStore::new()),
    ));
    let invoices_projection: Arc<InvoicesProjection> =
        Arc::new(PurchaseInvoicesProjection::new(Arc::new(InMemoryTenantStore::new())));

    // Background subscriber: bus -> projections.
    {
        let sub = bus.subscribe();
        let stock = stock_projection.clone();
        let docs = docs_projection.clone();
        let invoices = invoices_projection.clone();
        std::thread::spawn(move || {
            while let Ok(env) = sub.recv() {
                if let Err(e) = stock.apply_envelope(&env) {
                    tracing::warn!("stock projection apply failed: {e}");
                }
                if let Err(e) = docs.apply_envelope(&env) {
                    tracing::warn!("docs projection apply failed: {e}");
                }
                if let Err(e) = invoices.apply_envelope(&env) {
                    tracing::warn!("invoices projection apply failed: {e}");
                }
            }
        });
    }

    let project_costs = Arc::new(RecordingProjectCostSink::new());
    let asset_maintenance = Arc::new(RecordingAssetMaintenanceSink::new());

    AppServices {
        goods: GoodsFlows::new(dispatcher.clone(), references.clone()),
        invoices: InvoiceFlows::new(
            dispatcher.clone(),
            references.clone(),
            project_costs.clone(),
            asset_maintenance.clone(),
        ),
        requests: RequestFlows::new(dispatcher.clone(), references),
        dispatcher,
        stock_projection,
        docs_projection,
        invoices_projection,
        project_costs,
        asset_maintenance,
    }
}

impl AppServices {
    /// Dispatch a single-aggregate command (used by routes that need no flow
    /// orchestration, e.g. item registration).
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: harborerp_events::Event + Serialize + DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    /// Load and rehydrate an aggregate for authoritative reads.
    pub fn load_aggregate<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        self.dispatcher
            .load_aggregate::<A>(tenant_id, aggregate_id, make_aggregate)
    }
}
