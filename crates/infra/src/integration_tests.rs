//! Integration tests for the full pipeline:
//! flows → dispatcher → event store → bus → projections → read models.
//!
//! Covers the document all-or-nothing guarantees, the concurrent-issue
//! serialization property, reference uniqueness, and the invoice payment /
//! approval lifecycle including external-collaborator side effects.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use harborerp_core::{
    AggregateId, AssetInstanceId, DomainError, ExpectedVersion, ProjectId, SupplierId, TenantId,
};
use harborerp_events::{EventBus, EventEnvelope, InMemoryEventBus};
use harborerp_inventory::{InventoryCommand, InventoryItem, InventoryItemId, RegisterItem, item};
use harborerp_invoicing::{ApprovalStatus, InvoiceLine, PaymentMethod, SettlementStatus};
use harborerp_procurement::{IssueLine, ReceiptLine, RequestLine, Urgency};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
use crate::flows::goods::GoodsFlows;
use crate::flows::invoicing::{InvoiceFlows, RecordInvoiceParams, RecordPaymentParams};
use crate::flows::requests::RequestFlows;
use crate::projections::inventory_stock::{InventoryStockProjection, StockReadModel};
use crate::read_model::InMemoryTenantStore;
use crate::reference_index::ReferenceIndex;
use crate::sinks::{RecordingAssetMaintenanceSink, RecordingProjectCostSink};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher<S> = Arc<CommandDispatcher<S, Bus>>;
type StockProjection = Arc<InventoryStockProjection<Arc<InMemoryTenantStore<InventoryItemId, StockReadModel>>>>;

struct Harness<S: EventStore> {
    dispatcher: Dispatcher<S>,
    goods: GoodsFlows<S, Bus>,
    invoices: InvoiceFlows<S, Bus>,
    requests: RequestFlows<S, Bus>,
    stock_projection: StockProjection,
    project_costs: Arc<RecordingProjectCostSink>,
    asset_maintenance: Arc<RecordingAssetMaintenanceSink>,
}

fn harness_with_store<S: EventStore + Clone + 'static>(store: S) -> Harness<S> {
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher: Dispatcher<S> = Arc::new(CommandDispatcher::new(store, bus.clone()));
    let references = Arc::new(ReferenceIndex::new());

    let stock_store: Arc<InMemoryTenantStore<InventoryItemId, StockReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let stock_projection: StockProjection = Arc::new(InventoryStockProjection::new(stock_store));

    // Subscribe to the bus BEFORE any events are published.
    {
        let projection = stock_projection.clone();
        let sub = bus.subscribe();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
        std::thread::spawn(move || {
            let _ = ready_tx.send(());
            while let Ok(env) = sub.recv() {
                if let Err(e) = projection.apply_envelope(&env) {
                    eprintln!("projection apply failed: {e:?}");
                }
            }
        });
        let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));
    }

    let project_costs = Arc::new(RecordingProjectCostSink::new());
    let asset_maintenance = Arc::new(RecordingAssetMaintenanceSink::new());

    Harness {
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
        project_costs,
        asset_maintenance,
    }
}

fn harness() -> Harness<Arc<InMemoryEventStore>> {
    harness_with_store(Arc::new(InMemoryEventStore::new()))
}

/// The subscriber thread applies envelopes asynchronously.
fn wait_for_projection() {
    std::thread::sleep(std::time::Duration::from_millis(50));
}

fn register_item<S: EventStore>(harness: &Harness<S>, tenant_id: TenantId, name: &str) -> InventoryItemId {
    let item_id = InventoryItemId::new(AggregateId::new());
    harness
        .dispatcher
        .dispatch::<InventoryItem>(
            tenant_id,
            item_id.0,
            item::AGGREGATE_TYPE,
            InventoryCommand::RegisterItem(RegisterItem {
                tenant_id,
                item_id,
                name: name.to_string(),
                category: "consumables".to_string(),
                unit: "pcs".to_string(),
                min_stock_level: 0,
                occurred_at: Utc::now(),
            }),
            |id| InventoryItem::empty(InventoryItemId::new(id)),
        )
        .expect("item registration failed");
    item_id
}

fn load_item<S: EventStore>(harness: &Harness<S>, tenant_id: TenantId, item_id: InventoryItemId) -> InventoryItem {
    harness
        .dispatcher
        .load_aggregate::<InventoryItem>(tenant_id, item_id.0, |id| {
            InventoryItem::empty(InventoryItemId::new(id))
        })
        .expect("item load failed")
}

fn receipt_line(line_no: u32, item_id: InventoryItemId, quantity: i64, unit_cost: i64) -> ReceiptLine {
    ReceiptLine {
        line_no,
        item_id,
        quantity,
        unit_cost: Decimal::from(unit_cost),
    }
}

#[test]
fn goods_receipts_blend_weighted_average_and_update_read_model() {
    let harness = harness();
    let tenant_id = TenantId::new();
    let item_id = register_item(&harness, tenant_id, "Hydraulic hose");

    let outcome = harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-1".to_string(),
            vec![receipt_line(1, item_id, 10, 5)],
            Utc::now(),
        )
        .unwrap();
    assert_eq!(outcome.stock.len(), 1);
    assert_eq!(outcome.stock[0].on_hand, 10);
    assert_eq!(outcome.stock[0].avg_cost, Decimal::from(5));

    let outcome = harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-2".to_string(),
            vec![receipt_line(1, item_id, 10, 7)],
            Utc::now(),
        )
        .unwrap();
    assert_eq!(outcome.stock[0].on_hand, 20);
    assert_eq!(outcome.stock[0].avg_cost, Decimal::from(6));

    wait_for_projection();
    let rm = harness
        .stock_projection
        .get(tenant_id, &item_id)
        .expect("read model missing");
    assert_eq!(rm.on_hand, 20);
    assert_eq!(rm.avg_cost, Decimal::from(6));
    assert_eq!(rm.name, "Hydraulic hose");
}

#[test]
fn goods_issue_respects_stock_and_keeps_average() {
    let harness = harness();
    let tenant_id = TenantId::new();
    let item_id = register_item(&harness, tenant_id, "Deck paint");

    harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-1".to_string(),
            vec![receipt_line(1, item_id, 10, 5), receipt_line(2, item_id, 10, 7)],
            Utc::now(),
        )
        .unwrap();

    // Issue beyond stock fails and leaves everything untouched.
    let err = harness
        .goods
        .create_goods_issue(
            tenant_id,
            "GI-1".to_string(),
            None,
            vec![IssueLine {
                line_no: 1,
                item_id,
                quantity: 25,
            }],
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Domain(DomainError::InsufficientStock {
            requested: 25,
            available: 20
        })
    ));
    let item = load_item(&harness, tenant_id, item_id);
    assert_eq!(item.on_hand(), 20);

    // A satisfiable issue decrements stock but not the average.
    let outcome = harness
        .goods
        .create_goods_issue(
            tenant_id,
            "GI-1".to_string(),
            Some(ProjectId::new()),
            vec![IssueLine {
                line_no: 1,
                item_id,
                quantity: 15,
            }],
            Utc::now(),
        )
        .unwrap();
    assert_eq!(outcome.stock[0].on_hand, 5);
    assert_eq!(outcome.stock[0].avg_cost, Decimal::from(6));
}

#[test]
fn multi_line_issue_is_all_or_nothing() {
    let harness = harness();
    let tenant_id = TenantId::new();
    let item_a = register_item(&harness, tenant_id, "Shackle");
    let item_b = register_item(&harness, tenant_id, "Rope");
    let item_c = register_item(&harness, tenant_id, "Buoy");

    harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-1".to_string(),
            vec![
                receipt_line(1, item_a, 10, 2),
                receipt_line(2, item_b, 10, 3),
                receipt_line(3, item_c, 2, 4),
            ],
            Utc::now(),
        )
        .unwrap();

    // Third line is short: the whole batch must fail with no stock change.
    let err = harness
        .goods
        .create_goods_issue(
            tenant_id,
            "GI-1".to_string(),
            None,
            vec![
                IssueLine { line_no: 1, item_id: item_a, quantity: 5 },
                IssueLine { line_no: 2, item_id: item_b, quantity: 5 },
                IssueLine { line_no: 3, item_id: item_c, quantity: 5 },
            ],
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Domain(DomainError::InsufficientStock { .. })
    ));

    assert_eq!(load_item(&harness, tenant_id, item_a).on_hand(), 10);
    assert_eq!(load_item(&harness, tenant_id, item_b).on_hand(), 10);
    assert_eq!(load_item(&harness, tenant_id, item_c).on_hand(), 2);

    // The failed batch must not have consumed the reference.
    harness
        .goods
        .create_goods_issue(
            tenant_id,
            "GI-1".to_string(),
            None,
            vec![IssueLine { line_no: 1, item_id: item_a, quantity: 1 }],
            Utc::now(),
        )
        .unwrap();
}

#[test]
fn duplicate_document_references_are_rejected() {
    let harness = harness();
    let tenant_id = TenantId::new();
    let item_id = register_item(&harness, tenant_id, "Filter");

    harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-1".to_string(),
            vec![receipt_line(1, item_id, 5, 10)],
            Utc::now(),
        )
        .unwrap();

    let err = harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-1".to_string(),
            vec![receipt_line(1, item_id, 5, 10)],
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::Conflict(_))));

    // The duplicate attempt must not have touched the ledger.
    assert_eq!(load_item(&harness, tenant_id, item_id).on_hand(), 5);
}

#[test]
fn concurrent_issues_never_oversell() {
    // Stock 10, two concurrent issues of 6: exactly one succeeds.
    let harness = Arc::new(harness());
    let tenant_id = TenantId::new();
    let item_id = register_item(&harness, tenant_id, "Zinc anode");

    harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-1".to_string(),
            vec![receipt_line(1, item_id, 10, 5)],
            Utc::now(),
        )
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..2 {
        let harness = harness.clone();
        handles.push(std::thread::spawn(move || {
            harness.goods.create_goods_issue(
                tenant_id,
                format!("GI-{i}"),
                None,
                vec![IssueLine {
                    line_no: 1,
                    item_id,
                    quantity: 6,
                }],
                Utc::now(),
            )
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(DispatchError::Domain(DomainError::InsufficientStock { .. }))
            )
        })
        .count();

    assert_eq!(successes, 1, "exactly one issue must win");
    assert_eq!(insufficient, 1, "the loser must see insufficient stock");
    assert_eq!(load_item(&harness, tenant_id, item_id).on_hand(), 4);
}

#[test]
fn invoice_payment_lifecycle_and_approval_side_effects() {
    let harness = harness();
    let tenant_id = TenantId::new();
    let item_id = register_item(&harness, tenant_id, "Main engine injector");
    let project_id = ProjectId::new();
    let asset_id = AssetInstanceId::new();
    let now = Utc::now();

    let snapshot = harness
        .invoices
        .record_invoice(
            tenant_id,
            RecordInvoiceParams {
                invoice_number: "PI-1".to_string(),
                supplier_id: SupplierId::new(),
                project_id: Some(project_id),
                asset_instance_id: Some(asset_id),
                lines: vec![InvoiceLine {
                    line_no: 1,
                    item_id,
                    description: "Injector overhaul kit".to_string(),
                    quantity: 10,
                    unit_price: Decimal::from(100),
                }],
                tax_amount: Decimal::ZERO,
                due_date: now + Duration::days(30),
            },
            now,
        )
        .unwrap();
    assert_eq!(snapshot.total_amount, Decimal::from(1000));
    assert_eq!(snapshot.settlement_status(now), SettlementStatus::Pending);

    let invoice_id = snapshot.invoice_id;
    let pay = |amount: i64| -> Result<_, DispatchError> {
        harness.invoices.record_payment(
            tenant_id,
            invoice_id,
            RecordPaymentParams {
                amount: Decimal::from(amount),
                payment_date: now,
                method: PaymentMethod::BankTransfer,
                files: vec![],
            },
            now,
        )
    };

    let err = pay(1200).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Domain(DomainError::OverpaymentNotAllowed { .. })
    ));

    let snapshot = pay(600).unwrap();
    assert_eq!(snapshot.paid_amount, Decimal::from(600));
    assert_eq!(snapshot.settlement_status(now), SettlementStatus::PartiallyPaid);

    let snapshot = pay(400).unwrap();
    assert_eq!(snapshot.paid_amount, Decimal::from(1000));
    assert_eq!(snapshot.settlement_status(now), SettlementStatus::Paid);

    let err = pay(1).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Domain(DomainError::OverpaymentNotAllowed { .. })
    ));

    // Approval notifies both collaborators exactly once.
    let snapshot = harness
        .invoices
        .approve_invoice(tenant_id, invoice_id, now)
        .unwrap();
    assert_eq!(snapshot.approval_status, ApprovalStatus::Approved);

    let costs = harness.project_costs.all();
    assert_eq!(costs.len(), 1);
    assert_eq!(costs[0].project_id, project_id);
    assert_eq!(costs[0].amount, Decimal::from(1000));

    let maintenance = harness.asset_maintenance.all();
    assert_eq!(maintenance.len(), 1);
    assert_eq!(maintenance[0].asset_instance_id, asset_id);
    assert_eq!(maintenance[0].invoice_ref, "PI-1");

    // Second approval is a terminal-state violation and adds no side effects.
    let err = harness
        .invoices
        .approve_invoice(tenant_id, invoice_id, now)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Domain(DomainError::InvalidStateTransition(_))
    ));
    assert_eq!(harness.project_costs.all().len(), 1);
}

#[test]
fn purchase_request_workflow_is_one_way() {
    let harness = harness();
    let tenant_id = TenantId::new();
    let item_id = register_item(&harness, tenant_id, "Life raft service kit");
    let now = Utc::now();

    let request_id = harness
        .requests
        .create_request(
            tenant_id,
            "PR-1".to_string(),
            vec![RequestLine {
                line_no: 1,
                item_id,
                quantity: 2,
                note: None,
            }],
            Urgency::Critical,
            now,
        )
        .unwrap();

    harness.requests.approve_request(tenant_id, request_id, now).unwrap();

    let err = harness
        .requests
        .approve_request(tenant_id, request_id, now)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Domain(DomainError::InvalidStateTransition(_))
    ));
}

#[test]
fn tenants_cannot_see_each_others_items() {
    let harness = harness();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    let item_id = register_item(&harness, tenant_a, "Fender");

    harness
        .goods
        .create_goods_receipt(
            tenant_a,
            "GR-1".to_string(),
            vec![receipt_line(1, item_id, 5, 10)],
            Utc::now(),
        )
        .unwrap();

    // Tenant B addressing tenant A's item sees an empty stream.
    let err = harness
        .goods
        .create_goods_issue(
            tenant_b,
            "GI-1".to_string(),
            None,
            vec![IssueLine {
                line_no: 1,
                item_id,
                quantity: 1,
            }],
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(DomainError::NotFound)));
}

/// Event store wrapper that fails exactly one append (the Nth), then
/// recovers. Models a transient storage fault mid-batch.
#[derive(Clone)]
struct FlakyStore {
    inner: Arc<InMemoryEventStore>,
    appends: Arc<AtomicUsize>,
    fail_on: usize,
}

impl FlakyStore {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: Arc::new(InMemoryEventStore::new()),
            appends: Arc::new(AtomicUsize::new(0)),
            fail_on,
        }
    }
}

impl EventStore for FlakyStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let n = self.appends.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(EventStoreError::Unavailable("injected fault".to_string()));
        }
        self.inner.append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.load_stream(tenant_id, aggregate_id)
    }
}

#[test]
fn storage_fault_mid_issue_rolls_back_issued_lines() {
    // Appends: 1 register A, 2 register B, 3 receipt doc, 4 receive A,
    // 5 receive B, 6 issue A, 7 issue B (fails), 8 reverse issue A.
    let harness = harness_with_store(FlakyStore::new(7));
    let tenant_id = TenantId::new();
    let item_a = register_item(&harness, tenant_id, "Bilge pump");
    let item_b = register_item(&harness, tenant_id, "Impeller");

    harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-1".to_string(),
            vec![receipt_line(1, item_a, 10, 5), receipt_line(2, item_b, 4, 3)],
            Utc::now(),
        )
        .unwrap();

    let issue_lines = vec![
        IssueLine { line_no: 1, item_id: item_a, quantity: 6 },
        IssueLine { line_no: 2, item_id: item_b, quantity: 2 },
    ];
    let err = harness
        .goods
        .create_goods_issue(tenant_id, "GI-1".to_string(), None, issue_lines.clone(), Utc::now())
        .unwrap_err();
    assert!(matches!(err, DispatchError::Storage(_)));

    // The first line was issued and then reversed.
    assert_eq!(load_item(&harness, tenant_id, item_a).on_hand(), 10);
    assert_eq!(load_item(&harness, tenant_id, item_b).on_hand(), 4);

    // The reference was released with the failed batch; once storage is back,
    // the same issue goes through.
    let outcome = harness
        .goods
        .create_goods_issue(tenant_id, "GI-1".to_string(), None, issue_lines, Utc::now())
        .unwrap();
    assert_eq!(outcome.stock[0].on_hand, 4);
    assert_eq!(outcome.stock[1].on_hand, 2);
}

#[test]
fn storage_fault_mid_receipt_rolls_back_received_lines() {
    // Appends: 1 register A, 2 register B, 3 receipt doc, 4 line A,
    // 5 line B (fails), 6 reverse line A.
    let harness = harness_with_store(FlakyStore::new(5));
    let tenant_id = TenantId::new();
    let item_a = register_item(&harness, tenant_id, "Bilge pump");
    let item_b = register_item(&harness, tenant_id, "Impeller");

    let err = harness
        .goods
        .create_goods_receipt(
            tenant_id,
            "GR-1".to_string(),
            vec![receipt_line(1, item_a, 10, 5), receipt_line(2, item_b, 4, 3)],
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(err, DispatchError::Storage(_)));

    // The first line was received and then reversed; no partial stock change
    // survives the fault.
    let a = load_item(&harness, tenant_id, item_a);
    assert_eq!(a.on_hand(), 0);
    assert_eq!(a.avg_cost(), Decimal::ZERO);
    assert_eq!(load_item(&harness, tenant_id, item_b).on_hand(), 0);
}
