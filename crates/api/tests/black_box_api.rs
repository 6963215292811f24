use chrono::{Duration as ChronoDuration, Utc};
use harborerp_core::TenantId;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = harborerp_api::app::build_app();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn client_for(tenant_id: TenantId) -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "x-tenant-id",
        tenant_id.to_string().parse().expect("tenant header"),
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .expect("client build")
}

/// Decimal values travel as JSON strings; some callers send plain numbers.
fn decimal_field(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::String(s) => s.parse().expect("decimal string"),
        serde_json::Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected decimal, got {other:?}"),
    }
}

async fn register_item(client: &reqwest::Client, base_url: &str, name: &str) -> String {
    let res = client
        .post(format!("{}/inventory/items", base_url))
        .json(&json!({ "name": name, "unit": "pcs", "min_stock_level": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Reads go through projections fed off the bus; poll briefly until the
/// projection catches up with the command path.
async fn get_item_eventually(
    client: &reqwest::Client,
    base_url: &str,
    id: &str,
) -> serde_json::Value {
    for _ in 0..50 {
        let res = client
            .get(format!("{}/inventory/items/{}", base_url, id))
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("item did not become visible in projection within timeout");
}

#[tokio::test]
async fn tenant_header_is_required() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/inventory/items", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Health stays open.
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn goods_receipts_return_updated_stock_snapshot() {
    let srv = TestServer::spawn().await;
    let client = client_for(TenantId::new());

    let item_id = register_item(&client, &srv.base_url, "Anchor chain").await;

    let res = client
        .post(format!("{}/goods-receipts", srv.base_url))
        .json(&json!({
            "reference": "GR-2026-0001",
            "items": [{ "item_id": item_id, "quantity": 10, "unit_cost": "5.00" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["stock"][0]["on_hand"], 10);
    assert_eq!(decimal_field(&body["stock"][0]["avg_cost"]), Decimal::from(5));

    let res = client
        .post(format!("{}/goods-receipts", srv.base_url))
        .json(&json!({
            "reference": "GR-2026-0002",
            "items": [{ "item_id": item_id, "quantity": 10, "unit_cost": "7.00" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["stock"][0]["on_hand"], 20);
    assert_eq!(decimal_field(&body["stock"][0]["avg_cost"]), Decimal::from(6));

    // The read model converges to the same snapshot.
    let item = get_item_eventually(&client, &srv.base_url, &item_id).await;
    assert_eq!(item["on_hand"], 20);
    assert_eq!(decimal_field(&item["avg_cost"]), Decimal::from(6));
}

#[tokio::test]
async fn goods_issue_rejects_insufficient_stock_with_400() {
    let srv = TestServer::spawn().await;
    let client = client_for(TenantId::new());

    let item_id = register_item(&client, &srv.base_url, "Deck paint").await;

    let res = client
        .post(format!("{}/goods-receipts", srv.base_url))
        .json(&json!({
            "reference": "GR-1",
            "items": [
                { "item_id": item_id, "quantity": 10, "unit_cost": 5 },
                { "item_id": item_id, "quantity": 10, "unit_cost": 7 },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // Issue(25) fails; stock remains 20.
    let res = client
        .post(format!("{}/goods-issues", srv.base_url))
        .json(&json!({
            "reference": "GI-1",
            "items": [{ "item_id": item_id, "quantity": 25 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");

    // Issue(15) succeeds; stock 5, average unchanged at 6.
    let res = client
        .post(format!("{}/goods-issues", srv.base_url))
        .json(&json!({
            "reference": "GI-1",
            "items": [{ "item_id": item_id, "quantity": 15 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["stock"][0]["on_hand"], 5);
    assert_eq!(decimal_field(&body["stock"][0]["avg_cost"]), Decimal::from(6));
}

#[tokio::test]
async fn duplicate_receipt_reference_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let client = client_for(TenantId::new());

    let item_id = register_item(&client, &srv.base_url, "Filter").await;
    let receipt = json!({
        "reference": "GR-1",
        "items": [{ "item_id": item_id, "quantity": 5, "unit_cost": 10 }],
    });

    let res = client
        .post(format!("{}/goods-receipts", srv.base_url))
        .json(&receipt)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/goods-receipts", srv.base_url))
        .json(&receipt)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn invoice_payment_lifecycle_over_http() {
    let srv = TestServer::spawn().await;
    let client = client_for(TenantId::new());

    let item_id = register_item(&client, &srv.base_url, "Injector kit").await;
    let due_date = (Utc::now() + ChronoDuration::days(30)).to_rfc3339();

    let res = client
        .post(format!("{}/purchase-invoices", srv.base_url))
        .json(&json!({
            "invoice_number": "PI-1",
            "supplier_id": TenantId::new().to_string(),
            "due_date": due_date,
            "items": [{ "item_id": item_id, "quantity": 10, "unit_price": 100 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let invoice_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(decimal_field(&body["total_amount"]), Decimal::from(1000));
    assert_eq!(body["status"], "pending");

    let pay = |amount: i64| {
        client
            .post(format!("{}/purchase-invoices/{}/payments", srv.base_url, invoice_id))
            .json(&json!({ "amount": amount, "payment_method": "bank_transfer" }))
            .send()
    };

    // Overpayment rejected outright.
    let res = pay(1200).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "overpayment_not_allowed");

    let res = pay(600).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(decimal_field(&body["paid_amount"]), Decimal::from(600));
    assert_eq!(body["status"], "partially_paid");

    let res = pay(400).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(decimal_field(&body["paid_amount"]), Decimal::from(1000));
    assert_eq!(body["status"], "paid");

    // Balance is zero: one more unit is an overshoot.
    let res = pay(1).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Approval is one-way.
    let res = client
        .patch(format!("{}/purchase-invoices/{}/approve", srv.base_url, invoice_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["approval_status"], "approved");

    let res = client
        .patch(format!("{}/purchase-invoices/{}/approve", srv.base_url, invoice_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_state_transition");
}

#[tokio::test]
async fn purchase_request_approval_is_terminal() {
    let srv = TestServer::spawn().await;
    let client = client_for(TenantId::new());

    let item_id = register_item(&client, &srv.base_url, "Life raft kit").await;

    let res = client
        .post(format!("{}/purchase-requests", srv.base_url))
        .json(&json!({
            "request_number": "PR-1",
            "urgency": "high",
            "items": [{ "item_id": item_id, "quantity": 2 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let request_id = body["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/purchase-requests/{}/approve", srv.base_url, request_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/purchase-requests/{}/approve", srv.base_url, request_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_state_transition");
}

#[tokio::test]
async fn tenants_are_isolated() {
    let srv = TestServer::spawn().await;
    let tenant_a = client_for(TenantId::new());
    let tenant_b = client_for(TenantId::new());

    let item_id = register_item(&tenant_a, &srv.base_url, "Fender").await;
    get_item_eventually(&tenant_a, &srv.base_url, &item_id).await;

    let res = tenant_b
        .get(format!("{}/inventory/items/{}", srv.base_url, item_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
