//! Admin routes: authentication, fulfilment graph, catalog edits, dashboard.

mod harness;

use harness::{checkout_body, TestHarness, ADMIN_TOKEN};
use pratas_common::order::{Order, OrderStatus};
use pratas_common::product::Product;
use serde_json::{json, Value};

async fn place(h: &TestHarness, reference: &str) -> Order {
    let resp = h.post("/orders", &checkout_body(reference)).await;
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn admin_routes_require_token() {
    let h = TestHarness::setup().await;
    assert_eq!(h.get("/admin/orders").await.status(), 401);
    assert_eq!(h.get("/admin/summary").await.status(), 401);

    let wrong = h
        .client
        .get(h.url("/admin/orders"))
        .bearer_auth("not-the-token")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    assert_eq!(h.admin_get("/admin/orders").await.status(), 200);
}

#[tokio::test]
async fn order_follows_fulfilment_graph() {
    let h = TestHarness::setup().await;
    let order = place(&h, "chk-admin-1").await;
    let status_path = format!("/admin/orders/{}/status", order.id);
    let tracking_path = format!("/admin/orders/{}/tracking", order.id);

    let skip = h.admin_post(&status_path, &json!({ "status": "completed" })).await;
    assert_eq!(skip.status(), 409);

    let early = h
        .admin_post(&tracking_path, &json!({ "tracking_code": "BR123456789BR" }))
        .await;
    assert_eq!(early.status(), 409);

    let processing: Order = h
        .admin_post(&status_path, &json!({ "status": "processing" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(processing.status, OrderStatus::Processing);

    let tracked: Order = h
        .admin_post(&tracking_path, &json!({ "tracking_code": "BR123456789BR" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(tracked.tracking_code.as_deref(), Some("BR123456789BR"));

    let done = h.admin_post(&status_path, &json!({ "status": "completed" })).await;
    assert_eq!(done.status(), 200);

    let reopen = h.admin_post(&status_path, &json!({ "status": "cancelled" })).await;
    assert_eq!(reopen.status(), 409);

    let missing = h
        .admin_post("/admin/orders/ord-404/status", &json!({ "status": "processing" }))
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn orders_filter_by_status_and_customer() {
    let h = TestHarness::setup().await;
    let first = place(&h, "chk-a").await;
    let second = place(&h, "chk-b").await;
    h.admin_post(
        &format!("/admin/orders/{}/status", first.id),
        &json!({ "status": "cancelled" }),
    )
    .await;

    let pending: Vec<Order> = h
        .admin_get("/admin/orders?status=pending")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);

    let history: Vec<Order> = h
        .admin_get(&format!("/customers/{}/orders", first.customer_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(h.get(&format!("/customers/{}/orders", first.customer_id)).await.status(), 401);
}

#[tokio::test]
async fn dashboard_summary_counts() {
    let h = TestHarness::setup().await;
    let order = place(&h, "chk-dash").await;
    h.admin_post(
        &format!("/admin/orders/{}/status", order.id),
        &json!({ "status": "processing" }),
    )
    .await;

    let summary: Value = h.admin_get("/admin/summary").await.json().await.unwrap();
    assert_eq!(summary["orders"], 1);
    assert_eq!(summary["by_status"]["processing"], 1);
    assert_eq!(summary["by_status"]["pending"], 0);
    assert_eq!(summary["revenue"], 0);
    assert_eq!(summary["products"], 2);

    h.admin_post(
        &format!("/admin/orders/{}/status", order.id),
        &json!({ "status": "completed" }),
    )
    .await;
    let summary: Value = h.admin_get("/admin/summary").await.json().await.unwrap();
    assert_eq!(summary["revenue"], 32400);
}

#[tokio::test]
async fn catalog_create_update_delete() {
    let h = TestHarness::setup().await;
    let draft = json!({
        "name": "Pingente Coração",
        "price": "79.90",
        "stock": 4,
        "category": "pingentes",
        "is_featured": true
    });

    let resp = h.admin_post("/admin/products", &draft).await;
    assert_eq!(resp.status(), 201);
    let created: Product = resp.json().await.unwrap();
    assert_eq!(created.price, 7990);

    let featured: Vec<Product> = h
        .get("/products?featured=true&category=pendants")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0].id, created.id);

    let updated: Product = h
        .client
        .put(h.url(&format!("/admin/products/{}", created.id)))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "name": "Pingente Coração", "price": 69.9, "stock": 2, "category": "pendants" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated.price, 6990);
    assert_eq!(updated.stock, 2);
    assert!(!updated.is_featured);

    let invalid = h
        .admin_post("/admin/products", &json!({ "name": "", "price": 0, "stock": 1, "category": "rings" }))
        .await;
    assert_eq!(invalid.status(), 422);

    let deleted = h
        .client
        .delete(h.url(&format!("/admin/products/{}", created.id)))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);
    assert_eq!(h.get(&format!("/products/{}", created.id)).await.status(), 404);
}
