//! Order placement through `POST /orders`.

mod harness;

use harness::{checkout_body, TestHarness};
use pratas_common::order::{Order, OrderStatus};
use pratas_storefront::adapters::OrderStore;
use pratas_storefront::memory::FailPoint;
use serde_json::{json, Value};

#[tokio::test]
async fn checkout_places_order_with_quoted_shipping() {
    let h = TestHarness::setup().await;
    let resp = h.post("/orders", &checkout_body("chk-test-1")).await;
    assert_eq!(resp.status(), 201);
    let order: Order = resp.json().await.unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.shipping_cost, 2400);
    assert_eq!(order.total_amount, 32400);
    assert_eq!(order.shipping_carrier.as_deref(), Some("1"));
    assert_eq!(order.shipping_deadline, Some(6));
    assert_eq!(order.postal_code, "01310100");
    assert_eq!(order.region, "SP");
    assert_eq!(order.checkout_reference.as_deref(), Some("chk-test-1"));

    let items = h.state.store.list_order_items(&order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].price, 15000);
    assert_eq!(h.stock_of("x").await, Some(3));

    let customer = h.state.store.get_customer(&order.customer_id).await.unwrap();
    assert_eq!(customer.email, "ana@example.com");
    assert_eq!(customer.complement, "ap 12");
}

#[tokio::test]
async fn retrying_a_placed_checkout_returns_the_same_order() {
    let h = TestHarness::setup().await;
    let first: Order = h
        .post("/orders", &checkout_body("chk-retry"))
        .await
        .json()
        .await
        .unwrap();

    let resp = h.post("/orders", &checkout_body("chk-retry")).await;
    assert_eq!(resp.status(), 200);
    let second: Order = resp.json().await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.state.store.order_count().await, 1);
    assert_eq!(h.stock_of("x").await, Some(3));
}

#[tokio::test]
async fn chosen_carrier_overrides_cheapest() {
    let h = TestHarness::setup().await;
    let mut body = checkout_body("chk-sedex");
    body["carrier_id"] = json!("2");
    let order: Order = h.post("/orders", &body).await.json().await.unwrap();
    assert_eq!(order.shipping_cost, 4590);
    assert_eq!(order.total_amount, 34590);
    assert_eq!(order.shipping_deadline, Some(2));

    let mut body = checkout_body("chk-unknown-carrier");
    body["carrier_id"] = json!("99");
    assert_eq!(h.post("/orders", &body).await.status(), 422);
}

#[tokio::test]
async fn card_installments_are_recorded() {
    let h = TestHarness::setup().await;
    let mut body = checkout_body("chk-card");
    body["payment"] = json!({ "method": "credit_card", "installments": 3 });
    let order: Order = h.post("/orders", &body).await.json().await.unwrap();
    assert_eq!(order.installments, 3);
    assert_eq!(order.installment_amount, 10800);

    let mut body = checkout_body("chk-card-13");
    body["payment"] = json!({ "method": "credit_card", "installments": 13 });
    assert_eq!(h.post("/orders", &body).await.status(), 422);
}

#[tokio::test]
async fn missing_fields_block_checkout() {
    let h = TestHarness::setup().await;
    let mut body = checkout_body("chk-missing");
    body["contact"]["name"] = json!("  ");
    body["address"]["number"] = json!("");

    let resp = h.post("/orders", &body).await;
    assert_eq!(resp.status(), 422);
    let error: Value = resp.json().await.unwrap();
    assert_eq!(error["error"], "Preencha todos os campos obrigatórios.");
    assert_eq!(h.state.store.order_count().await, 0);
}

#[tokio::test]
async fn insufficient_stock_is_rejected_before_writing() {
    let h = TestHarness::setup().await;
    let mut body = checkout_body("chk-too-many");
    body["items"] = json!([{ "product_id": "x", "quantity": 6 }]);

    assert_eq!(h.post("/orders", &body).await.status(), 409);
    assert_eq!(h.state.store.order_count().await, 0);
    assert_eq!(h.stock_of("x").await, Some(5));
}

#[tokio::test]
async fn quote_outage_does_not_block_checkout() {
    let h = TestHarness::with_carrier_token(None).await;
    let resp = h.post("/orders", &checkout_body("chk-no-quote")).await;
    assert_eq!(resp.status(), 201);
    let order: Order = resp.json().await.unwrap();
    assert_eq!(order.shipping_cost, 0);
    assert_eq!(order.shipping_carrier, None);
    assert_eq!(order.total_amount, 30000);
}

#[tokio::test]
async fn backend_failure_rolls_back_and_retry_succeeds() {
    let h = TestHarness::setup().await;
    h.state.store.fail_once(FailPoint::CreateOrderItems).await;

    let resp = h.post("/orders", &checkout_body("chk-flaky")).await;
    assert_eq!(resp.status(), 502);
    let error: Value = resp.json().await.unwrap();
    assert_eq!(error["error"], "Erro ao processar pedido. Tente novamente.");
    assert_eq!(h.state.store.order_count().await, 0);
    assert_eq!(h.stock_of("x").await, Some(5));

    let resp = h.post("/orders", &checkout_body("chk-flaky")).await;
    assert_eq!(resp.status(), 201);
    assert_eq!(h.state.store.order_count().await, 1);
    assert_eq!(h.stock_of("x").await, Some(3));
}

#[tokio::test]
async fn disabled_carriers_are_not_charged() {
    let h = TestHarness::setup().await;
    h.admin_put("/admin/shipping-settings", &json!({ "enabled_carriers": ["jadlog"] }))
        .await;

    let order: Order = h
        .post("/orders", &checkout_body("chk-jadlog-only"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(order.shipping_cost, 0);
    assert_eq!(order.shipping_carrier, None);
}

#[tokio::test]
async fn simultaneous_submissions_of_one_checkout_place_one_order() {
    let h = TestHarness::setup().await;
    let body = checkout_body("chk-double-click");

    let (a, b) = tokio::join!(h.post("/orders", &body), h.post("/orders", &body));
    let a: Order = a.json().await.unwrap();
    let b: Order = b.json().await.unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(h.state.store.order_count().await, 1);
    assert_eq!(h.state.store.customer_count().await, 1);
    assert_eq!(h.stock_of("x").await, Some(3));
}
