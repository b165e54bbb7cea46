//! Postal lookup and shipping quotes through the HTTP API.

mod harness;

use harness::{TestHarness, ORIGIN, REMOTE_CEP};
use serde_json::{json, Value};

#[tokio::test]
async fn health_reports_shipping_configuration() {
    let h = TestHarness::setup().await;
    let body: Value = h.get("/health").await.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["shipping_configured"], true);

    let h = TestHarness::with_carrier_token(None).await;
    let body: Value = h.get("/health").await.json().await.unwrap();
    assert_eq!(body["shipping_configured"], false);
}

#[tokio::test]
async fn postal_code_lookup_hit_miss_and_invalid() {
    let h = TestHarness::setup().await;

    let resp = h.get("/postal-codes/01310-100").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["street"], "Avenida Paulista");
    assert_eq!(body["city"], "São Paulo");
    assert_eq!(body["region"], "SP");

    assert_eq!(h.get("/postal-codes/99999999").await.status(), 404);
    assert_eq!(h.get("/postal-codes/0131").await.status(), 400);
}

#[tokio::test]
async fn quote_is_normalized_and_sorted() {
    let h = TestHarness::setup().await;
    let resp = h
        .post(
            "/shipping/quotes",
            &json!({ "postal_code": "01310-100", "items": [{ "product_id": "x", "quantity": 2 }] }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["status"], "options");
    let quotes = body["quotes"].as_array().unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0]["carrier_name"], "PAC");
    assert_eq!(quotes[0]["price"], 2400);
    assert_eq!(quotes[0]["deadline_days"], 6);
    assert_eq!(quotes[1]["carrier_name"], "SEDEX");
    assert_eq!(quotes[1]["price"], 4590);
    assert_eq!(quotes[1]["deadline_days"], 2);
    assert_eq!(quotes[1]["logo_url"], "https://example.com/correios.png");

    assert_eq!(body["package"]["weight"], 0.4);
    assert_eq!(body["package"]["length"], 18.0);
}

#[tokio::test]
async fn quote_request_sends_one_consolidated_package() {
    let h = TestHarness::setup().await;
    h.post(
        "/shipping/quotes",
        &json!({
            "postal_code": "01310100",
            "items": [
                { "product_id": "x", "quantity": 2 },
                { "product_id": "ring", "quantity": 1 }
            ]
        }),
    )
    .await;

    let sent = h.quote_requests.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let request = &sent[0];
    assert_eq!(request["from"]["postal_code"], ORIGIN);
    assert_eq!(request["to"]["postal_code"], "01310100");

    let products = request["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    let package = &products[0];
    assert_eq!(package["quantity"], 1);
    assert_eq!(package["insurance_value"], 399.0);
    assert_eq!(package["description"], "2x Colar Veneziana, Anel");
    // the ring has no dimensions: placeholder 10 cm tall and wide, 10 cm added lengthwise
    assert_eq!(package["height"], 10.0);
    assert_eq!(package["width"], 12.0);
    assert_eq!(package["length"], 28.0);
}

#[tokio::test]
async fn unserved_destination_is_no_options_not_an_error() {
    let h = TestHarness::setup().await;
    let resp = h
        .post(
            "/shipping/quotes",
            &json!({ "postal_code": REMOTE_CEP, "items": [{ "product_id": "x", "quantity": 1 }] }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "no_options");
    assert!(body.get("quotes").is_none());
}

#[tokio::test]
async fn rejected_token_surfaces_provider_message() {
    let h = TestHarness::with_carrier_token(Some("expired")).await;
    let resp = h
        .post(
            "/shipping/quotes",
            &json!({ "postal_code": "01310100", "items": [{ "product_id": "x", "quantity": 1 }] }),
        )
        .await;
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Unauthenticated."), "{message}");
}

#[tokio::test]
async fn missing_token_reports_unavailable_without_calling_out() {
    let h = TestHarness::with_carrier_token(None).await;
    let resp = h
        .post(
            "/shipping/quotes",
            &json!({ "postal_code": "01310100", "items": [{ "product_id": "x", "quantity": 1 }] }),
        )
        .await;
    assert_eq!(resp.status(), 503);
    assert!(h.quote_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn quote_rejects_bad_input() {
    let h = TestHarness::setup().await;
    let partial = h
        .post(
            "/shipping/quotes",
            &json!({ "postal_code": "01310", "items": [{ "product_id": "x", "quantity": 1 }] }),
        )
        .await;
    assert_eq!(partial.status(), 400);

    let empty = h
        .post("/shipping/quotes", &json!({ "postal_code": "01310100", "items": [] }))
        .await;
    assert_eq!(empty.status(), 400);

    let unknown = h
        .post(
            "/shipping/quotes",
            &json!({ "postal_code": "01310100", "items": [{ "product_id": "nope", "quantity": 1 }] }),
        )
        .await;
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn quotes_follow_enabled_carriers() {
    let h = TestHarness::setup().await;
    let quote = json!({ "postal_code": "01310100", "items": [{ "product_id": "x", "quantity": 1 }] });

    let settings: Value = h.admin_get("/admin/shipping-settings").await.json().await.unwrap();
    assert_eq!(settings["enabled_carriers"], json!(["jadlog", "correios", "azul_cargo"]));

    let saved = h
        .admin_put("/admin/shipping-settings", &json!({ "enabled_carriers": ["Jadlog"] }))
        .await;
    assert_eq!(saved.status(), 200);
    let body: Value = h.post("/shipping/quotes", &quote).await.json().await.unwrap();
    assert_eq!(body["status"], "no_options");

    h.admin_put("/admin/shipping-settings", &json!({ "enabled_carriers": ["correios"] }))
        .await;
    let body: Value = h.post("/shipping/quotes", &quote).await.json().await.unwrap();
    assert_eq!(body["status"], "options");
    assert_eq!(body["quotes"][0]["carrier_company"], "correios");
}

#[tokio::test]
async fn carrier_settings_are_admin_only_and_never_empty() {
    let h = TestHarness::setup().await;
    assert_eq!(h.get("/admin/shipping-settings").await.status(), 401);

    let empty = h
        .admin_put("/admin/shipping-settings", &json!({ "enabled_carriers": [" "] }))
        .await;
    assert_eq!(empty.status(), 422);

    let settings: Value = h.admin_get("/admin/shipping-settings").await.json().await.unwrap();
    assert_eq!(settings["enabled_carriers"].as_array().unwrap().len(), 3);
}
