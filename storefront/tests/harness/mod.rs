//! Shared setup: the storefront API on an ephemeral port, backed by the
//! in-memory store, with mock carrier and postal-lookup upstreams.
#![allow(dead_code)]

pub mod postgrest;

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pratas_common::address::PostalCode;
use pratas_common::product::{Product, ProductCategory, ProductId};
use pratas_storefront::api::{self, AppState};
use pratas_storefront::melhor_envio::MelhorEnvioClient;
use pratas_storefront::memory::MemoryStore;
use pratas_storefront::viacep::ViaCepClient;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const ADMIN_TOKEN: &str = "admin-test-token";
pub const CARRIER_TOKEN: &str = "carrier-test-token";
pub const ORIGIN: &str = "96020360";
/// Destination no carrier serves.
pub const REMOTE_CEP: &str = "69900000";

pub struct TestHarness {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: Arc<AppState<MemoryStore>>,
    /// Bodies received by the mock carrier.
    pub quote_requests: Arc<Mutex<Vec<Value>>>,
}

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn necklace() -> Product {
    Product {
        id: ProductId("x".into()),
        name: "Colar Veneziana".into(),
        description: String::new(),
        price: 15000,
        stock: 5,
        weight: Some(0.2),
        height: Some(4.0),
        width: Some(12.0),
        length: Some(9.0),
        image_url: String::new(),
        images: vec![],
        category: ProductCategory::Necklaces,
        is_featured: true,
        created_at: None,
    }
}

pub fn ring() -> Product {
    Product {
        id: ProductId("ring".into()),
        name: "Anel".into(),
        description: String::new(),
        price: 9900,
        stock: 1,
        weight: None,
        height: None,
        width: None,
        length: None,
        image_url: String::new(),
        images: vec![],
        category: ProductCategory::Rings,
        is_featured: false,
        created_at: None,
    }
}

fn carrier_offers() -> Value {
    json!([
        {
            "id": 2,
            "name": "SEDEX",
            "price": 45.9,
            "custom_delivery_time": "2",
            "company": { "name": "Correios", "picture": "https://example.com/correios.png" }
        },
        {
            "id": 1,
            "name": "PAC",
            "price": "26.10",
            "custom_price": "24.00",
            "delivery_time": 6,
            "company": { "name": "Correios", "picture": "https://example.com/correios.png" }
        },
        { "id": 3, "name": ".Package", "error": "Transportadora não atende este trecho." },
        { "id": 4, "name": "Mini Envios", "price": "0" }
    ])
}

async fn mock_calculate(
    State(seen): State<Arc<Mutex<Vec<Value>>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let expected = format!("Bearer {CARRIER_TOKEN}");
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthenticated." })),
        );
    }
    let destination = body["to"]["postal_code"].as_str().unwrap_or_default().to_string();
    seen.lock().unwrap().push(body);
    if destination == REMOTE_CEP {
        return (
            StatusCode::OK,
            Json(json!([{ "id": 1, "name": "PAC", "error": "Sem cobertura." }])),
        );
    }
    (StatusCode::OK, Json(carrier_offers()))
}

async fn mock_tracking(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let expected = format!("Bearer {CARRIER_TOKEN}");
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthenticated." })),
        );
    }
    let mut found = serde_json::Map::new();
    for code in body["objects"].as_array().into_iter().flatten() {
        if let Some(code) = code.as_str() {
            found.insert(
                code.to_string(),
                json!({ "status": "posted", "tracking": code, "locale": "Pelotas/RS" }),
            );
        }
    }
    (StatusCode::OK, Json(Value::Object(found)))
}

async fn mock_viacep(Path(cep): Path<String>) -> Json<Value> {
    if cep == "01310100" {
        Json(json!({
            "cep": "01310-100",
            "logradouro": "Avenida Paulista",
            "bairro": "Bela Vista",
            "localidade": "São Paulo",
            "uf": "SP"
        }))
    } else {
        Json(json!({ "erro": "true" }))
    }
}

impl TestHarness {
    pub async fn setup() -> Self {
        Self::with_carrier_token(Some(CARRIER_TOKEN)).await
    }

    pub async fn with_carrier_token(token: Option<&str>) -> Self {
        let quote_requests = Arc::new(Mutex::new(Vec::new()));
        let carrier = spawn(
            Router::new()
                .route("/api/v2/me/shipment/calculate", post(mock_calculate))
                .route("/api/v2/me/shipment/tracking", post(mock_tracking))
                .with_state(quote_requests.clone()),
        )
        .await;
        let viacep = spawn(Router::new().route("/{cep}/json/", get(mock_viacep))).await;

        let http = reqwest::Client::new();
        let state = Arc::new(AppState {
            store: MemoryStore::with_products(vec![necklace(), ring()]),
            lookup: ViaCepClient::new(http.clone(), viacep),
            quotes: MelhorEnvioClient::new(
                http.clone(),
                carrier,
                token.map(str::to_string),
                "pratas-tests",
            ),
            origin: PostalCode::parse(ORIGIN).unwrap(),
            admin_token: Some(ADMIN_TOKEN.to_string()),
        });
        let base_url = spawn(api::router(state.clone())).await;

        Self {
            base_url,
            client: http,
            state,
            quote_requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client.post(self.url(path)).json(body).send().await.unwrap()
    }

    pub async fn admin_get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .unwrap()
    }

    pub async fn admin_post<T: Serialize>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn admin_put<T: Serialize>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(ADMIN_TOKEN)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn stock_of(&self, id: &str) -> Option<u32> {
        self.state.store.stock_of(&ProductId(id.into())).await
    }
}

/// A complete checkout body for two necklaces shipped to Avenida Paulista.
pub fn checkout_body(reference: &str) -> Value {
    json!({
        "checkout_reference": reference,
        "contact": { "name": "Ana Souza", "email": "Ana@Example.com", "phone": "11999990000" },
        "address": {
            "postal_code": "01310-100",
            "region": "sp",
            "city": "São Paulo",
            "street": "Avenida Paulista",
            "number": "1578",
            "complement": "ap 12"
        },
        "items": [{ "product_id": "x", "quantity": 2 }],
        "payment": { "method": "pix", "installments": 1 }
    })
}
