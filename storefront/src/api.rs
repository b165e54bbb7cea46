//! HTTP surface of the storefront.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use pratas_common::address::{AddressField, PartialAddress, PostalCode, ShippingAddress};
use pratas_common::cart::Cart;
use pratas_common::checkout::{ContactDetails, ContactField, PaymentChoice, ShippingState};
use pratas_common::order::{
    CustomerId, NewShippingEvent, Order, OrderId, OrderStatus, PaymentMethod, ShippingEvent,
};
use pratas_common::package::{aggregate, declared_items, PackageDescriptor};
use pratas_common::product::{Product, ProductCategory, ProductDraft, ProductId};
use pratas_common::quote::{QuoteOutcome, ShippingSettings};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::adapters::{
    AddressLookup, Catalog, EnabledCarriers, OrderStore, ProductFilter, QuoteProvider,
    SettingsStore,
};
use crate::admin::{self, DashboardSummary};
use crate::checkout::{CheckoutSession, SubmitError};
use crate::error::{ApiError, StoreError};
use crate::melhor_envio::MelhorEnvioClient;
use crate::tracking::{self, OrderTracking};
use crate::viacep::ViaCepClient;

pub struct AppState<S> {
    pub store: S,
    pub lookup: ViaCepClient,
    pub quotes: MelhorEnvioClient,
    /// Where parcels ship from.
    pub origin: PostalCode,
    pub admin_token: Option<String>,
}

type Shared<S> = State<Arc<AppState<S>>>;

/// Idempotency key for one checkout attempt.
pub fn new_checkout_reference() -> String {
    format!("chk-{}-{:08x}", Utc::now().timestamp_millis(), rand::random::<u32>())
}

pub fn router<S>(state: Arc<AppState<S>>) -> Router
where
    S: Catalog + OrderStore + SettingsStore + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler::<S>))
        .route("/postal-codes/{code}", get(postal_code_handler::<S>))
        .route("/shipping/quotes", post(quote_handler::<S>))
        .route("/products", get(list_products_handler::<S>))
        .route("/products/{id}", get(product_handler::<S>))
        .route("/orders", post(place_order_handler::<S>))
        .route("/orders/{id}", get(order_tracking_handler::<S>))
        .route("/customers/{id}/orders", get(customer_orders_handler::<S>))
        .route("/admin/orders", get(admin_orders_handler::<S>))
        .route("/admin/summary", get(admin_summary_handler::<S>))
        .route("/admin/orders/{id}/status", post(admin_status_handler::<S>))
        .route("/admin/orders/{id}/tracking", post(admin_tracking_handler::<S>))
        .route("/admin/orders/{id}/events", post(admin_event_handler::<S>))
        .route(
            "/admin/shipping-settings",
            get(admin_settings_handler::<S>).put(admin_save_settings_handler::<S>),
        )
        .route("/admin/products", post(admin_create_product_handler::<S>))
        .route(
            "/admin/products/{id}",
            put(admin_update_product_handler::<S>).delete(admin_delete_product_handler::<S>),
        )
        .layer(cors)
        .with_state(state)
}

// ─── Request types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QuoteBody {
    pub postal_code: String,
    pub items: Vec<LineRequest>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub package: PackageDescriptor,
    #[serde(flatten)]
    pub outcome: QuoteOutcome,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CheckoutBody {
    /// Reuse the same value when retrying a failed submission.
    #[serde(default)]
    pub checkout_reference: Option<String>,
    pub contact: ContactDetails,
    pub address: ShippingAddress,
    pub items: Vec<LineRequest>,
    pub payment: PaymentChoice,
    /// Overrides the cheapest carrier.
    #[serde(default)]
    pub carrier_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatusBody {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TrackingBody {
    pub tracking_code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackingQuery {
    /// Email the order was placed with.
    #[serde(default)]
    pub email: String,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn require_admin<S>(state: &AppState<S>, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = state.admin_token.as_deref().ok_or(ApiError::Unauthorized)?;
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;
    if presented.trim() != expected {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

fn parse_postal_code(raw: &str) -> Result<PostalCode, ApiError> {
    PostalCode::parse(raw).ok_or_else(|| ApiError::BadRequest("CEP inválido.".to_string()))
}

/// Build a cart from catalog data so prices and dimensions come from the store.
async fn load_cart<C: Catalog>(catalog: &C, lines: &[LineRequest]) -> Result<Cart, ApiError> {
    if lines.is_empty() {
        return Err(ApiError::BadRequest("Seu carrinho está vazio.".to_string()));
    }
    let mut cart = Cart::new();
    for line in lines {
        let product = catalog.get_product(&line.product_id).await?;
        let wanted = cart.quantity_of(&product.id).saturating_add(line.quantity);
        if !product.is_available(wanted) {
            return Err(StoreError::InsufficientStock {
                product: product.id,
                available: product.stock,
                requested: wanted,
            }
            .into());
        }
        cart.add(product, line.quantity);
    }
    Ok(cart)
}

/// Carrier settings for quoting. A store outage falls back to the defaults
/// rather than blocking checkout.
async fn enabled_carriers<S: SettingsStore>(store: &S) -> ShippingSettings {
    store.shipping_settings().await.unwrap_or_else(|e| {
        warn!(error = %e, "shipping settings unavailable, using defaults");
        ShippingSettings::default()
    })
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn health_handler<S>(State(state): Shared<S>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "shipping_configured": state.quotes.is_configured(),
    }))
}

async fn postal_code_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    Path(code): Path<String>,
) -> Result<Json<PartialAddress>, ApiError> {
    let postal_code = parse_postal_code(&code)?;
    match state.lookup.lookup(&postal_code).await? {
        Some(found) => Ok(Json(found)),
        None => Err(ApiError::NotFound(format!("CEP {postal_code}"))),
    }
}

async fn quote_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    Json(body): Json<QuoteBody>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let destination = parse_postal_code(&body.postal_code)?;
    let cart = load_cart(&state.store, &body.items).await?;
    let package = aggregate(cart.lines());
    let items = declared_items(cart.lines());
    let quotes = EnabledCarriers::new(&state.quotes, enabled_carriers(&state.store).await);
    let outcome = quotes.quote(&state.origin, &destination, &package, &items).await?;
    Ok(Json(QuoteResponse { package, outcome }))
}

async fn list_products_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let filter = ProductFilter {
        category: query
            .category
            .filter(|c| !c.trim().is_empty())
            .map(ProductCategory::from),
        featured: query.featured,
    };
    Ok(Json(state.store.list_products(&filter).await?))
}

async fn product_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.store.get_product(&ProductId(id)).await?))
}

/// Drive one checkout server-side: shipping is re-quoted here so the price
/// recorded is the carrier's, never the client's.
async fn submit_checkout<S: Catalog + OrderStore + SettingsStore>(
    state: &AppState<S>,
    body: CheckoutBody,
) -> Result<(StatusCode, Order), ApiError> {
    let reference = body
        .checkout_reference
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(new_checkout_reference);

    if let Some(existing) = state.store.find_order_by_reference(&reference).await? {
        info!(order = %existing.id, %reference, "checkout retried after success");
        return Ok((StatusCode::OK, existing));
    }

    let mut cart = load_cart(&state.store, &body.items).await?;
    let quotes = EnabledCarriers::new(&state.quotes, enabled_carriers(&state.store).await);
    let mut session = CheckoutSession::new(
        reference,
        state.origin.clone(),
        &state.lookup,
        &quotes,
        &state.store,
    );

    let wizard = session.wizard_mut();
    wizard.set_contact_field(ContactField::Name, body.contact.name);
    wizard.set_contact_field(ContactField::Email, body.contact.email);
    wizard.set_contact_field(ContactField::Phone, body.contact.phone);
    wizard.set_postal_code(body.address.postal_code.as_str());
    for field in [
        AddressField::Region,
        AddressField::City,
        AddressField::Street,
        AddressField::Number,
        AddressField::Complement,
    ] {
        wizard.set_address_field(field, body.address.get(field));
    }

    session.refresh_shipping(&cart).await;

    let wizard = session.wizard_mut();
    if matches!(wizard.shipping(), ShippingState::Options { .. }) {
        if let Some(carrier) = body.carrier_id.as_deref() {
            wizard.select_quote(carrier).map_err(SubmitError::from)?;
        }
    } else {
        warn!(shipping = ?wizard.shipping(), "placing order without a fresh shipping quote");
    }

    wizard.advance().map_err(SubmitError::from)?;
    wizard.choose_payment(body.payment.method);
    if body.payment.method == PaymentMethod::CreditCard {
        wizard
            .set_installments(body.payment.installments)
            .map_err(SubmitError::from)?;
    }
    wizard.advance().map_err(SubmitError::from)?;

    let order = session.submit(&mut cart).await?;
    Ok((StatusCode::CREATED, order))
}

async fn place_order_handler<S: Catalog + OrderStore + SettingsStore + 'static>(
    State(state): Shared<S>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    // Run detached so a client disconnect cannot abandon the saga halfway.
    let task = tokio::spawn(async move { submit_checkout(&state, body).await });
    let (status, order) = task.await.map_err(|e| ApiError::Task(e.to_string()))??;
    Ok((status, Json(order)))
}

async fn order_tracking_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    Path(id): Path<String>,
    Query(query): Query<TrackingQuery>,
) -> Result<Json<OrderTracking>, ApiError> {
    let id = OrderId(id);
    let found = tracking::order_tracking(&state.store, &state.quotes, &id, &query.email).await?;
    Ok(Json(found))
}

async fn customer_orders_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
    require_admin(&state, &headers)?;
    let orders = admin::customer_orders(&state.store, &CustomerId(id)).await?;
    Ok(Json(orders))
}

async fn admin_orders_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.store.list_orders(query.status).await?))
}

async fn admin_summary_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
) -> Result<Json<DashboardSummary>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(admin::dashboard_summary(&state.store).await?))
}

async fn admin_status_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Order>, ApiError> {
    require_admin(&state, &headers)?;
    let order = admin::transition_order(&state.store, &OrderId(id), body.status).await?;
    Ok(Json(order))
}

async fn admin_tracking_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TrackingBody>,
) -> Result<Json<Order>, ApiError> {
    require_admin(&state, &headers)?;
    let order = admin::attach_tracking_code(&state.store, &OrderId(id), &body.tracking_code).await?;
    Ok(Json(order))
}

async fn admin_event_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<NewShippingEvent>,
) -> Result<(StatusCode, Json<ShippingEvent>), ApiError> {
    require_admin(&state, &headers)?;
    let event = admin::record_shipping_event(&state.store, &OrderId(id), body).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn admin_settings_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
) -> Result<Json<ShippingSettings>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(admin::shipping_settings(&state.store).await?))
}

async fn admin_save_settings_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Json(body): Json<ShippingSettings>,
) -> Result<Json<ShippingSettings>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(admin::save_shipping_settings(&state.store, body).await?))
}

async fn admin_create_product_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    require_admin(&state, &headers)?;
    let product = admin::save_product(&state.store, None, draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn admin_update_product_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, ApiError> {
    require_admin(&state, &headers)?;
    let product = admin::save_product(&state.store, Some(&ProductId(id)), draft).await?;
    Ok(Json(product))
}

async fn admin_delete_product_handler<S: Catalog + OrderStore + SettingsStore>(
    State(state): Shared<S>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &headers)?;
    state.store.delete_product(&ProductId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
