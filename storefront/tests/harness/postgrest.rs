//! In-process stand-in for the hosted backend's PostgREST interface.
//!
//! Supports the subset the store uses: `eq.` filters, `order=<col>.desc`,
//! `limit`, `on_conflict` inserts that skip duplicates, and `Prefer:
//! return=representation`. Stock updates can be made to lose a number of
//! races, and writes can be switched to answer `204` with no body.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use pratas_storefront::supabase::SupabaseStore;
use serde_json::{json, Value};

use super::spawn;

pub const SERVICE_KEY: &str = "service-test-key";

const RESERVED: [&str; 4] = ["select", "order", "limit", "on_conflict"];

#[derive(Default)]
pub struct MockPostgrest {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    next_id: AtomicUsize,
    /// Stock updates still to be answered as if another writer won.
    lost_races: AtomicUsize,
    /// Stock update attempts seen, including lost ones.
    pub stock_updates: AtomicUsize,
    /// Answer writes with `204 No Content`.
    minimal: AtomicBool,
}

impl MockPostgrest {
    /// Serve on an ephemeral port; returns the mock and a store pointed at it.
    pub async fn start() -> (Arc<Self>, SupabaseStore) {
        let (mock, url) = Self::serve().await;
        let store = SupabaseStore::new(reqwest::Client::new(), &url, SERVICE_KEY);
        (mock, store)
    }

    /// Serve on an ephemeral port; returns the mock and its base URL.
    pub async fn serve() -> (Arc<Self>, String) {
        let mock = Arc::new(Self::default());
        let url = spawn(
            Router::new()
                .route("/rest/v1/{table}", any(handle))
                .with_state(mock.clone()),
        )
        .await;
        (mock, url)
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn lose_stock_races(&self, times: usize) {
        self.lost_races.store(times, Ordering::SeqCst);
    }

    pub fn answer_minimal(&self) {
        self.minimal.store(true, Ordering::SeqCst);
    }

    pub fn stock_of(&self, product: &str) -> Option<u64> {
        self.rows("products")
            .iter()
            .find(|row| row["id"] == product)
            .and_then(|row| row["stock"].as_u64())
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn filters(params: &[(String, String)]) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(key, _)| !RESERVED.contains(&key.as_str()))
        .filter_map(|(key, value)| Some((key.clone(), value.strip_prefix("eq.")?.to_string())))
        .collect()
}

/// Timestamps compare as instants, anything else as text.
fn newest_first(a: &Value, b: &Value) -> std::cmp::Ordering {
    let instant = |v: &Value| chrono::DateTime::parse_from_rfc3339(&text(v)).ok();
    match (instant(a), instant(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => text(a).cmp(&text(b)),
    }
}

fn matches(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(key, value)| text(&row[key]) == *value)
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params.iter().find(|(key, _)| key == name).map(|(_, v)| v.as_str())
}

fn rows_of(body: &str) -> Vec<Value> {
    match serde_json::from_str(body) {
        Ok(Value::Array(rows)) => rows,
        Ok(row @ Value::Object(_)) => vec![row],
        _ => Vec::new(),
    }
}

async fn handle(
    State(db): State<Arc<MockPostgrest>>,
    Path(table): Path<String>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    body: String,
) -> Response {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(SERVICE_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid API key" })))
            .into_response();
    }
    let filters = filters(&params);
    let write = method != Method::GET;
    let mut tables = db.tables.lock().unwrap();
    let rows = tables.entry(table.clone()).or_default();

    let (status, result) = match method {
        Method::GET => {
            let mut found: Vec<Value> =
                rows.iter().filter(|row| matches(row, &filters)).cloned().collect();
            if let Some(column) = param(&params, "order").and_then(|o| o.strip_suffix(".desc")) {
                found.sort_by(|a, b| newest_first(&b[column], &a[column]));
            }
            if let Some(limit) = param(&params, "limit").and_then(|l| l.parse().ok()) {
                found.truncate(limit);
            }
            (StatusCode::OK, found)
        }
        Method::POST => {
            let unique = param(&params, "on_conflict");
            let mut created = Vec::new();
            for mut row in rows_of(&body) {
                let taken = unique.is_some_and(|column| {
                    rows.iter().any(|existing| existing[column] == row[column])
                });
                if taken {
                    continue;
                }
                if row.get("id").is_none() {
                    let n = db.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                    row["id"] = json!(format!("{table}-{n}"));
                }
                rows.push(row.clone());
                created.push(row);
            }
            (StatusCode::CREATED, created)
        }
        Method::PATCH => {
            let racing = table == "products" && filters.iter().any(|(key, _)| key == "stock");
            if racing {
                db.stock_updates.fetch_add(1, Ordering::SeqCst);
            }
            let lost = racing
                && db
                    .lost_races
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            let mut updated = Vec::new();
            if !lost {
                let changes = rows_of(&body).into_iter().next().unwrap_or_default();
                for row in rows.iter_mut().filter(|row| matches(row, &filters)) {
                    if let (Some(row), Some(changes)) = (row.as_object_mut(), changes.as_object()) {
                        row.extend(changes.clone());
                    }
                    updated.push(row.clone());
                }
            }
            (StatusCode::OK, updated)
        }
        Method::DELETE => {
            let (removed, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|row| matches(row, &filters));
            *rows = kept;
            (StatusCode::OK, removed)
        }
        _ => (StatusCode::METHOD_NOT_ALLOWED, Vec::new()),
    };

    if write && db.minimal.load(Ordering::SeqCst) {
        return StatusCode::NO_CONTENT.into_response();
    }
    (status, Json(Value::Array(result))).into_response()
}
