//! Local PostgREST stand-in for adapter tests.
//!
//! Serves `/rest/v1/:table` over a real socket and honours the subset of
//! PostgREST the record store speaks: `eq.`/`lte.` filters, `order`,
//! `limit`, `on_conflict` and the `Prefer: resolution=...` upsert modes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query as Params, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};

use super::client::PostgrestClient;

type Row = Map<String, Value>;
type Pairs = Vec<(String, String)>;

const CONTROL_PARAMS: [&str; 4] = ["select", "order", "limit", "on_conflict"];

#[derive(Clone, Default)]
pub struct Gateway {
    inner: Arc<Mutex<GatewayState>>,
}

#[derive(Default)]
struct GatewayState {
    tables: HashMap<String, Vec<Row>>,
    requests: Vec<String>,
    /// Row written by "another writer" just before the next insert lands.
    pending_race: Option<(String, Row)>,
}

impl Gateway {
    /// Bind an ephemeral port and return a client pointed at it.
    pub async fn start() -> (Self, PostgrestClient) {
        let gateway = Self::default();
        let router = Router::new()
            .route(
                "/rest/v1/:table",
                get(select_rows).post(insert_rows).patch(update_rows),
            )
            .with_state(gateway.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = PostgrestClient::new(format!("http://{}", addr), "service-key");
        (gateway, client)
    }

    fn state(&self) -> MutexGuard<'_, GatewayState> {
        self.inner.lock().unwrap()
    }

    pub fn seed(&self, table: &str, row: Value) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(into_row(row));
    }

    /// Insert `row` right before the next `POST` to `table` is applied.
    pub fn race_next_insert(&self, table: &str, row: Value) {
        self.state().pending_race = Some((table.to_string(), into_row(row)));
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// `"METHOD table"` for every request served, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        other => panic!("row must be a JSON object, got {}", other),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn param<'a>(params: &'a Pairs, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn matches(row: &Row, params: &Pairs) -> bool {
    params
        .iter()
        .filter(|(column, _)| !CONTROL_PARAMS.contains(&column.as_str()))
        .all(|(column, filter)| {
            let cell = row.get(column).map(cell_text);
            match filter.split_once('.') {
                Some(("eq", expected)) => cell.as_deref() == Some(expected),
                Some(("lte", bound)) => {
                    match (cell.and_then(|c| c.parse::<i64>().ok()), bound.parse::<i64>()) {
                        (Some(value), Ok(bound)) => value <= bound,
                        _ => false,
                    }
                }
                _ => false,
            }
        })
}

async fn select_rows(
    State(gateway): State<Gateway>,
    Path(table): Path<String>,
    Params(params): Params<Pairs>,
) -> Json<Value> {
    let mut state = gateway.state();
    state.requests.push(format!("GET {}", table));

    let mut rows: Vec<Row> = state
        .tables
        .get(&table)
        .map(|rows| rows.iter().filter(|r| matches(r, &params)).cloned().collect())
        .unwrap_or_default();

    if let Some(column) = param(&params, "order").and_then(|o| o.strip_suffix(".desc")) {
        rows.sort_by_key(|r| std::cmp::Reverse(r.get(column).map(cell_text)));
    }
    if let Some(limit) = param(&params, "limit").and_then(|l| l.parse::<usize>().ok()) {
        rows.truncate(limit);
    }

    Json(Value::Array(rows.into_iter().map(Value::Object).collect()))
}

async fn insert_rows(
    State(gateway): State<Gateway>,
    Path(table): Path<String>,
    Params(params): Params<Pairs>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let merge = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|p| p.contains("resolution=merge-duplicates"));
    let conflict = param(&params, "on_conflict").map(str::to_string);

    let mut state = gateway.state();
    state.requests.push(format!("POST {}", table));
    if let Some((race_table, row)) = state.pending_race.take() {
        if race_table == table {
            state.tables.entry(table.clone()).or_default().push(row);
        } else {
            state.pending_race = Some((race_table, row));
        }
    }

    let rows = state.tables.entry(table).or_default();
    let mut returned = Vec::new();
    for incoming in body.as_array().cloned().unwrap_or_default() {
        let incoming = into_row(incoming);
        let existing = conflict.as_ref().and_then(|column| {
            rows.iter()
                .position(|r| r.get(column) == incoming.get(column))
        });
        match existing {
            Some(index) if merge => {
                rows[index].extend(incoming);
                returned.push(Value::Object(rows[index].clone()));
            }
            Some(_) => {}
            None => {
                rows.push(incoming.clone());
                returned.push(Value::Object(incoming));
            }
        }
    }

    (StatusCode::CREATED, Json(Value::Array(returned)))
}

async fn update_rows(
    State(gateway): State<Gateway>,
    Path(table): Path<String>,
    Params(params): Params<Pairs>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let patch = into_row(body);
    let mut state = gateway.state();
    state.requests.push(format!("PATCH {}", table));

    let mut updated = Vec::new();
    for row in state.tables.entry(table).or_default().iter_mut() {
        if matches(row, &params) {
            row.extend(patch.clone());
            updated.push(Value::Object(row.clone()));
        }
    }

    Json(Value::Array(updated))
}
