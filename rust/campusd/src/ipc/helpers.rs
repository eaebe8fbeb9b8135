//! Plumbing shared by the handler families: parameter parsing, tenant and
//! confirmation guards, binder-backed list reads and dispatcher-backed
//! writes.

use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::api::{ApiClient, ApiError};
use crate::binder::{ResourceKey, Snapshot};
use crate::db;
use crate::dispatch::{record_id, ActionSpec, DispatchOutcome, ListPatch, Toast};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{page_size_key, AppState};
use crate::models::normalize_rows;
use crate::table::{self, TableSpec};
use crate::validate::FieldErrors;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ApiError> for HandlerErr {
    fn from(e: ApiError) -> Self {
        let message = e
            .user_message()
            .map(|s| s.to_string())
            .unwrap_or_else(|| e.to_string());
        Self {
            code: "api_error",
            message,
            details: Some(json!({ "status": e.status() })),
        }
    }
}

pub fn reply(id: &str, res: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match res {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    get_opt_str(params, key).ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

/// String or integer param, trimmed; blank counts as missing.
pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    match params.get(key)? {
        serde_json::Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn get_bool(params: &serde_json::Value, key: &str) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

pub fn get_opt_f64(params: &serde_json::Value, key: &str) -> Option<f64> {
    match params.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn get_usize(params: &serde_json::Value, key: &str) -> Result<usize, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

/// Form values are sent under `params.input`.
pub fn input_value(params: &serde_json::Value) -> serde_json::Value {
    params.get("input").cloned().unwrap_or_else(|| json!({}))
}

pub fn decode<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T, HandlerErr> {
    serde_json::from_value(value.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid input: {e}")))
}

pub fn require_campus(state: &AppState) -> Result<String, HandlerErr> {
    state
        .context
        .campus_id
        .clone()
        .ok_or_else(|| HandlerErr::new("no_context", "select a campus first"))
}

pub fn require_school(state: &AppState) -> Result<String, HandlerErr> {
    state
        .context
        .school_id
        .clone()
        .ok_or_else(|| HandlerErr::new("no_context", "select a school first"))
}

/// Destructive actions must be confirmed by the caller.
pub fn require_confirm(params: &serde_json::Value, subject: &str) -> Result<(), HandlerErr> {
    if get_bool(params, "confirm") {
        return Ok(());
    }
    Err(HandlerErr::new(
        "confirmation_required",
        format!("Are you sure you want to delete this {subject}?"),
    ))
}

/// Fetches a list and decodes every row as `T`; one malformed row fails
/// the whole fetch.
pub fn fetch_typed<T>(api: &ApiClient, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value, ApiError>
where
    T: DeserializeOwned + Serialize,
{
    let rows: Vec<serde_json::Value> = api.get(path, query)?;
    normalize_rows::<T>(rows).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Binder read for a list view; `refresh: true` revalidates.
pub fn load_list<F>(
    state: &AppState,
    key: Option<&ResourceKey>,
    params: &serde_json::Value,
    fetch: F,
) -> Snapshot<serde_json::Value>
where
    F: FnOnce() -> Result<serde_json::Value, ApiError>,
{
    if get_bool(params, "refresh") {
        state.binder.mutate(key, fetch)
    } else {
        state.binder.load(key, fetch)
    }
}

pub fn snapshot_rows(snap: &Snapshot<serde_json::Value>) -> Vec<serde_json::Value> {
    snap.data
        .as_ref()
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Plain list response for views without a table.
pub fn list_response(snap: &Snapshot<serde_json::Value>) -> serde_json::Value {
    json!({
        "rows": snapshot_rows(snap),
        "isLoading": snap.is_loading,
        "error": snap.error,
        "skipped": snap.skipped,
    })
}

fn remember_page_size(state: &AppState, table_id: &str, page_size: usize) {
    let Some(conn) = state.db.as_ref() else {
        return;
    };
    if let Err(e) = db::settings_set_json(conn, &page_size_key(table_id), &json!(page_size)) {
        warn!(table = table_id, error = %e, "failed to store page size");
    }
}

/// Applies search/filter/page params to the table's query state and returns
/// the visible page of the snapshot's rows.
pub fn table_response(
    state: &mut AppState,
    table_id: &str,
    spec: &TableSpec,
    snap: &Snapshot<serde_json::Value>,
    params: &serde_json::Value,
) -> serde_json::Value {
    let query = {
        let q = state.table(table_id);
        q.apply_params(params);
        q.clone()
    };
    if params.get("pageSize").is_some() {
        remember_page_size(state, table_id, query.page_size());
    }
    let rows = snapshot_rows(snap);
    let view = table::view(&rows, spec, &query);
    json!({
        "rows": view.rows,
        "total": view.total,
        "page": view.page,
        "pageSize": view.page_size,
        "pageCount": view.page_count,
        "search": query.search(),
        "isLoading": snap.is_loading,
        "error": snap.error,
        "skipped": snap.skipped,
    })
}

/// The rows a table currently matches (all pages), for export.
pub fn table_matches(
    state: &mut AppState,
    table_id: &str,
    spec: &TableSpec,
    rows: &[serde_json::Value],
    params: &serde_json::Value,
) -> Vec<serde_json::Value> {
    let q = state.table(table_id);
    q.apply_params(params);
    table::filter_rows(rows, spec, q).into_iter().cloned().collect()
}

/// Splices, by id, every cached list whose key starts with `prefix`
/// (resource name, then tenant and filter parts).
pub fn patch_lists(state: &AppState, prefix: &[&str], patch: &ListPatch) -> usize {
    let mut n = 0;
    for key in state.binder.keys() {
        let parts = key.parts();
        let hit = parts.len() >= prefix.len() && prefix.iter().zip(parts).all(|(p, k)| *p == k.as_str());
        if hit && state.binder.patch(&key, |v| patch.apply(v)) {
            n += 1;
        }
    }
    n
}

/// Runs a write through the dispatcher and translates the outcome. The form
/// draft is named after the action and survives until a submission succeeds.
pub fn run_action<T, V, C>(
    state: &mut AppState,
    spec: &ActionSpec,
    input: &serde_json::Value,
    validate: V,
    call: C,
) -> Result<(T, Toast), HandlerErr>
where
    V: FnOnce() -> Result<(), FieldErrors>,
    C: FnOnce(&ApiClient) -> Result<T, ApiError>,
{
    let outcome = {
        let api = &state.api;
        state.dispatcher.dispatch(spec, validate, || call(api))
    };
    match outcome {
        DispatchOutcome::Completed { value, toast } => {
            state.forms.close(&spec.name);
            Ok((value, toast))
        }
        DispatchOutcome::Invalid { errors, toast } => {
            state.forms.keep(&spec.name, input.clone());
            Err(HandlerErr::new("validation_failed", toast.message.clone()).with_details(json!({
                "fieldErrors": errors.to_json(),
                "toast": toast,
                "closeModal": false,
            })))
        }
        DispatchOutcome::Failed { error, toast } => {
            state.forms.keep(&spec.name, input.clone());
            Err(HandlerErr::new("api_error", toast.message.clone()).with_details(json!({
                "status": error.status(),
                "toast": toast,
                "closeModal": false,
            })))
        }
        DispatchOutcome::Busy => Err(HandlerErr::new(
            "busy",
            format!("{} is already in progress", spec.name),
        )),
    }
}

/// Looks a row up by id in any cached list of `resource`.
pub fn find_row(state: &AppState, resource: &str, id: &str) -> Option<serde_json::Value> {
    state
        .binder
        .keys()
        .into_iter()
        .filter(|k| k.resource() == resource)
        .filter_map(|k| state.binder.snapshot(Some(&k)).data)
        .find_map(|data| {
            data.as_array()?
                .iter()
                .find(|r| record_id(r).as_deref() == Some(id))
                .cloned()
        })
}

pub fn typed_rows<T: DeserializeOwned>(rows: &[serde_json::Value]) -> Result<Vec<T>, HandlerErr> {
    rows.iter()
        .map(|r| serde_json::from_value(r.clone()))
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| HandlerErr::new("api_error", format!("unexpected row shape: {e}")))
}

pub fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("api_error", e.to_string()))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn action_result(record: serde_json::Value, toast: &Toast) -> serde_json::Value {
    json!({
        "record": record,
        "toast": toast,
        "closeModal": true,
    })
}
