use crate::api::supabase;
use crate::binder::ResourceKey;
use crate::dates::{DateRangeSelect, DateSelect};
use crate::db;
use crate::dispatch::{ActionSpec, Verb};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_opt_str, get_required_str, reply, run_action, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request, TenantContext};
use crate::validate::Validator;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

const CONTEXT_KEY: &str = "context";
const TOKEN_KEY: &str = "token";
const ROLE_KEY: &str = "role";

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "apiUrl": state.api.base_url(),
            "signedIn": state.api.token().is_some(),
        }),
    )
}

/// Opens the profile store in `path` and restores the session and tenant
/// selection saved there.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    let conn = db::open_db(&path)?;
    let token = db::session_get(&conn, TOKEN_KEY)?;
    let role = db::session_get(&conn, ROLE_KEY)?;
    let saved: TenantContext = db::settings_get_json(&conn, CONTEXT_KEY)?
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    state.api.set_token(token);
    state.context = TenantContext { role, ..saved };
    state.tables.clear();
    state.db = Some(conn);
    state.workspace = Some(path);
    info!(workspace = ?state.workspace, signed_in = state.api.token().is_some(), "workspace opened");
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, path.clone()) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "context": state.context,
                "signedIn": state.api.token().is_some(),
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn save_context(state: &AppState) -> Result<(), HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(());
    };
    let saved = json!({
        "campusId": state.context.campus_id,
        "schoolId": state.context.school_id,
    });
    db::settings_set_json(conn, CONTEXT_KEY, &saved)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn context_json(state: &AppState) -> serde_json::Value {
    json!({
        "context": state.context,
        "signedIn": state.api.token().is_some(),
    })
}

fn handle_context_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, context_json(state))
}

/// A school belongs to one campus, so switching campus drops the school.
fn set_campus(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = get_opt_str(params, "campusId");
    if campus != state.context.campus_id {
        state.context.school_id = None;
    }
    state.context.campus_id = campus;
    save_context(state)?;
    Ok(context_json(state))
}

fn set_school(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    state.context.school_id = get_opt_str(params, "schoolId");
    save_context(state)?;
    Ok(context_json(state))
}

fn store_session(state: &mut AppState, token: Option<String>, role: Option<String>) -> Result<(), HandlerErr> {
    state.api.set_token(token);
    state.context.role = role;
    let Some(conn) = state.db.as_ref() else {
        return Ok(());
    };
    let mut res = db::session_clear(conn).map(|_| ());
    if let Some(t) = state.api.token() {
        res = res.and_then(|_| db::session_set(conn, TOKEN_KEY, t));
    }
    if let Some(r) = state.context.role.as_deref() {
        res = res.and_then(|_| db::session_set(conn, ROLE_KEY, r));
    }
    res.map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn session_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let token = get_required_str(params, "token")?;
    let role = get_opt_str(params, "role");
    store_session(state, Some(token), role)?;
    Ok(context_json(state))
}

fn session_clear(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    store_session(state, None, None)?;
    let mut dropped = 0;
    for key in state.binder.keys() {
        dropped += state.binder.invalidate_resource(key.resource());
    }
    info!(dropped, "signed out");
    Ok(context_json(state))
}

fn sign_in(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let email = get_opt_str(params, "email");
    let password = params.get("password").and_then(|v| v.as_str()).map(str::to_string);
    let input = json!({ "email": email });
    let cfg = state.config.clone();
    let spec = ActionSpec::new("auth.signIn", "account", Verb::Custom("sign in to")).success("Signed in");
    let (session, toast) = run_action(
        state,
        &spec,
        &input,
        || {
            Validator::new()
                .required("email", "Email", email.as_deref())
                .required("password", "Password", password.as_deref())
                .finish()
        },
        |api| {
            supabase::sign_in_with_password(
                api,
                &cfg,
                email.as_deref().unwrap_or_default(),
                password.as_deref().unwrap_or_default(),
            )
        },
    )?;
    let role = session.user.as_ref().and_then(|u| u.role()).map(str::to_string);
    let user = session.user.as_ref().map(|u| json!({ "id": u.id, "email": u.email }));
    let expires_at = session
        .expires_at(chrono::Utc::now())
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    store_session(state, Some(session.access_token), role)?;
    let mut out = context_json(state);
    out["user"] = user.unwrap_or(serde_json::Value::Null);
    out["expiresAt"] = json!(expires_at);
    out["toast"] = json!(toast);
    Ok(out)
}

fn handle_toasts_drain(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "toasts": state.dispatcher.drain_toasts() }))
}

fn handle_forms_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let form_id = match get_required_str(&req.params, "formId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    ok(
        &req.id,
        json!({
            "formId": form_id,
            "draft": state.forms.get(&form_id),
            "submitting": state.dispatcher.is_submitting(&form_id),
        }),
    )
}

/// Applies year, then month, then day changes to a picked date. Month and
/// year changes clamp the day to the new month's length.
fn dates_adjust(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let bad = |e: crate::dates::DateError| HandlerErr::new("bad_params", e.to_string());
    let mut date = match params.get("date") {
        Some(v) => DateSelect::from_json(v).map_err(bad)?,
        None => return Err(HandlerErr::new("bad_params", "missing date")),
    };
    let part = |k: &str| params.get(k).and_then(|v| v.as_i64());
    date.adjust(part("year"), part("month"), part("day")).map_err(bad)?;
    Ok(date.to_json())
}

fn dates_range(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let range = DateRangeSelect::from_params(params).map_err(|e| {
        HandlerErr::new("validation_failed", e.to_string())
            .with_details(json!({ "fieldErrors": { "end": e.to_string() } }))
    })?;
    Ok(json!({ "start": range.start.to_json(), "end": range.end.to_json() }))
}

fn resource_peek(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let resource = get_required_str(params, "resource")?;
    let parts: Vec<Option<String>> = params
        .get("parts")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .map(|p| match p {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let mut all: Vec<Option<&str>> = vec![Some(resource.as_str())];
    all.extend(parts.iter().map(|p| p.as_deref()));
    let key = ResourceKey::from_parts(&all);
    let snap = state.binder.snapshot(key.as_ref());
    let keys: Vec<String> = state
        .binder
        .keys()
        .iter()
        .filter(|k| k.resource() == resource)
        .map(|k| k.to_string())
        .collect();
    let mut out = to_json(&snap)?;
    out["key"] = json!(key.map(|k| k.to_string()));
    out["cachedKeys"] = json!(keys);
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "health" => return Some(handle_health(state, req)),
        "workspace.select" => return Some(handle_workspace_select(state, req)),
        "context.get" => return Some(handle_context_get(state, req)),
        "toasts.drain" => return Some(handle_toasts_drain(state, req)),
        "forms.get" => return Some(handle_forms_get(state, req)),
        "context.setCampus" => set_campus(state, &req.params),
        "context.setSchool" => set_school(state, &req.params),
        "session.set" => session_set(state, &req.params),
        "session.clear" => session_clear(state),
        "auth.signIn" => sign_in(state, &req.params),
        "dates.adjust" => dates_adjust(&req.params),
        "dates.range" => dates_range(&req.params),
        "resource.peek" => resource_peek(state, &req.params),
        _ => return None,
    };
    if let Err(e) = &res {
        if e.code == "db_query_failed" {
            warn!(method = %req.method, error = %e.message, "profile store write failed");
        }
    }
    Some(reply(&req.id, res))
}
