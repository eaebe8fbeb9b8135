use crate::api::{supabase, ApiError};
use crate::binder::ResourceKey;
use crate::dispatch::{ActionSpec, ListPatch, Verb};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, get_opt_str, get_required_str, input_value, load_list,
    patch_lists, reply, require_campus, require_confirm, run_action, table_response, to_json,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::schools::{School, SchoolInput};
use crate::table::TableSpec;
use serde_json::json;
use std::path::Path;

const SCHOOLS: &str = "schools";

const SCHOOL_TABLE: TableSpec = TableSpec {
    search_fields: &["name", "code", "email", "address"],
};

fn schools_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = state.context.campus_id.clone();
    let key = ResourceKey::from_parts(&[Some(SCHOOLS), campus.as_deref()]);
    let snap = load_list(state, key.as_ref(), params, || {
        let campus = campus.as_deref().unwrap_or_default();
        fetch_typed::<School>(&state.api, "/api/schools", &[("campus_id", campus)])
    });
    Ok(table_response(state, SCHOOLS, &SCHOOL_TABLE, &snap, params))
}

/// A logo picked in the form, read up front so a bad path fails before
/// anything is sent.
struct LogoFile {
    name: String,
    bytes: Vec<u8>,
}

fn read_logo(params: &serde_json::Value) -> Result<Option<LogoFile>, HandlerErr> {
    let Some(path) = get_opt_str(params, "logoPath") else {
        return Ok(None);
    };
    let p = Path::new(&path);
    let bytes = std::fs::read(p).map_err(|e| {
        HandlerErr::new("io_failed", format!("failed to read logo: {e}")).with_details(json!({ "path": path }))
    })?;
    let name = p
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "logo".to_string());
    Ok(Some(LogoFile { name, bytes }))
}

enum SaveMode {
    Create,
    Update(String),
}

/// Create and update share one flow: validate, upload the logo if one was
/// picked, then save the school with the uploaded logo's URL.
fn save_school(state: &mut AppState, params: &serde_json::Value, mode: SaveMode) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let input = input_value(params);
    let school: SchoolInput = decode(&input)?;
    let logo = read_logo(params)?;
    let cfg = state.config.clone();
    let spec = match &mode {
        SaveMode::Create => ActionSpec::new("schools.create", "school", Verb::Create),
        SaveMode::Update(id) => ActionSpec::new(format!("schools.update:{id}"), "school", Verb::Update),
    };
    let (saved, toast) = run_action(state, &spec, &input, || school.validate(), |api| {
        let mut body = school.clone();
        if let Some(logo) = logo {
            body.logo_url = Some(supabase::upload_object(api, &cfg, &cfg.logo_bucket, &logo.name, logo.bytes)?);
        }
        let mut body = serde_json::to_value(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        body["campus_id"] = json!(campus);
        match &mode {
            SaveMode::Create => api.post::<School, _>("/api/schools", &body),
            SaveMode::Update(id) => api.put::<School, _>(&format!("/api/schools/{id}"), &body),
        }
    })?;
    let row = to_json(&saved)?;
    let patch = match mode {
        SaveMode::Create => ListPatch::Insert(row.clone()),
        SaveMode::Update(_) => ListPatch::Replace(row.clone()),
    };
    patch_lists(state, &[SCHOOLS, campus.as_str()], &patch);
    Ok(action_result(row, &toast))
}

fn schools_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(params, "school")?;
    let spec = ActionSpec::new(format!("schools.delete:{id}"), "school", Verb::Delete);
    let ((), toast) = run_action(state, &spec, &json!({ "id": id }), || Ok(()), |api| {
        api.delete(&format!("/api/schools/{id}"))
    })?;
    patch_lists(state, &[SCHOOLS, campus.as_str()], &ListPatch::Remove(id.clone()));
    Ok(action_result(json!({ "id": id }), &toast))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "schools.list" => schools_list(state, &req.params),
        "schools.create" => save_school(state, &req.params, SaveMode::Create),
        "schools.update" => match get_required_str(&req.params, "id") {
            Ok(id) => save_school(state, &req.params, SaveMode::Update(id)),
            Err(e) => Err(e),
        },
        "schools.delete" => schools_delete(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
