use crate::binder::{ResourceKey, Snapshot};
use crate::dispatch::{id_text, ActionSpec, ListPatch, Verb};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, get_opt_str, get_required_str, get_usize, input_value,
    list_response, load_list, patch_lists, reply, require_campus, require_confirm, run_action,
    snapshot_rows, to_json, typed_rows, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::custom_fields::{CustomField, CustomFieldCategory, CustomFieldInput};
use crate::ordering::{FieldLayout, OrderError};
use crate::validate::Validator;
use serde_json::json;
use tracing::debug;

const CATEGORIES: &str = "customFields.categories";
const FIELDS: &str = "customFields.fields";

fn load_categories(state: &AppState, campus: Option<&str>, params: &serde_json::Value) -> Snapshot<serde_json::Value> {
    let key = ResourceKey::from_parts(&[Some(CATEGORIES), campus]);
    load_list(state, key.as_ref(), params, || {
        let campus = campus.unwrap_or_default();
        fetch_typed::<CustomFieldCategory>(&state.api, "/api/custom-fields/categories", &[("campus_id", campus)])
    })
}

fn load_fields(state: &AppState, campus: Option<&str>, params: &serde_json::Value) -> Snapshot<serde_json::Value> {
    let key = ResourceKey::from_parts(&[Some(FIELDS), campus]);
    load_list(state, key.as_ref(), params, || {
        let campus = campus.unwrap_or_default();
        fetch_typed::<CustomField>(&state.api, "/api/custom-fields", &[("campus_id", campus)])
    })
}

fn in_category(field: &serde_json::Value, category: &str) -> bool {
    field.get("category_id").and_then(id_text).as_deref() == Some(category)
}

fn categories_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = state.context.campus_id.clone();
    let snap = load_categories(state, campus.as_deref(), params);
    Ok(list_response(&snap))
}

fn categories_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let input = input_value(params);
    let name = get_opt_str(&input, "name");
    // new categories go to the end
    let key = ResourceKey::from_parts(&[Some(CATEGORIES), Some(campus.as_str())]);
    let order = snapshot_rows(&state.binder.snapshot(key.as_ref())).len();
    let body = json!({ "name": name, "campus_id": campus, "order": order });
    let spec = ActionSpec::new("customFields.categories.create", "category", Verb::Create);
    let (created, toast) = run_action(
        state,
        &spec,
        &input,
        || Validator::new().required("name", "Category name", name.as_deref()).finish(),
        |api| api.post::<CustomFieldCategory, _>("/api/custom-fields/categories", &body),
    )?;
    let row = to_json(&created)?;
    patch_lists(state, &[CATEGORIES, campus.as_str()], &ListPatch::Insert(row.clone()));
    state.layouts.remove(&campus);
    Ok(action_result(row, &toast))
}

fn categories_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(params, "category")?;
    let fields_key = ResourceKey::from_parts(&[Some(FIELDS), Some(campus.as_str())]);
    let in_use = snapshot_rows(&state.binder.snapshot(fields_key.as_ref()))
        .iter()
        .any(|f| in_category(f, &id));
    let spec = ActionSpec::new(format!("customFields.categories.delete:{id}"), "category", Verb::Delete);
    let ((), toast) = run_action(
        state,
        &spec,
        &json!({ "id": id }),
        || {
            Validator::new()
                .check(!in_use, "id", "Move or delete the fields in this category first")
                .finish()
        },
        |api| api.delete(&format!("/api/custom-fields/categories/{id}")),
    )?;
    patch_lists(state, &[CATEGORIES, campus.as_str()], &ListPatch::Remove(id.clone()));
    state.layouts.remove(&campus);
    Ok(action_result(json!({ "id": id }), &toast))
}

fn fields_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = state.context.campus_id.clone();
    let snap = load_fields(state, campus.as_deref(), params);
    let mut out = list_response(&snap);
    if let Some(category) = get_opt_str(params, "categoryId") {
        let rows: Vec<serde_json::Value> = snapshot_rows(&snap)
            .into_iter()
            .filter(|f| in_category(f, &category))
            .collect();
        out["rows"] = json!(rows);
    }
    Ok(out)
}

fn field_body(input: &CustomFieldInput, campus: &str) -> Result<serde_json::Value, HandlerErr> {
    let mut body = to_json(input)?;
    body["campus_id"] = json!(campus);
    Ok(body)
}

fn fields_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let input = input_value(params);
    let field: CustomFieldInput = decode(&input)?;
    let body = field_body(&field, &campus)?;
    let spec = ActionSpec::new("customFields.fields.create", "custom field", Verb::Create);
    let (created, toast) = run_action(state, &spec, &input, || field.validate(), |api| {
        api.post::<CustomField, _>("/api/custom-fields", &body)
    })?;
    let row = to_json(&created)?;
    patch_lists(state, &[FIELDS, campus.as_str()], &ListPatch::Insert(row.clone()));
    state.layouts.remove(&campus);
    Ok(action_result(row, &toast))
}

fn fields_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    let input = input_value(params);
    let field: CustomFieldInput = decode(&input)?;
    let body = field_body(&field, &campus)?;
    let spec = ActionSpec::new(format!("customFields.fields.update:{id}"), "custom field", Verb::Update);
    let (updated, toast) = run_action(state, &spec, &input, || field.validate(), |api| {
        api.put::<CustomField, _>(&format!("/api/custom-fields/{id}"), &body)
    })?;
    let row = to_json(&updated)?;
    patch_lists(state, &[FIELDS, campus.as_str()], &ListPatch::Replace(row.clone()));
    state.layouts.remove(&campus);
    Ok(action_result(row, &toast))
}

fn fields_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(params, "custom field")?;
    let spec = ActionSpec::new(format!("customFields.fields.delete:{id}"), "custom field", Verb::Delete);
    let ((), toast) = run_action(state, &spec, &json!({ "id": id }), || Ok(()), |api| {
        api.delete(&format!("/api/custom-fields/{id}"))
    })?;
    patch_lists(state, &[FIELDS, campus.as_str()], &ListPatch::Remove(id.clone()));
    state.layouts.remove(&campus);
    Ok(action_result(json!({ "id": id }), &toast))
}

fn snapshot_error(snap: &Snapshot<serde_json::Value>) -> Option<HandlerErr> {
    snap.error
        .as_ref()
        .filter(|_| snap.data.is_none())
        .map(|e| HandlerErr::new("api_error", e.clone()))
}

/// Builds the designer's working copy from the cached (or freshly fetched)
/// categories and fields. Reopening discards unsaved moves.
fn layout_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let categories = load_categories(state, Some(campus.as_str()), params);
    let fields = load_fields(state, Some(campus.as_str()), params);
    if let Some(e) = snapshot_error(&categories).or_else(|| snapshot_error(&fields)) {
        return Err(e);
    }
    let layout = FieldLayout::build(
        typed_rows(&snapshot_rows(&categories))?,
        typed_rows(&snapshot_rows(&fields))?,
    );
    let out = layout.to_json();
    state.layouts.insert(campus, layout);
    Ok(out)
}

fn open_layout<'a>(state: &'a mut AppState) -> Result<(String, &'a mut FieldLayout), HandlerErr> {
    let campus = require_campus(state)?;
    match state.layouts.get_mut(&campus) {
        Some(layout) => Ok((campus, layout)),
        None => Err(HandlerErr::new("bad_params", "field layout is not open")),
    }
}

fn order_err(e: OrderError) -> HandlerErr {
    HandlerErr::new("bad_params", e.to_string())
}

fn layout_move_category(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "categoryId")?;
    let to = get_usize(params, "to")?;
    let (_, layout) = open_layout(state)?;
    layout.move_category(&id, to).map_err(order_err)?;
    Ok(layout.to_json())
}

fn layout_move_field(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let field_id = get_required_str(params, "fieldId")?;
    let category_id = get_required_str(params, "categoryId")?;
    let to = get_usize(params, "to")?;
    let (_, layout) = open_layout(state)?;
    layout.move_field(&field_id, &category_id, to).map_err(order_err)?;
    Ok(layout.to_json())
}

fn layout_commit(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (campus, layout) = open_layout(state)?;
    if !layout.is_dirty() {
        return Ok(json!({ "saved": false, "layout": layout.to_json() }));
    }
    let payload = layout.commit_payload();
    let body = to_json(&payload)?;
    let spec = ActionSpec::new("customFields.layout.commit", "field order", Verb::Custom("save"))
        .success("Field order saved");
    let (_, toast) = run_action(state, &spec, params, || Ok(()), |api| {
        api.put::<serde_json::Value, _>("/api/custom-fields/order", &body)
    })?;
    let dropped = state.binder.invalidate_resource(CATEGORIES) + state.binder.invalidate_resource(FIELDS);
    debug!(dropped, fields = payload.fields.len(), "field order saved");
    let layout = match state.layouts.get_mut(&campus) {
        Some(layout) => {
            layout.mark_clean();
            layout.to_json()
        }
        None => serde_json::Value::Null,
    };
    let mut out = action_result(json!({ "saved": true, "order": body }), &toast);
    out["layout"] = layout;
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "customFields.categories.list" => categories_list(state, &req.params),
        "customFields.categories.create" => categories_create(state, &req.params),
        "customFields.categories.delete" => categories_delete(state, &req.params),
        "customFields.fields.list" => fields_list(state, &req.params),
        "customFields.fields.create" => fields_create(state, &req.params),
        "customFields.fields.update" => fields_update(state, &req.params),
        "customFields.fields.delete" => fields_delete(state, &req.params),
        "customFields.layout.open" => layout_open(state, &req.params),
        "customFields.layout.moveCategory" => layout_move_category(state, &req.params),
        "customFields.layout.moveField" => layout_move_field(state, &req.params),
        "customFields.layout.commit" => layout_commit(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
