use crate::binder::ResourceKey;
use crate::dispatch::{ActionSpec, ListPatch, Verb};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, find_row, get_opt_str, get_required_str, input_value,
    list_response, load_list, patch_lists, reply, require_campus, require_confirm, run_action,
    table_response, to_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::academics::{GradeLevel, Section, SectionInput};
use crate::table::{TableSpec, ALL};
use serde_json::json;

const GRADE_LEVELS: &str = "gradeLevels";
const SECTIONS: &str = "sections";

const SECTION_TABLE: TableSpec = TableSpec {
    search_fields: &["name"],
};

fn grade_levels_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = state.context.campus_id.clone();
    let key = ResourceKey::from_parts(&[Some(GRADE_LEVELS), campus.as_deref()]);
    let snap = load_list(state, key.as_ref(), params, || {
        let campus = campus.as_deref().unwrap_or_default();
        fetch_typed::<GradeLevel>(&state.api, "/api/grade-levels", &[("campus_id", campus)])
    });
    Ok(list_response(&snap))
}

fn sections_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = state.context.campus_id.clone();
    let grade = get_opt_str(params, "gradeLevelId").unwrap_or_else(|| ALL.to_string());
    let key = ResourceKey::from_parts(&[Some(SECTIONS), campus.as_deref(), Some(grade.as_str())]);
    let snap = load_list(state, key.as_ref(), params, || {
        let mut query = vec![("campus_id", campus.as_deref().unwrap_or_default())];
        if grade != ALL {
            query.push(("grade_level_id", grade.as_str()));
        }
        fetch_typed::<Section>(&state.api, "/api/sections", &query)
    });
    Ok(table_response(state, SECTIONS, &SECTION_TABLE, &snap, params))
}

fn section_body(input: &SectionInput, campus: &str) -> Result<serde_json::Value, HandlerErr> {
    let mut body = to_json(input)?;
    body["campus_id"] = json!(campus);
    Ok(body)
}

fn sections_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let input = input_value(params);
    let section: SectionInput = decode(&input)?;
    let body = section_body(&section, &campus)?;
    let spec = ActionSpec::new("sections.create", "section", Verb::Create);
    let (created, toast) = run_action(state, &spec, &input, || section.validate(None), |api| {
        api.post::<Section, _>("/api/sections", &body)
    })?;
    let row = to_json(&created)?;
    let insert = ListPatch::Insert(row.clone());
    patch_lists(state, &[SECTIONS, campus.as_str(), ALL], &insert);
    patch_lists(state, &[SECTIONS, campus.as_str(), created.grade_level_id.as_str()], &insert);
    Ok(action_result(row, &toast))
}

fn sections_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    let input = input_value(params);
    let section: SectionInput = decode(&input)?;
    let body = section_body(&section, &campus)?;
    let strength = find_row(state, SECTIONS, &id)
        .and_then(|r| serde_json::from_value::<Section>(r).ok())
        .map(|s| s.current_strength);
    let spec = ActionSpec::new(format!("sections.update:{id}"), "section", Verb::Update);
    let (updated, toast) = run_action(state, &spec, &input, || section.validate(strength), |api| {
        api.put::<Section, _>(&format!("/api/sections/{id}"), &body)
    })?;
    let row = to_json(&updated)?;
    patch_lists(state, &[SECTIONS, campus.as_str()], &ListPatch::Replace(row.clone()));
    Ok(action_result(row, &toast))
}

fn sections_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(params, "section")?;
    let spec = ActionSpec::new(format!("sections.delete:{id}"), "section", Verb::Delete);
    let ((), toast) = run_action(state, &spec, &json!({ "id": id }), || Ok(()), |api| {
        api.delete(&format!("/api/sections/{id}"))
    })?;
    patch_lists(state, &[SECTIONS, campus.as_str()], &ListPatch::Remove(id.clone()));
    Ok(action_result(json!({ "id": id }), &toast))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "gradeLevels.list" => grade_levels_list(state, &req.params),
        "sections.list" => sections_list(state, &req.params),
        "sections.create" => sections_create(state, &req.params),
        "sections.update" => sections_update(state, &req.params),
        "sections.delete" => sections_delete(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
