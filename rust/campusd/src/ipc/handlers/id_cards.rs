use crate::binder::ResourceKey;
use crate::dispatch::{ActionSpec, ListPatch, Verb};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, find_row, get_bool, get_opt_str, get_required_str,
    input_value, list_response, load_list, patch_lists, reply, require_confirm, require_school,
    run_action, to_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::id_cards::{IdCardTemplate, IdCardTemplateInput};
use crate::models::schools::School;
use crate::models::students::Student;
use crate::render;
use serde_json::json;
use std::collections::HashMap;

const TEMPLATES: &str = "idCards.templates";

fn templates_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = state.context.school_id.clone();
    let key = ResourceKey::from_parts(&[Some(TEMPLATES), school.as_deref()]);
    let snap = load_list(state, key.as_ref(), params, || {
        let school = school.as_deref().unwrap_or_default();
        fetch_typed::<IdCardTemplate>(&state.api, "/api/id-card-templates", &[("school_id", school)])
    });
    Ok(list_response(&snap))
}

fn templates_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = require_school(state)?;
    let input = input_value(params);
    let template: IdCardTemplateInput = decode(&input)?;
    let mut body = to_json(&template)?;
    body["school_id"] = json!(school);
    let spec = ActionSpec::new("idCards.templates.create", "card template", Verb::Create);
    let (created, toast) = run_action(state, &spec, &input, || template.validate(), |api| {
        api.post::<IdCardTemplate, _>("/api/id-card-templates", &body)
    })?;
    let row = to_json(&created)?;
    patch_lists(state, &[TEMPLATES, school.as_str()], &ListPatch::Insert(row.clone()));
    Ok(action_result(row, &toast))
}

fn templates_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = require_school(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(params, "card template")?;
    let spec = ActionSpec::new(format!("idCards.templates.delete:{id}"), "card template", Verb::Delete);
    let ((), toast) = run_action(state, &spec, &json!({ "id": id }), || Ok(()), |api| {
        api.delete(&format!("/api/id-card-templates/{id}"))
    })?;
    patch_lists(state, &[TEMPLATES, school.as_str()], &ListPatch::Remove(id.clone()));
    Ok(action_result(json!({ "id": id }), &toast))
}

fn student_values(student: &Student) -> HashMap<String, String> {
    let mut values = HashMap::new();
    values.insert("student_name".to_string(), student.full_name());
    let optional = [
        ("admission_number", &student.admission_number),
        ("grade_level", &student.grade_level),
        ("section", &student.section),
        ("guardian_phone", &student.guardian_phone),
    ];
    for (k, v) in optional {
        if let Some(v) = v {
            values.insert(k.to_string(), v.clone());
        }
    }
    values
}

/// Renders a template for one student, or with sample values when no
/// student is picked. Explicit `values` win over both.
fn preview(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "templateId")?;
    let template: IdCardTemplate = match find_row(state, TEMPLATES, &id) {
        Some(row) => decode(&row)?,
        None => state.api.get(&format!("/api/id-card-templates/{id}"), &[])?,
    };
    let mut values = match get_opt_str(params, "studentId") {
        Some(sid) => {
            let row = find_row(state, "students", &sid)
                .ok_or_else(|| HandlerErr::new("not_found", format!("student {sid} is not loaded")))?;
            student_values(&decode(&row)?)
        }
        None => HashMap::from([
            ("student_name".to_string(), "Student Name".to_string()),
            ("admission_number".to_string(), "ADM-0001".to_string()),
        ]),
    };
    if let Some(extra) = params.get("values").and_then(|v| v.as_object()) {
        for (k, v) in extra {
            if let Some(s) = v.as_str() {
                values.insert(k.clone(), s.to_string());
            }
        }
    }
    let school: Option<School> = state
        .context
        .school_id
        .as_deref()
        .and_then(|sid| find_row(state, "schools", sid))
        .and_then(|r| serde_json::from_value(r).ok());
    let html = render::id_card_html(&template, school.as_ref(), &values);
    Ok(json!({
        "html": html,
        "print": get_bool(params, "print"),
        "template": template,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "idCards.templates.list" => templates_list(state, &req.params),
        "idCards.templates.create" => templates_create(state, &req.params),
        "idCards.templates.delete" => templates_delete(state, &req.params),
        "idCards.templates.preview" => preview(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
