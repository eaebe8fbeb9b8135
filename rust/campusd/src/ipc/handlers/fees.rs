use crate::binder::ResourceKey;
use crate::dispatch::{ActionSpec, ListPatch, Verb};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, get_opt_str, get_required_str, input_value, load_list,
    patch_lists, reply, require_confirm, require_school, run_action, snapshot_rows,
    table_response, to_json, typed_rows, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::fees::{FeeStructure, FeeStructureInput};
use crate::models::round_money;
use crate::table::{TableSpec, ALL};
use serde_json::json;

const STRUCTURES: &str = "fees.structures";

const STRUCTURE_TABLE: TableSpec = TableSpec {
    search_fields: &["name", "academic_year"],
};

fn with_total(fee: &FeeStructure) -> Result<serde_json::Value, HandlerErr> {
    let mut row = to_json(fee)?;
    row["total"] = json!(fee.total());
    Ok(row)
}

fn structures_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = state.context.school_id.clone();
    let year = get_opt_str(params, "academicYear").unwrap_or_else(|| ALL.to_string());
    let key = ResourceKey::from_parts(&[Some(STRUCTURES), school.as_deref(), Some(year.as_str())]);
    let snap = load_list(state, key.as_ref(), params, || {
        let mut query = vec![("school_id", school.as_deref().unwrap_or_default())];
        if year != ALL {
            query.push(("academic_year", year.as_str()));
        }
        fetch_typed::<FeeStructure>(&state.api, "/api/fee-structures", &query)
    });
    let fees: Vec<FeeStructure> = typed_rows(&snapshot_rows(&snap))?;
    let mut out = table_response(state, STRUCTURES, &STRUCTURE_TABLE, &snap, params);
    // totals are derived per page row and for the whole list
    if let Some(rows) = out["rows"].as_array_mut() {
        for row in rows.iter_mut() {
            let total = serde_json::from_value::<FeeStructure>(row.clone()).map(|f| f.total()).unwrap_or(0.0);
            row["total"] = json!(total);
        }
    }
    out["grandTotal"] = json!(round_money(fees.iter().map(FeeStructure::total).sum()));
    Ok(out)
}

fn structure_body(input: &FeeStructureInput, school: &str) -> Result<serde_json::Value, HandlerErr> {
    let mut body = to_json(input)?;
    body["school_id"] = json!(school);
    Ok(body)
}

fn structures_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = require_school(state)?;
    let input = input_value(params);
    let fee: FeeStructureInput = decode(&input)?;
    let body = structure_body(&fee, &school)?;
    let spec = ActionSpec::new("fees.structures.create", "fee structure", Verb::Create);
    let (created, toast) = run_action(state, &spec, &input, || fee.validate(), |api| {
        api.post::<FeeStructure, _>("/api/fee-structures", &body)
    })?;
    let row = to_json(&created)?;
    let insert = ListPatch::Insert(row);
    patch_lists(state, &[STRUCTURES, school.as_str(), ALL], &insert);
    patch_lists(state, &[STRUCTURES, school.as_str(), created.academic_year.as_str()], &insert);
    Ok(action_result(with_total(&created)?, &toast))
}

fn structures_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = require_school(state)?;
    let id = get_required_str(params, "id")?;
    let input = input_value(params);
    let fee: FeeStructureInput = decode(&input)?;
    let body = structure_body(&fee, &school)?;
    let spec = ActionSpec::new(format!("fees.structures.update:{id}"), "fee structure", Verb::Update);
    let (updated, toast) = run_action(state, &spec, &input, || fee.validate(), |api| {
        api.put::<FeeStructure, _>(&format!("/api/fee-structures/{id}"), &body)
    })?;
    patch_lists(state, &[STRUCTURES, school.as_str()], &ListPatch::Replace(to_json(&updated)?));
    Ok(action_result(with_total(&updated)?, &toast))
}

fn structures_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = require_school(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(params, "fee structure")?;
    let spec = ActionSpec::new(format!("fees.structures.delete:{id}"), "fee structure", Verb::Delete);
    let ((), toast) = run_action(state, &spec, &json!({ "id": id }), || Ok(()), |api| {
        api.delete(&format!("/api/fee-structures/{id}"))
    })?;
    patch_lists(state, &[STRUCTURES, school.as_str()], &ListPatch::Remove(id.clone()));
    Ok(action_result(json!({ "id": id }), &toast))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "fees.structures.list" => structures_list(state, &req.params),
        "fees.structures.create" => structures_create(state, &req.params),
        "fees.structures.update" => structures_update(state, &req.params),
        "fees.structures.delete" => structures_delete(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
