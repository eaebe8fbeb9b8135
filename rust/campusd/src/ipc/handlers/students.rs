use crate::binder::ResourceKey;
use crate::export;
use crate::ipc::helpers::{
    fetch_typed, get_opt_str, load_list, reply, snapshot_rows, table_matches, table_response,
    today, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::students::{Student, EXPORT_COLUMNS};
use crate::table::TableSpec;
use serde_json::json;
use std::path::PathBuf;

const STUDENTS: &str = "students";

const STUDENT_TABLE: TableSpec = TableSpec {
    search_fields: &["first_name", "last_name", "admission_number", "guardian_name"],
};

fn load_students(state: &AppState, params: &serde_json::Value) -> crate::binder::Snapshot<serde_json::Value> {
    let school = state.context.school_id.clone();
    let key = ResourceKey::from_parts(&[Some(STUDENTS), school.as_deref()]);
    load_list(state, key.as_ref(), params, || {
        let school = school.as_deref().unwrap_or_default();
        fetch_typed::<Student>(&state.api, "/api/students", &[("school_id", school)])
    })
}

fn students_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let snap = load_students(state, params);
    Ok(table_response(state, STUDENTS, &STUDENT_TABLE, &snap, params))
}

/// Exports every row the table matches, not just the visible page.
fn students_export(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let snap = load_students(state, params);
    if snap.skipped {
        return Err(HandlerErr::new("no_context", "Select a school first"));
    }
    if let Some(e) = snap.error.as_ref().filter(|_| snap.data.is_none()) {
        return Err(HandlerErr::new("api_error", e.clone()));
    }
    let rows = table_matches(state, STUDENTS, &STUDENT_TABLE, &snapshot_rows(&snap), params);
    let columns = export::columns(EXPORT_COLUMNS);
    let csv = export::to_csv(&columns, &rows);
    let file_name = export::file_name("students", today());
    match get_opt_str(params, "outPath") {
        Some(path) => {
            export::write_text_file(&PathBuf::from(&path), &csv)
                .map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": path })))?;
            Ok(json!({ "path": path, "fileName": file_name, "rowsExported": rows.len() }))
        }
        None => Ok(json!({ "csv": csv, "fileName": file_name, "rowsExported": rows.len() })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.exportCsv" => students_export(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
