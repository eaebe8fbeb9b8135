use crate::binder::ResourceKey;
use crate::dates::DateRangeSelect;
use crate::ipc::helpers::{fetch_typed, get_opt_str, load_list, reply, snapshot_rows, to_json, typed_rows, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::models::attendance::{AttendanceRecord, AttendanceSummary};
use crate::table::ALL;
use serde_json::json;

const ATTENDANCE: &str = "attendance";

/// Per-student attendance over a date range. Percentages are recomputed
/// from the fetched records every time.
fn summary(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let range = DateRangeSelect::from_params(params).map_err(|e| {
        HandlerErr::new("validation_failed", e.to_string())
            .with_details(json!({ "fieldErrors": { "end": e.to_string() } }))
    })?;
    let (start, end) = (range.start.to_iso(), range.end.to_iso());
    let school = state.context.school_id.clone();
    let section = get_opt_str(params, "sectionId").unwrap_or_else(|| ALL.to_string());
    let key = ResourceKey::from_parts(&[
        Some(ATTENDANCE),
        school.as_deref(),
        Some(section.as_str()),
        Some(start.as_str()),
        Some(end.as_str()),
    ]);
    let snap = load_list(state, key.as_ref(), params, || {
        let mut query = vec![
            ("school_id", school.as_deref().unwrap_or_default()),
            ("start_date", start.as_str()),
            ("end_date", end.as_str()),
        ];
        if section != ALL {
            query.push(("section_id", section.as_str()));
        }
        fetch_typed::<AttendanceRecord>(&state.api, "/api/attendance", &query)
    });
    let records: Vec<AttendanceRecord> = typed_rows(&snapshot_rows(&snap))?;
    let summary = AttendanceSummary::from_records(&records);
    Ok(json!({
        "start": start,
        "end": end,
        "summary": to_json(&summary)?,
        "records": records.len(),
        "isLoading": snap.is_loading,
        "error": snap.error,
        "skipped": snap.skipped,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "attendance.summary" => summary(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
