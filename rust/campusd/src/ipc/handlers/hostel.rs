use crate::api::ApiError;
use crate::binder::ResourceKey;
use crate::dispatch::{ActionSpec, ListPatch, Verb};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, find_row, get_opt_f64, get_opt_str, get_required_str,
    input_value, load_list, patch_lists, reply, require_campus, require_confirm, run_action,
    snapshot_rows, table_matches, table_response, to_json, typed_rows, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::hostel::{
    parse_timestamp, validate_check_out, CheckInInput, FeeTotals, HostelRentalFee, HostelVisit,
};
use crate::table::{TableSpec, ALL};
use crate::validate::Validator;
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::info;

const VISITS: &str = "hostel.visits";
const FEES: &str = "hostel.fees";

const VISIT_TABLE: TableSpec = TableSpec {
    search_fields: &["student_name", "visitor_name", "relation"],
};
const FEE_TABLE: TableSpec = TableSpec {
    search_fields: &["student_name", "month"],
};

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn visits_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = state.context.campus_id.clone();
    let key = ResourceKey::from_parts(&[Some(VISITS), campus.as_deref()]);
    let snap = load_list(state, key.as_ref(), params, || {
        let campus = campus.as_deref().unwrap_or_default();
        fetch_typed::<HostelVisit>(&state.api, "/api/hostel/visits", &[("campus_id", campus)])
    });
    let mut out = table_response(state, VISITS, &VISIT_TABLE, &snap, params);
    let visits: Vec<HostelVisit> = typed_rows(&snapshot_rows(&snap))?;
    out["openCount"] = json!(visits.iter().filter(|v| v.is_open()).count());
    Ok(out)
}

fn check_in(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let input = input_value(params);
    let mut visit: CheckInInput = decode(&input)?;
    if visit.check_in.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        visit.check_in = Some(now_stamp());
    }
    let mut body = to_json(&visit)?;
    body["campus_id"] = json!(campus);
    let spec = ActionSpec::new("hostel.visits.checkIn", "visit", Verb::Custom("check in"))
        .success("Visitor checked in");
    let (created, toast) = run_action(state, &spec, &input, || visit.validate(), |api| {
        api.post::<HostelVisit, _>("/api/hostel/visits", &body)
    })?;
    let row = to_json(&created)?;
    patch_lists(state, &[VISITS, campus.as_str()], &ListPatch::Insert(row.clone()));
    Ok(action_result(row, &toast))
}

fn check_out(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    let stamp = get_opt_str(params, "checkOut").unwrap_or_else(now_stamp);
    let cached: Option<HostelVisit> = find_row(state, VISITS, &id).and_then(|r| serde_json::from_value(r).ok());
    let input = json!({ "id": id, "check_out": stamp });
    let spec = ActionSpec::new(format!("hostel.visits.checkOut:{id}"), "visit", Verb::Custom("check out"))
        .success("Visitor checked out");
    let (visit, toast) = run_action(
        state,
        &spec,
        &input,
        || match cached.as_ref() {
            Some(v) => validate_check_out(v, &stamp),
            None => Validator::new()
                .check(parse_timestamp(&stamp).is_some(), "check_out", "Check-out time is not valid")
                .finish(),
        },
        |api| {
            api.patch::<HostelVisit, _>(
                &format!("/api/hostel/visits/{id}/check-out"),
                &json!({ "check_out": stamp }),
            )
        },
    )?;
    let row = to_json(&visit)?;
    patch_lists(state, &[VISITS, campus.as_str()], &ListPatch::Replace(row.clone()));
    Ok(action_result(row, &toast))
}

fn fees_key(campus: Option<&str>, month: &str) -> Option<ResourceKey> {
    ResourceKey::from_parts(&[Some(FEES), campus, Some(month)])
}

fn fetch_fees(state: &AppState, campus: &str, month: &str) -> Result<serde_json::Value, ApiError> {
    let mut query = vec![("campus_id", campus)];
    if month != ALL {
        query.push(("month", month));
    }
    fetch_typed::<HostelRentalFee>(&state.api, "/api/hostel/fees", &query)
}

fn fees_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = state.context.campus_id.clone();
    let month = get_opt_str(params, "month").unwrap_or_else(|| ALL.to_string());
    let key = fees_key(campus.as_deref(), &month);
    let snap = load_list(state, key.as_ref(), params, || {
        fetch_fees(state, campus.as_deref().unwrap_or_default(), &month)
    });
    let mut out = table_response(state, FEES, &FEE_TABLE, &snap, params);
    let matched = table_matches(state, FEES, &FEE_TABLE, &snapshot_rows(&snap), params);
    let fees: Vec<HostelRentalFee> = typed_rows(&matched)?;
    out["totals"] = to_json(&FeeTotals::from_fees(&fees))?;
    Ok(out)
}

fn valid_month(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").is_ok()
}

fn fees_generate(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let month = get_opt_str(params, "month");
    let input = json!({ "campus_id": campus, "month": month });
    let spec = ActionSpec::new("hostel.fees.generate", "rental fees", Verb::Custom("generate"))
        .success("Rental fees generated");
    let (created, toast) = run_action(
        state,
        &spec,
        &input,
        || {
            Validator::new()
                .required("month", "Month", month.as_deref())
                .check(month.as_deref().map(valid_month).unwrap_or(true), "month", "Month must look like 2025-03")
                .finish()
        },
        |api| api.post::<Vec<HostelRentalFee>, _>("/api/hostel/fees/generate", &input),
    )?;
    let dropped = state.binder.invalidate_resource(FEES);
    info!(generated = created.len(), dropped, "rental fees generated");
    // the generated month is what the view shows next
    let month = month.unwrap_or_default();
    let snap = state
        .binder
        .refetch(fees_key(Some(campus.as_str()), &month).as_ref(), || fetch_fees(state, &campus, &month));
    let fees: Vec<HostelRentalFee> = typed_rows(&snapshot_rows(&snap))?;
    let mut out = action_result(json!({ "generated": created.len(), "month": month }), &toast);
    out["totals"] = to_json(&FeeTotals::from_fees(&fees))?;
    Ok(out)
}

fn cached_fee(state: &AppState, id: &str) -> Option<HostelRentalFee> {
    find_row(state, FEES, id).and_then(|r| serde_json::from_value(r).ok())
}

fn record_payment(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    let amount = get_opt_f64(params, "amount");
    let fee = cached_fee(state, &id);
    let input = json!({ "id": id, "amount": amount });
    let spec = ActionSpec::new(format!("hostel.fees.recordPayment:{id}"), "payment", Verb::Custom("record"))
        .success("Payment recorded");
    let (updated, toast) = run_action(
        state,
        &spec,
        &input,
        || match fee.as_ref() {
            Some(f) => f.validate_payment(amount),
            None => Validator::new()
                .required_number("amount", "Amount", amount)
                .positive("amount", "Amount", amount)
                .finish(),
        },
        |api| {
            api.patch::<HostelRentalFee, _>(
                &format!("/api/hostel/fees/{id}/payment"),
                &json!({ "amount": amount }),
            )
        },
    )?;
    let row = to_json(&updated.with_derived_status())?;
    patch_lists(state, &[FEES, campus.as_str()], &ListPatch::Replace(row.clone()));
    Ok(action_result(row, &toast))
}

fn waive(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(params, "fee waiver")?;
    let reason = get_opt_str(params, "reason");
    let fee = cached_fee(state, &id);
    let input = json!({ "id": id, "reason": reason });
    let spec = ActionSpec::new(format!("hostel.fees.waive:{id}"), "fee", Verb::Custom("waive"))
        .success("Fee waived");
    let (updated, toast) = run_action(
        state,
        &spec,
        &input,
        || fee.as_ref().map(HostelRentalFee::validate_waive).unwrap_or(Ok(())),
        |api| {
            api.patch::<HostelRentalFee, _>(
                &format!("/api/hostel/fees/{id}/waive"),
                &json!({ "reason": reason }),
            )
        },
    )?;
    let row = to_json(&updated)?;
    patch_lists(state, &[FEES, campus.as_str()], &ListPatch::Replace(row.clone()));
    Ok(action_result(row, &toast))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "hostel.visits.list" => visits_list(state, &req.params),
        "hostel.visits.checkIn" => check_in(state, &req.params),
        "hostel.visits.checkOut" => check_out(state, &req.params),
        "hostel.fees.list" => fees_list(state, &req.params),
        "hostel.fees.generate" => fees_generate(state, &req.params),
        "hostel.fees.recordPayment" => record_payment(state, &req.params),
        "hostel.fees.waive" => waive(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
