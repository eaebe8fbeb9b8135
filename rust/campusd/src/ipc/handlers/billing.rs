use crate::binder::ResourceKey;
use crate::dates::DateRangeSelect;
use crate::dispatch::{ActionSpec, ListPatch, Verb};
use crate::export::{self, Column};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, find_row, get_opt_str, get_required_str, input_value,
    load_list, patch_lists, reply, require_confirm, run_action, snapshot_rows, table_matches,
    table_response, to_json, today, typed_rows, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::billing::{
    BillingCycle, BillingPlan, BillingPlanInput, BillingRecord, BillingSummary, PaymentStatus,
};
use crate::models::schools::School;
use crate::render;
use crate::table::TableSpec;
use crate::validate::{parse_date, Validator};
use serde_json::json;
use std::path::PathBuf;

const PLANS: &str = "billing.plans";
const RECORDS: &str = "billing.records";

const PLAN_TABLE: TableSpec = TableSpec {
    search_fields: &["name", "description"],
};
const RECORD_TABLE: TableSpec = TableSpec {
    search_fields: &["invoice_number", "school_name", "subscription_plan"],
};

const RECORD_COLUMNS: &[Column] = &[
    Column::new("invoice_number", "Invoice"),
    Column::new("school_name", "School"),
    Column::new("subscription_plan", "Plan"),
    Column::new("billing_cycle", "Cycle"),
    Column::new("amount", "Amount"),
    Column::new("due_date", "Due Date"),
    Column::new("payment_status", "Status"),
    Column::new("payment_date", "Paid On"),
];

fn plans_key() -> Option<ResourceKey> {
    ResourceKey::from_parts(&[Some(PLANS)])
}

fn records_key() -> Option<ResourceKey> {
    ResourceKey::from_parts(&[Some(RECORDS)])
}

fn plans_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let key = plans_key();
    let snap = load_list(state, key.as_ref(), params, || {
        fetch_typed::<BillingPlan>(&state.api, "/api/billing/plans", &[])
    });
    let mut out = table_response(state, PLANS, &PLAN_TABLE, &snap, params);
    if let Some(rows) = out["rows"].as_array_mut() {
        for row in rows.iter_mut() {
            let Ok(plan) = serde_json::from_value::<BillingPlan>(row.clone()) else {
                continue;
            };
            row["prices"] = json!({
                "monthly": plan.price_for(BillingCycle::Monthly),
                "quarterly": plan.price_for(BillingCycle::Quarterly),
                "yearly": plan.price_for(BillingCycle::Yearly),
            });
        }
    }
    Ok(out)
}

fn plans_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let input = input_value(params);
    let plan: BillingPlanInput = decode(&input)?;
    let spec = ActionSpec::new("billing.plans.create", "billing plan", Verb::Create);
    let (created, toast) = run_action(state, &spec, &input, || plan.validate(), |api| {
        api.post::<BillingPlan, _>("/api/billing/plans", &plan)
    })?;
    let row = to_json(&created)?;
    patch_lists(state, &[PLANS], &ListPatch::Insert(row.clone()));
    Ok(action_result(row, &toast))
}

fn plans_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let input = input_value(params);
    let plan: BillingPlanInput = decode(&input)?;
    let spec = ActionSpec::new(format!("billing.plans.update:{id}"), "billing plan", Verb::Update);
    let (updated, toast) = run_action(state, &spec, &input, || plan.validate(), |api| {
        api.put::<BillingPlan, _>(&format!("/api/billing/plans/{id}"), &plan)
    })?;
    let row = to_json(&updated)?;
    patch_lists(state, &[PLANS], &ListPatch::Replace(row.clone()));
    Ok(action_result(row, &toast))
}

fn plans_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    require_confirm(params, "billing plan")?;
    let spec = ActionSpec::new(format!("billing.plans.delete:{id}"), "billing plan", Verb::Delete);
    let ((), toast) = run_action(state, &spec, &json!({ "id": id }), || Ok(()), |api| {
        api.delete(&format!("/api/billing/plans/{id}"))
    })?;
    patch_lists(state, &[PLANS], &ListPatch::Remove(id.clone()));
    Ok(action_result(json!({ "id": id }), &toast))
}

fn load_records(state: &AppState, params: &serde_json::Value) -> crate::binder::Snapshot<serde_json::Value> {
    let key = records_key();
    load_list(state, key.as_ref(), params, || {
        fetch_typed::<BillingRecord>(&state.api, "/api/billing/records", &[])
    })
}

fn records_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let snap = load_records(state, params);
    let mut out = table_response(state, RECORDS, &RECORD_TABLE, &snap, params);
    out["statusOptions"] = PaymentStatus::ALL
        .iter()
        .map(|s| json!({ "value": s.as_str(), "label": s.label() }))
        .collect();
    Ok(out)
}

fn mark_paid(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let payment_date = get_opt_str(params, "paymentDate").unwrap_or_else(|| today().to_string());
    let cached: Option<BillingRecord> = find_row(state, RECORDS, &id).and_then(|r| serde_json::from_value(r).ok());
    let input = json!({ "id": id, "payment_date": payment_date });
    let spec = ActionSpec::new(format!("billing.records.markPaid:{id}"), "payment", Verb::Custom("record"))
        .success("Invoice marked as paid");
    let (record, toast) = run_action(
        state,
        &spec,
        &input,
        || {
            Validator::new()
                .check(
                    cached.as_ref().map(|r| r.payment_status.can_mark_paid()).unwrap_or(true),
                    "payment_status",
                    "This invoice is already paid",
                )
                .date("payment_date", "Payment date", Some(payment_date.as_str()))
                .finish()
        },
        |api| {
            api.patch::<BillingRecord, _>(
                &format!("/api/billing/records/{id}/mark-paid"),
                &json!({ "payment_date": payment_date }),
            )
        },
    )?;
    let row = to_json(&record)?;
    patch_lists(state, &[RECORDS], &ListPatch::Replace(row.clone()));
    Ok(action_result(row, &toast))
}

/// Records the table currently matches, narrowed to a due-date range when
/// `start`/`end` are given.
fn matched_records(state: &mut AppState, params: &serde_json::Value) -> Result<Vec<BillingRecord>, HandlerErr> {
    let snap = load_records(state, params);
    if let Some(e) = snap.error.as_ref().filter(|_| snap.data.is_none()) {
        return Err(HandlerErr::new("api_error", e.clone()));
    }
    let rows = snapshot_rows(&snap);
    let rows = table_matches(state, RECORDS, &RECORD_TABLE, &rows, params);
    let mut records: Vec<BillingRecord> = typed_rows(&rows)?;
    if params.get("start").is_some() || params.get("end").is_some() {
        let range = DateRangeSelect::from_params(params)
            .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
        let (from, to) = (range.start.to_date(), range.end.to_date());
        records.retain(|r| match parse_date(&r.due_date) {
            Some(d) => from.map(|f| d >= f).unwrap_or(true) && to.map(|t| d <= t).unwrap_or(true),
            None => false,
        });
    }
    Ok(records)
}

fn records_summary(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let records = matched_records(state, params)?;
    to_json(&BillingSummary::from_records(&records))
}

fn records_export(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let records = matched_records(state, params)?;
    let rows: Vec<serde_json::Value> = records.iter().map(to_json).collect::<Result<_, _>>()?;
    let csv = export::to_csv(RECORD_COLUMNS, &rows);
    let file_name = export::file_name("billing-records", today());
    match get_opt_str(params, "outPath") {
        Some(path) => {
            export::write_text_file(&PathBuf::from(&path), &csv)
                .map_err(|e| HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": path })))?;
            Ok(json!({ "path": path, "fileName": file_name, "rowsExported": rows.len() }))
        }
        None => Ok(json!({ "csv": csv, "fileName": file_name, "rowsExported": rows.len() })),
    }
}

fn school_for(state: &AppState, school_id: &str) -> Option<School> {
    find_row(state, "schools", school_id).and_then(|r| serde_json::from_value(r).ok())
}

fn invoice(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let record: BillingRecord = match find_row(state, RECORDS, &id) {
        Some(row) => decode(&row)?,
        None => state.api.get(&format!("/api/billing/records/{id}"), &[])?,
    };
    let school = school_for(state, record.school_id.as_str());
    let html = render::invoice_html(&record, school.as_ref(), today());
    Ok(json!({
        "html": html,
        "print": true,
        "fileName": format!("invoice-{}.html", record.invoice_number),
    }))
}

fn statement(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let records = matched_records(state, params)?;
    let summary = BillingSummary::from_records(&records);
    let start = params.get("start").and_then(|v| v.as_str());
    let end = params.get("end").and_then(|v| v.as_str());
    let title = get_opt_str(params, "title").unwrap_or_else(|| "Billing statement".to_string());
    let html = render::statement_html(&title, &records, &summary, start.zip(end));
    Ok(json!({ "html": html, "print": true, "summary": summary }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "billing.plans.list" => plans_list(state, &req.params),
        "billing.plans.create" => plans_create(state, &req.params),
        "billing.plans.update" => plans_update(state, &req.params),
        "billing.plans.delete" => plans_delete(state, &req.params),
        "billing.records.list" => records_list(state, &req.params),
        "billing.records.markPaid" => mark_paid(state, &req.params),
        "billing.records.summary" => records_summary(state, &req.params),
        "billing.records.exportCsv" => records_export(state, &req.params),
        "billing.records.invoice" => invoice(state, &req.params),
        "billing.records.statement" => statement(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
