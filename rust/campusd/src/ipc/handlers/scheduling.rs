use crate::binder::ResourceKey;
use crate::dispatch::{ActionSpec, ListPatch, Verb};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, find_row, get_opt_str, input_value, load_list,
    patch_lists, reply, require_confirm, require_school, run_action, table_response, to_json,
    today, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::scheduling::{AddDropEntry, CoursePeriod, EnrollmentInput};
use crate::table::{TableSpec, ALL};
use crate::validate::Validator;
use serde_json::json;

const PERIODS: &str = "schedule.periods";
const ADD_DROP: &str = "schedule.addDrop";

const PERIOD_TABLE: TableSpec = TableSpec {
    search_fields: &["course_name", "teacher_name", "room", "period"],
};
const ADD_DROP_TABLE: TableSpec = TableSpec {
    search_fields: &["student_name", "course_name", "performed_by"],
};

fn periods_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = state.context.school_id.clone();
    let term = get_opt_str(params, "term").unwrap_or_else(|| ALL.to_string());
    let key = ResourceKey::from_parts(&[Some(PERIODS), school.as_deref(), Some(term.as_str())]);
    let snap = load_list(state, key.as_ref(), params, || {
        let mut query = vec![("school_id", school.as_deref().unwrap_or_default())];
        if term != ALL {
            query.push(("term", term.as_str()));
        }
        fetch_typed::<CoursePeriod>(&state.api, "/api/course-periods", &query)
    });
    Ok(table_response(state, PERIODS, &PERIOD_TABLE, &snap, params))
}

fn cached_period(state: &AppState, id: Option<&str>) -> Option<CoursePeriod> {
    find_row(state, PERIODS, id?).and_then(|r| serde_json::from_value(r).ok())
}

/// Bumps the cached enrolment count so seat checks stay current until the
/// next refetch.
fn adjust_enrolled(state: &AppState, school: &str, period: Option<CoursePeriod>, delta: i64) -> Result<(), HandlerErr> {
    let Some(mut period) = period else {
        return Ok(());
    };
    period.enrolled_count = (period.enrolled_count + delta).max(0);
    patch_lists(state, &[PERIODS, school], &ListPatch::Replace(to_json(&period)?));
    Ok(())
}

fn enroll(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = require_school(state)?;
    let input = input_value(params);
    let mut enrollment: EnrollmentInput = decode(&input)?;
    if enrollment.effective_date.is_none() {
        enrollment.effective_date = Some(today().to_string());
    }
    let period = cached_period(state, enrollment.course_period_id.as_ref().map(|p| p.as_str()));
    let mut body = to_json(&enrollment)?;
    body["school_id"] = json!(school);
    let spec = ActionSpec::new("schedule.enroll", "enrollment", Verb::Create).success("Student enrolled");
    let (created, toast) = run_action(state, &spec, &input, || enrollment.validate(period.as_ref()), |api| {
        api.post::<serde_json::Value, _>("/api/enrollments", &body)
    })?;
    adjust_enrolled(state, &school, period, 1)?;
    state.binder.invalidate_resource(ADD_DROP);
    Ok(action_result(created, &toast))
}

fn drop_enrollment(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = require_school(state)?;
    require_confirm(params, "enrollment")?;
    let student = get_opt_str(params, "studentId");
    let period_id = get_opt_str(params, "coursePeriodId");
    let effective = get_opt_str(params, "effectiveDate").unwrap_or_else(|| today().to_string());
    let period = cached_period(state, period_id.as_deref());
    let input = json!({
        "student_id": student,
        "course_period_id": period_id,
        "effective_date": effective,
        "school_id": school,
    });
    let spec = ActionSpec::new(
        format!("schedule.drop:{}", period_id.as_deref().unwrap_or_default()),
        "enrollment",
        Verb::Custom("drop"),
    )
    .success("Student dropped from course");
    let (dropped, toast) = run_action(
        state,
        &spec,
        &input,
        || {
            Validator::new()
                .required("student_id", "Student", student.as_deref())
                .required("course_period_id", "Course period", period_id.as_deref())
                .date("effective_date", "Effective date", Some(effective.as_str()))
                .finish()
        },
        |api| api.post::<serde_json::Value, _>("/api/enrollments/drop", &input),
    )?;
    adjust_enrolled(state, &school, period, -1)?;
    state.binder.invalidate_resource(ADD_DROP);
    Ok(action_result(dropped, &toast))
}

fn add_drop_log(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let school = state.context.school_id.clone();
    let term = get_opt_str(params, "term").unwrap_or_else(|| ALL.to_string());
    let key = ResourceKey::from_parts(&[Some(ADD_DROP), school.as_deref(), Some(term.as_str())]);
    let snap = load_list(state, key.as_ref(), params, || {
        let mut query = vec![("school_id", school.as_deref().unwrap_or_default())];
        if term != ALL {
            query.push(("term", term.as_str()));
        }
        fetch_typed::<AddDropEntry>(&state.api, "/api/add-drop-log", &query)
    });
    Ok(table_response(state, ADD_DROP, &ADD_DROP_TABLE, &snap, params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "schedule.periods.list" => periods_list(state, &req.params),
        "schedule.enroll" => enroll(state, &req.params),
        "schedule.drop" => drop_enrollment(state, &req.params),
        "schedule.addDropLog" => add_drop_log(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
