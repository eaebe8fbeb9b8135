use crate::binder::ResourceKey;
use crate::dispatch::{ActionSpec, ListPatch, Verb};
use crate::ipc::helpers::{
    action_result, decode, fetch_typed, find_row, get_opt_str, get_required_str, input_value,
    load_list, patch_lists, reply, require_campus, require_confirm, run_action, table_response,
    to_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::diary::{DiaryComment, DiaryEntry, DiaryEntryInput};
use crate::table::{TableSpec, ALL};
use crate::validate::Validator;
use serde_json::json;

const DIARY: &str = "diary";

const DIARY_TABLE: TableSpec = TableSpec {
    search_fields: &["content", "day_of_week"],
};

fn diary_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = state.context.campus_id.clone();
    let section = get_opt_str(params, "sectionId").unwrap_or_else(|| ALL.to_string());
    let date = get_opt_str(params, "date").unwrap_or_else(|| ALL.to_string());
    let key = ResourceKey::from_parts(&[
        Some(DIARY),
        campus.as_deref(),
        Some(section.as_str()),
        Some(date.as_str()),
    ]);
    let snap = load_list(state, key.as_ref(), params, || {
        let mut query = vec![("campus_id", campus.as_deref().unwrap_or_default())];
        if section != ALL {
            query.push(("section_id", section.as_str()));
        }
        if date != ALL {
            query.push(("date", date.as_str()));
        }
        fetch_typed::<DiaryEntry>(&state.api, "/api/diary", &query)
    });
    Ok(table_response(state, DIARY, &DIARY_TABLE, &snap, params))
}

fn entry_body(input: DiaryEntryInput, campus: &str) -> Result<serde_json::Value, HandlerErr> {
    let mut body = to_json(&input.with_day_of_week())?;
    body["campus_id"] = json!(campus);
    Ok(body)
}

fn diary_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let input = input_value(params);
    let entry: DiaryEntryInput = decode(&input)?;
    let checked = entry.validate();
    let body = entry_body(entry, &campus)?;
    let spec = ActionSpec::new("diary.create", "diary entry", Verb::Create);
    let (created, toast) = run_action(state, &spec, &input, || checked, |api| {
        api.post::<DiaryEntry, _>("/api/diary", &body)
    })?;
    let row = to_json(&created)?;
    let insert = ListPatch::Insert(row.clone());
    let section = created.section_id.as_ref().map(|s| s.as_str()).unwrap_or(ALL);
    // Lists are keyed by section and date; only the unfiltered ones and the
    // ones this entry belongs to take the new row.
    for (s, d) in [
        (ALL, ALL),
        (section, ALL),
        (ALL, created.diary_date.as_str()),
        (section, created.diary_date.as_str()),
    ] {
        patch_lists(state, &[DIARY, campus.as_str(), s, d], &insert);
    }
    Ok(action_result(row, &toast))
}

fn diary_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    let input = input_value(params);
    let entry: DiaryEntryInput = decode(&input)?;
    let checked = entry.validate();
    let body = entry_body(entry, &campus)?;
    let spec = ActionSpec::new(format!("diary.update:{id}"), "diary entry", Verb::Update);
    let (updated, toast) = run_action(state, &spec, &input, || checked, |api| {
        api.put::<DiaryEntry, _>(&format!("/api/diary/{id}"), &body)
    })?;
    let row = to_json(&updated)?;
    patch_lists(state, &[DIARY, campus.as_str()], &ListPatch::Replace(row.clone()));
    Ok(action_result(row, &toast))
}

fn diary_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let id = get_required_str(params, "id")?;
    require_confirm(params, "diary entry")?;
    let spec = ActionSpec::new(format!("diary.delete:{id}"), "diary entry", Verb::Delete);
    let ((), toast) = run_action(state, &spec, &json!({ "id": id }), || Ok(()), |api| {
        api.delete(&format!("/api/diary/{id}"))
    })?;
    patch_lists(state, &[DIARY, campus.as_str()], &ListPatch::Remove(id.clone()));
    Ok(action_result(json!({ "id": id }), &toast))
}

fn cached_entry(state: &AppState, id: &str) -> Option<DiaryEntry> {
    find_row(state, DIARY, id).and_then(|r| serde_json::from_value(r).ok())
}

/// Rewrites the cached entry's comment list in every diary list holding it.
fn patch_comments<F>(state: &AppState, campus: &str, entry_id: &str, f: F) -> Result<(), HandlerErr>
where
    F: FnOnce(&mut Vec<DiaryComment>),
{
    let Some(mut entry) = cached_entry(state, entry_id) else {
        return Ok(());
    };
    f(&mut entry.comments);
    patch_lists(state, &[DIARY, campus], &ListPatch::Replace(to_json(&entry)?));
    Ok(())
}

fn comments_add(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let entry_id = get_required_str(params, "entryId")?;
    let content = get_opt_str(params, "content");
    let comments_enabled = cached_entry(state, &entry_id).map(|e| e.enable_comments).unwrap_or(true);
    let input = json!({ "content": content });
    let spec = ActionSpec::new(format!("diary.comments.add:{entry_id}"), "comment", Verb::Create);
    let (comment, toast) = run_action(
        state,
        &spec,
        &input,
        || {
            Validator::new()
                .check(comments_enabled, "content", "Comments are turned off for this entry")
                .required("content", "Comment", content.as_deref())
                .finish()
        },
        |api| {
            api.post::<DiaryComment, _>(&format!("/api/diary/{entry_id}/comments"), &input)
        },
    )?;
    let row = to_json(&comment)?;
    patch_comments(state, &campus, &entry_id, |list| list.push(comment))?;
    Ok(action_result(row, &toast))
}

fn comments_remove(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let campus = require_campus(state)?;
    let entry_id = get_required_str(params, "entryId")?;
    let comment_id = get_required_str(params, "commentId")?;
    require_confirm(params, "comment")?;
    let spec = ActionSpec::new(format!("diary.comments.remove:{comment_id}"), "comment", Verb::Delete);
    let ((), toast) = run_action(state, &spec, &json!({ "id": comment_id }), || Ok(()), |api| {
        api.delete(&format!("/api/diary/{entry_id}/comments/{comment_id}"))
    })?;
    patch_comments(state, &campus, &entry_id, |list| {
        list.retain(|c| c.id.as_str() != comment_id)
    })?;
    Ok(action_result(json!({ "id": comment_id, "entryId": entry_id }), &toast))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "diary.list" => diary_list(state, &req.params),
        "diary.create" => diary_create(state, &req.params),
        "diary.update" => diary_update(state, &req.params),
        "diary.delete" => diary_delete(state, &req.params),
        "diary.comments.add" => comments_add(state, &req.params),
        "diary.comments.remove" => comments_remove(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, res))
}
