mod common;

use common::{envelope, failure, MockBackend, Sidecar};
use serde_json::json;

fn backend() -> MockBackend {
    MockBackend::start(|req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/api/custom-fields/categories") => envelope(json!([
            { "id": "medical", "name": "Medical", "order": 1 },
            { "id": "transport", "name": "Transport", "order": 0 }
        ])),
        ("GET", "/api/custom-fields") => envelope(json!([
            { "id": "f1", "label": "Allergies", "type": "text", "category_id": "medical", "sort_order": 0 },
            { "id": "f2", "label": "Blood group", "type": "select", "category_id": "medical", "sort_order": 1,
              "options": ["A", "B", "O", "AB"] },
            { "id": "f3", "label": "Bus route", "type": "text", "category_id": "transport", "sort_order": 0 }
        ])),
        ("PUT", "/api/custom-fields/order") => envelope(json!(null)),
        _ => failure(404, "not found"),
    })
}

fn field_ids(group: &serde_json::Value) -> Vec<String> {
    group["fields"]
        .as_array()
        .expect("fields")
        .iter()
        .filter_map(|f| f["id"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn reorder_and_commit_sends_one_payload() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("0", "context.setCampus", json!({ "campusId": "north" }));

    let layout = sc.ok("1", "customFields.layout.open", json!({}));
    assert_eq!(layout["categories"][0]["category"]["name"], json!("Transport"));
    assert_eq!(layout["dirty"], json!(false));

    let clean = sc.ok("2", "customFields.layout.commit", json!({}));
    assert_eq!(clean["saved"], json!(false));
    assert_eq!(backend.count("PUT", "/api/custom-fields/order"), 0);

    let layout = sc.ok("3", "customFields.layout.moveCategory", json!({ "categoryId": "medical", "to": 0 }));
    assert_eq!(layout["categories"][0]["category"]["id"], json!("medical"));
    assert_eq!(layout["dirty"], json!(true));

    let layout = sc.ok(
        "4",
        "customFields.layout.moveField",
        json!({ "fieldId": "f2", "categoryId": "transport", "to": 0 }),
    );
    assert_eq!(field_ids(&layout["categories"][0]), vec!["f1"]);
    assert_eq!(field_ids(&layout["categories"][1]), vec!["f2", "f3"]);

    let err = sc.fail(
        "5",
        "customFields.layout.moveField",
        json!({ "fieldId": "f1", "categoryId": "transport", "to": 7 }),
    );
    assert_eq!(err["code"], json!("bad_params"));

    let res = sc.ok("6", "customFields.layout.commit", json!({}));
    assert_eq!(res["toast"]["message"], json!("Field order saved"));
    assert_eq!(res["layout"]["dirty"], json!(false));

    let put = backend
        .requests()
        .into_iter()
        .find(|r| r.is("PUT", "/api/custom-fields/order"))
        .expect("order update");
    assert_eq!(
        put.body["categories"],
        json!([{ "id": "medical", "order": 0 }, { "id": "transport", "order": 1 }])
    );
    assert_eq!(
        put.body["fields"],
        json!([
            { "id": "f1", "category_id": "medical", "sort_order": 0 },
            { "id": "f2", "category_id": "transport", "sort_order": 0 },
            { "id": "f3", "category_id": "transport", "sort_order": 1 }
        ])
    );
}

#[test]
fn moves_need_an_open_layout() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("0", "context.setCampus", json!({ "campusId": "north" }));

    let err = sc.fail("1", "customFields.layout.moveCategory", json!({ "categoryId": "medical", "to": 0 }));
    assert_eq!(err["code"], json!("bad_params"));
}

#[test]
fn category_with_fields_cannot_be_deleted() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("0", "context.setCampus", json!({ "campusId": "north" }));
    let _ = sc.ok("1", "customFields.fields.list", json!({}));

    let err = sc.fail("2", "customFields.categories.delete", json!({ "id": "medical", "confirm": true }));
    assert_eq!(err["code"], json!("validation_failed"));
    assert_eq!(backend.requests().iter().filter(|r| r.method == "DELETE").count(), 0);

    let err = sc.fail(
        "3",
        "customFields.fields.create",
        json!({ "input": { "label": "Diet", "type": "select", "category_id": "medical", "options": [] } }),
    );
    assert_eq!(err["code"], json!("validation_failed"));
    assert!(err["details"]["fieldErrors"]["options"].is_string());
}

fn numeric_backend() -> MockBackend {
    MockBackend::start(|req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/api/custom-fields/categories") => envelope(json!([
            { "id": 7, "name": "Medical", "order": 0 },
            { "id": 8, "name": "Transport", "order": 1 }
        ])),
        ("GET", "/api/custom-fields") => envelope(json!([
            { "id": 1, "label": "Allergies", "type": "text", "category_id": 7, "sort_order": 0 }
        ])),
        ("DELETE", "/api/custom-fields/categories/8") => envelope(json!(null)),
        ("PUT", "/api/custom-fields/order") => envelope(json!(null)),
        _ => failure(404, "not found"),
    })
}

#[test]
fn integer_category_ids_filter_and_guard_deletes() {
    let backend = numeric_backend();
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("0", "context.setCampus", json!({ "campusId": "north" }));

    let list = sc.ok("1", "customFields.fields.list", json!({ "categoryId": "7" }));
    assert_eq!(list["rows"].as_array().map(Vec::len), Some(1));
    assert_eq!(list["rows"][0]["id"], json!(1));
    let list = sc.ok("2", "customFields.fields.list", json!({ "categoryId": "8" }));
    assert_eq!(list["rows"], json!([]));

    let _ = sc.ok("3", "customFields.categories.list", json!({}));
    let err = sc.fail("4", "customFields.categories.delete", json!({ "id": "7", "confirm": true }));
    assert_eq!(err["code"], json!("validation_failed"));
    assert_eq!(backend.requests().iter().filter(|r| r.method == "DELETE").count(), 0);

    let res = sc.ok("5", "customFields.categories.delete", json!({ "id": "8", "confirm": true }));
    assert_eq!(res["toast"]["message"], json!("Category deleted"));
    assert_eq!(backend.count("DELETE", "/api/custom-fields/categories/8"), 1);
    let cats = sc.ok("6", "customFields.categories.list", json!({}));
    let ids: Vec<_> = cats["rows"].as_array().expect("rows").iter().map(|c| c["id"].clone()).collect();
    assert_eq!(ids, vec![json!(7)]);
}

#[test]
fn integer_ids_survive_a_layout_commit() {
    let backend = numeric_backend();
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("0", "context.setCampus", json!({ "campusId": "north" }));
    let _ = sc.ok("1", "customFields.layout.open", json!({}));

    let layout = sc.ok("2", "customFields.layout.moveField", json!({ "fieldId": "1", "categoryId": "8", "to": 0 }));
    assert_eq!(layout["categories"][1]["fields"][0]["id"], json!(1));
    let _ = sc.ok("3", "customFields.layout.commit", json!({}));

    let put = backend
        .requests()
        .into_iter()
        .find(|r| r.is("PUT", "/api/custom-fields/order"))
        .expect("order update");
    assert_eq!(put.body["fields"], json!([{ "id": 1, "category_id": 8, "sort_order": 0 }]));
}
