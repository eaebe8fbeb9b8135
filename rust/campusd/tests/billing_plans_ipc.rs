mod common;

use common::{envelope, failure, raw, MockBackend, Sidecar};
use serde_json::json;

fn plans() -> serde_json::Value {
    json!([
        { "id": 1, "name": "Basic", "description": "Small schools", "monthly_price": 49.0 },
        { "id": 2, "name": "Pro", "description": "Growing campuses", "monthly_price": 149.0 }
    ])
}

fn backend() -> MockBackend {
    MockBackend::start(|req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/api/billing/plans") => envelope(plans()),
        ("DELETE", "/api/billing/plans/2") => envelope(json!(null)),
        ("POST", "/api/billing/plans") if req.body["name"] == json!("Pro") => {
            failure(409, "A plan with this name already exists")
        }
        ("POST", "/api/billing/plans") => {
            let mut row = req.body.clone();
            row["id"] = json!(3);
            row["is_active"] = json!(true);
            envelope(row)
        }
        _ => failure(404, "not found"),
    })
}

#[test]
fn search_then_delete_patches_the_cached_list() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);

    let page = sc.ok("1", "billing.plans.list", json!({ "search": "pro" }));
    assert_eq!(page["total"], json!(1));
    assert_eq!(page["rows"][0]["name"], json!("Pro"));
    assert_eq!(page["page"], json!(1));
    // cycles without their own price bill as whole months
    assert_eq!(page["rows"][0]["prices"]["quarterly"], json!(447.0));
    assert_eq!(page["rows"][0]["prices"]["yearly"], json!(1788.0));

    let err = sc.fail("2", "billing.plans.delete", json!({ "id": 2 }));
    assert_eq!(err["code"], json!("confirmation_required"));
    assert_eq!(backend.count("DELETE", "/api/billing/plans/2"), 0);

    let res = sc.ok("3", "billing.plans.delete", json!({ "id": 2, "confirm": true }));
    assert_eq!(res["toast"]["message"], json!("Billing plan deleted"));
    assert_eq!(res["toast"]["kind"], json!("success"));
    assert_eq!(res["closeModal"], json!(true));
    assert_eq!(backend.count("DELETE", "/api/billing/plans/2"), 1);

    let page = sc.ok("4", "billing.plans.list", json!({ "search": "" }));
    let names: Vec<&str> = page["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Basic"]);
    // served from the patched cache
    assert_eq!(backend.count("GET", "/api/billing/plans"), 1);

    let page = sc.ok("5", "billing.plans.list", json!({ "refresh": true }));
    assert_eq!(page["total"], json!(2));
    assert_eq!(backend.count("GET", "/api/billing/plans"), 2);

    let toasts = sc.ok("6", "toasts.drain", json!({}));
    assert_eq!(toasts["toasts"].as_array().map(|t| t.len()), Some(1));
}

#[test]
fn invalid_input_never_reaches_the_backend() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);

    let err = sc.fail(
        "1",
        "billing.plans.create",
        json!({ "input": { "name": "  ", "monthly_price": -5 } }),
    );
    assert_eq!(err["code"], json!("validation_failed"));
    assert!(err["details"]["fieldErrors"]["name"].is_string());
    assert!(err["details"]["fieldErrors"]["monthly_price"].is_string());
    assert_eq!(err["details"]["closeModal"], json!(false));
    assert!(backend.requests().is_empty());
}

#[test]
fn backend_failure_keeps_the_draft_and_shows_its_message() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);

    let input = json!({ "name": "Pro", "monthly_price": 99 });
    let err = sc.fail("1", "billing.plans.create", json!({ "input": input }));
    assert_eq!(err["code"], json!("api_error"));
    assert_eq!(err["details"]["status"], json!(409));
    assert_eq!(
        err["details"]["toast"]["message"],
        json!("A plan with this name already exists")
    );
    assert_eq!(err["details"]["closeModal"], json!(false));

    let form = sc.ok("2", "forms.get", json!({ "formId": "billing.plans.create" }));
    assert_eq!(form["draft"], input);
    assert_eq!(form["submitting"], json!(false));

    // a later success closes the form
    let res = sc.ok(
        "3",
        "billing.plans.create",
        json!({ "input": { "name": "Campus", "monthly_price": 299 } }),
    );
    assert_eq!(res["toast"]["message"], json!("Billing plan created"));
    assert_eq!(res["record"]["id"], json!(3));
    let form = sc.ok("4", "forms.get", json!({ "formId": "billing.plans.create" }));
    assert_eq!(form["draft"], json!(null));
}

#[test]
fn empty_and_html_delete_responses() {
    let backend = MockBackend::start(|req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/api/billing/plans") => envelope(plans()).into(),
        ("DELETE", "/api/billing/plans/1") => raw(204, ""),
        ("DELETE", "/api/billing/plans/2") => raw(502, "<html><body><h1>502 Bad Gateway</h1></body></html>"),
        _ => failure(404, "not found").into(),
    });
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("1", "billing.plans.list", json!({}));

    let res = sc.ok("2", "billing.plans.delete", json!({ "id": 1, "confirm": true }));
    assert_eq!(res["toast"]["message"], json!("Billing plan deleted"));

    let err = sc.fail("3", "billing.plans.delete", json!({ "id": 2, "confirm": true }));
    assert_eq!(err["code"], json!("api_error"));
    assert_eq!(err["details"]["status"], json!(502));
    assert_eq!(err["details"]["toast"]["message"], json!("Failed to delete billing plan"));

    let page = sc.ok("4", "billing.plans.list", json!({}));
    assert_eq!(page["total"], json!(1));
    assert_eq!(page["rows"][0]["name"], json!("Pro"));
}
