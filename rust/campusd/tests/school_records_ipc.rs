mod common;

use common::{envelope, failure, temp_dir, MockBackend, Sidecar};
use serde_json::json;

fn backend() -> MockBackend {
    MockBackend::start(|req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/api/students") => envelope(json!([
            { "id": 41, "first_name": "Ana <A>", "last_name": "Ruiz", "admission_number": "ADM-041",
              "grade_level": "7", "section": "B", "guardian_name": "Maria Ruiz, Sr.",
              "guardian_phone": "555-0101", "status": "active" },
            { "id": 42, "first_name": "Ben", "last_name": "Okafor", "admission_number": "ADM-042",
              "grade_level": "8", "status": "active" }
        ])),
        ("GET", "/api/attendance") => envelope(json!([
            { "student_id": 41, "student_name": "Ana Ruiz", "date": "2025-03-03", "status": "present" },
            { "student_id": 41, "student_name": "Ana Ruiz", "date": "2025-03-04", "status": "late" },
            { "student_id": 42, "student_name": "Ben Okafor", "date": "2025-03-03", "status": "absent" },
            { "student_id": 42, "student_name": "Ben Okafor", "date": "2025-03-04", "status": "present" }
        ])),
        ("GET", "/api/course-periods") => envelope(json!([
            { "id": 3, "course_name": "Algebra I", "capacity": 25, "enrolled_count": 20 }
        ])),
        ("POST", "/api/enrollments/drop") => envelope(json!({
            "student_id": req.body["student_id"], "course_period_id": req.body["course_period_id"], "action": "drop"
        })),
        ("GET", "/api/id-card-templates") => envelope(json!([
            { "id": 8, "name": "Day scholar", "orientation": "portrait",
              "primary_color": "red;}body{display:none", "fields": ["student_name", "admission_number"],
              "footer_text": "{{student_name}} & family" }
        ])),
        _ => failure(404, "not found"),
    })
}

#[test]
fn student_export_writes_every_matching_row() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);

    let err = sc.fail("1", "students.exportCsv", json!({}));
    assert_eq!(err["code"], json!("no_context"));
    assert_eq!(backend.count("GET", "/api/students"), 0);

    let _ = sc.ok("2", "context.setSchool", json!({ "schoolId": "s1" }));
    let res = sc.ok("3", "students.exportCsv", json!({ "pageSize": 1 }));
    assert_eq!(res["rowsExported"], json!(2));
    let csv = res["csv"].as_str().expect("csv text");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("Admission No,First Name,Last Name,Grade,Section,Gender,Guardian,Guardian Phone,Status")
    );
    assert_eq!(
        lines.next(),
        Some("ADM-041,Ana <A>,Ruiz,7,B,,\"Maria Ruiz, Sr.\",555-0101,active")
    );
    assert!(res["fileName"].as_str().expect("file name").starts_with("students-"));

    let out = temp_dir("campusd-export").join("nested").join("students.csv");
    let res = sc.ok(
        "4",
        "students.exportCsv",
        json!({ "search": "okafor", "outPath": out.to_string_lossy() }),
    );
    assert_eq!(res["rowsExported"], json!(1));
    assert!(res.get("csv").is_none());
    let written = std::fs::read_to_string(&out).expect("read export");
    assert_eq!(written.lines().count(), 2);
    assert!(written.contains("ADM-042,Ben,Okafor,8"));
    assert_eq!(backend.count("GET", "/api/students"), 1);
}

#[test]
fn attendance_summary_counts_late_as_attended() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("0", "context.setSchool", json!({ "schoolId": "s1" }));

    let res = sc.ok(
        "1",
        "attendance.summary",
        json!({ "start": "2025-03-01", "end": { "year": 2025, "month": 3, "day": 31 } }),
    );
    assert_eq!(res["start"], json!("2025-03-01"));
    assert_eq!(res["end"], json!("2025-03-31"));
    assert_eq!(res["records"], json!(4));
    let summary = &res["summary"];
    assert_eq!(summary["schoolDays"], json!(2));
    assert_eq!(summary["overallPercentage"], json!(75.0));
    assert_eq!(summary["students"][0]["studentName"], json!("Ana Ruiz"));
    assert_eq!(summary["students"][0]["late"], json!(1));
    assert_eq!(summary["students"][0]["percentage"], json!(100.0));
    assert_eq!(summary["students"][1]["studentId"], json!("42"));
    assert_eq!(summary["students"][1]["percentage"], json!(50.0));

    let hit = backend
        .requests()
        .into_iter()
        .find(|r| r.is("GET", "/api/attendance"))
        .expect("attendance fetch");
    assert!(hit.query.contains("start_date=2025-03-01"));
    assert!(hit.query.contains("end_date=2025-03-31"));

    let err = sc.fail("2", "attendance.summary", json!({ "start": "2025-03-31", "end": "2025-03-01" }));
    assert_eq!(err["code"], json!("validation_failed"));
    assert!(err["details"]["fieldErrors"]["end"].is_string());
    let err = sc.fail("3", "attendance.summary", json!({ "start": "2025-03-01" }));
    assert_eq!(err["code"], json!("validation_failed"));
    assert_eq!(backend.count("GET", "/api/attendance"), 1);
}

#[test]
fn dropping_a_student_frees_a_cached_seat() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("0", "context.setSchool", json!({ "schoolId": "s1" }));

    let page = sc.ok("1", "schedule.periods.list", json!({}));
    assert_eq!(page["rows"][0]["enrolled_count"], json!(20));

    let params = json!({ "studentId": 41, "coursePeriodId": 3, "effectiveDate": "2025-03-10" });
    let err = sc.fail("2", "schedule.drop", params.clone());
    assert_eq!(err["code"], json!("confirmation_required"));
    assert_eq!(backend.count("POST", "/api/enrollments/drop"), 0);

    let err = sc.fail(
        "3",
        "schedule.drop",
        json!({ "coursePeriodId": 3, "effectiveDate": "2025-03-10", "confirm": true }),
    );
    assert_eq!(err["code"], json!("validation_failed"));
    assert!(err["details"]["fieldErrors"]["student_id"].is_string());

    let mut confirmed = params;
    confirmed["confirm"] = json!(true);
    let res = sc.ok("4", "schedule.drop", confirmed);
    assert_eq!(res["toast"]["message"], json!("Student dropped from course"));
    assert_eq!(res["closeModal"], json!(true));
    let posted = backend
        .requests()
        .into_iter()
        .find(|r| r.is("POST", "/api/enrollments/drop"))
        .expect("drop request");
    assert_eq!(posted.body["student_id"], json!("41"));
    assert_eq!(posted.body["course_period_id"], json!("3"));
    assert_eq!(posted.body["effective_date"], json!("2025-03-10"));
    assert_eq!(posted.body["school_id"], json!("s1"));

    let page = sc.ok("5", "schedule.periods.list", json!({}));
    assert_eq!(page["rows"][0]["enrolled_count"], json!(19));
    assert_eq!(backend.count("GET", "/api/course-periods"), 1);
}

#[test]
fn card_preview_fills_student_values_safely() {
    let backend = backend();
    let mut sc = Sidecar::spawn(&backend.url);
    let _ = sc.ok("0", "context.setSchool", json!({ "schoolId": "s1" }));
    let _ = sc.ok("1", "idCards.templates.list", json!({}));

    let err = sc.fail("2", "idCards.templates.preview", json!({ "templateId": 8, "studentId": 41 }));
    assert_eq!(err["code"], json!("not_found"));

    let _ = sc.ok("3", "students.list", json!({}));
    let res = sc.ok(
        "4",
        "idCards.templates.preview",
        json!({ "templateId": 8, "studentId": 41, "print": true, "values": { "school_name": "Maple High" } }),
    );
    assert_eq!(res["print"], json!(true));
    assert_eq!(res["template"]["name"], json!("Day scholar"));
    let html = res["html"].as_str().expect("html");
    assert!(html.contains("background:#1e3a8a"));
    assert!(!html.contains("display:none"));
    assert!(html.contains("<div class=\"band\">Maple High</div>"));
    assert!(html.contains("<dd>Ana &lt;A&gt; Ruiz</dd>"));
    assert!(html.contains("<dd>ADM-041</dd>"));
    assert!(html.contains("<div class=\"foot\">Ana &lt;A&gt; Ruiz &amp; family</div>"));
    assert_eq!(backend.count("GET", "/api/id-card-templates"), 1);
}
