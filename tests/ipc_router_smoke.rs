mod test_support;

use serde_json::json;
use test_support::Sidecar;

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let mut s = Sidecar::spawn();

    let health = s.ok("health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert_eq!(s.error_code("classes.list", json!({})), "no_workspace");

    let workspace = test_support::temp_dir("attendanced-router-smoke");
    s.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
    assert!(workspace.join("attendance.sqlite3").is_file());

    s.seed_class("CS2A", "2nd Year Computer Science A", 3);
    let date = "2024-01-15";

    let calls = [
        ("setup.get", json!({})),
        ("setup.update", json!({ "section": "analytics", "patch": { "chartDays": 10 } })),
        ("users.list", json!({})),
        ("staff.dashboard", json!({ "userId": "staff1", "date": date })),
        ("classes.list", json!({})),
        ("students.list", json!({ "classId": "CS2A" })),
        ("students.search", json!({ "text": "student" })),
        (
            "attendance.submit",
            json!({ "classId": "CS2A", "date": date, "markedBy": "staff1",
                    "records": [{ "studentId": "CS2A-1", "status": "present" }] }),
        ),
        ("attendance.status", json!({ "classId": "CS2A", "date": date })),
        ("attendance.records", json!({ "classId": "CS2A", "date": date })),
        ("attendance.latecomerCandidates", json!({ "classId": "CS2A", "date": date })),
        (
            "attendance.submitLatecomers",
            json!({ "classId": "CS2A", "date": date, "markedBy": "staff1", "studentIds": ["CS2A-2"] }),
        ),
        ("attendance.lock", json!({ "classId": "CS2A", "date": date })),
        ("class.summary", json!({ "classId": "CS2A", "date": date })),
        ("class.details", json!({ "classId": "CS2A", "date": date })),
        ("student.details", json!({ "studentId": "CS2A-1", "today": date })),
        ("department.summary", json!({ "date": date })),
        ("analytics.trend", json!({ "date": date })),
        ("analytics.weekdays", json!({ "date": date })),
        ("analytics.forecast", json!({ "date": date })),
        ("analytics.rankings", json!({ "date": date })),
        ("analytics.bestClasses", json!({ "date": date })),
        ("assistant.query", json!({ "text": "help", "today": date })),
        ("assistant.context", json!({})),
    ];
    for (method, params) in calls {
        s.ok(method, params);
    }

    let records = s.ok("attendance.records", json!({ "classId": "CS2A", "date": date }));
    let record_id = records["records"][0]["id"].as_str().expect("record id").to_string();
    s.ok(
        "attendance.updateRecord",
        json!({ "recordId": record_id, "patch": { "isLate": true } }),
    );

    assert_eq!(s.error_code("nope.method", json!({})), "not_implemented");
}

#[test]
fn malformed_lines_get_bad_json_without_id() {
    let mut s = Sidecar::spawn();
    let resp = s.send_line("{not json");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("bad_json"));
    assert!(resp.get("id").is_none());

    // The process keeps serving after a bad line.
    s.ok("health", json!({}));
}
