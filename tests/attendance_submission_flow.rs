mod test_support;

use serde_json::json;
use test_support::Sidecar;

#[test]
fn primary_submission_locks_and_fills_roster() {
    let mut s = Sidecar::with_workspace("attendanced-submit");
    s.seed_class("CS2A", "2nd Year Computer Science A", 5);

    let submitted = s.submit("CS2A", "2024-01-15", 3);
    assert_eq!(submitted["written"], json!(5));
    assert_eq!(submitted["present"], json!(3));
    assert_eq!(submitted["absent"], json!(2));

    let status = s.ok(
        "attendance.status",
        json!({ "classId": "CS2A", "date": "2024-01-15", "kind": "day" }),
    );
    assert_eq!(status["locked"], json!(true));

    let code = s.error_code(
        "attendance.submit",
        json!({ "classId": "CS2A", "date": "2024-01-15", "markedBy": "staff1", "records": [] }),
    );
    assert_eq!(code, "attendance_locked");

    let records = s.ok("attendance.records", json!({ "classId": "CS2A", "date": "2024-01-15" }));
    let records = records["records"].as_array().expect("records");
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r["locked"] == json!(true)));
}

#[test]
fn latecomers_require_a_locked_group() {
    let mut s = Sidecar::with_workspace("attendanced-latecomers");
    s.seed_class("CS2A", "2nd Year Computer Science A", 5);

    let params = json!({
        "classId": "CS2A",
        "date": "2024-01-15",
        "markedBy": "staff1",
        "studentIds": ["CS2A-4"]
    });
    assert_eq!(s.error_code("attendance.submitLatecomers", params.clone()), "not_locked");

    s.submit("CS2A", "2024-01-15", 3);
    let written = s.ok("attendance.submitLatecomers", params);
    assert_eq!(written["written"], json!(1));

    let summary = s.ok("class.summary", json!({ "classId": "CS2A", "date": "2024-01-15" }));
    assert_eq!(summary["totalStudents"], json!(5));
    assert_eq!(summary["present"], json!(4));
    assert_eq!(summary["absent"], json!(1));
    assert_eq!(summary["late"], json!(1));
    assert_eq!(summary["percentage"], json!(80.0));
    assert_eq!(summary["locked"], json!(true));
    assert_eq!(summary["markedByUser"], json!("Prof. John Smith"));

    let unknown = s.error_code(
        "attendance.submitLatecomers",
        json!({ "classId": "CS2A", "date": "2024-01-15", "markedBy": "staff1",
                "studentIds": ["nobody"] }),
    );
    assert_eq!(unknown, "bad_params");
}

#[test]
fn latecomers_are_drawn_from_absent_students() {
    let mut s = Sidecar::with_workspace("attendanced-late-candidates");
    s.seed_class("CS2A", "2nd Year Computer Science A", 5);

    let group = json!({ "classId": "CS2A", "date": "2024-01-15" });
    assert_eq!(s.error_code("attendance.latecomerCandidates", group.clone()), "not_locked");

    s.submit("CS2A", "2024-01-15", 3);
    let candidates = s.ok("attendance.latecomerCandidates", group.clone());
    let ids: Vec<&str> = candidates["students"]
        .as_array()
        .expect("students")
        .iter()
        .filter_map(|st| st["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["CS2A-4", "CS2A-5"]);

    let on_time = s.error_code(
        "attendance.submitLatecomers",
        json!({ "classId": "CS2A", "date": "2024-01-15", "markedBy": "staff1",
                "studentIds": ["CS2A-1"] }),
    );
    assert_eq!(on_time, "already_present");
    let summary = s.ok("class.summary", group.clone());
    assert_eq!(summary["present"], json!(3));
    assert_eq!(summary["late"], json!(0));

    s.ok(
        "attendance.submitLatecomers",
        json!({ "classId": "CS2A", "date": "2024-01-15", "markedBy": "staff1",
                "studentIds": ["CS2A-5"] }),
    );
    let candidates = s.ok("attendance.latecomerCandidates", group);
    assert_eq!(candidates["students"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(candidates["students"][0]["id"], json!("CS2A-4"));
}

#[test]
fn period_groups_lock_independently() {
    let mut s = Sidecar::with_workspace("attendanced-periods");
    s.seed_class("CS2A", "2nd Year Computer Science A", 2);

    assert_eq!(
        s.error_code(
            "attendance.submit",
            json!({ "classId": "CS2A", "date": "2024-01-15", "kind": "period", "markedBy": "staff1" }),
        ),
        "bad_params"
    );

    s.ok(
        "attendance.submit",
        json!({ "classId": "CS2A", "date": "2024-01-15", "kind": "period", "period": 2,
                "markedBy": "staff1",
                "records": [{ "studentId": "CS2A-1", "status": "present" }] }),
    );
    let p2 = s.ok(
        "attendance.status",
        json!({ "classId": "CS2A", "date": "2024-01-15", "kind": "period", "period": 2 }),
    );
    let p3 = s.ok(
        "attendance.status",
        json!({ "classId": "CS2A", "date": "2024-01-15", "kind": "period", "period": 3 }),
    );
    let day = s.ok("attendance.status", json!({ "classId": "CS2A", "date": "2024-01-15" }));
    assert_eq!(p2["locked"], json!(true));
    assert_eq!(p3["locked"], json!(false));
    assert_eq!(day["locked"], json!(false));

    let summary = s.ok(
        "class.summary",
        json!({ "classId": "CS2A", "date": "2024-01-15", "kind": "period", "period": 2 }),
    );
    assert_eq!(summary["present"], json!(1));
    assert_eq!(summary["percentage"], json!(50.0));
}

#[test]
fn record_patches_never_unlock() {
    let mut s = Sidecar::with_workspace("attendanced-patch");
    s.seed_class("CS2A", "2nd Year Computer Science A", 2);
    s.submit("CS2A", "2024-01-15", 1);

    let records = s.ok("attendance.records", json!({ "classId": "CS2A", "date": "2024-01-15" }));
    let id = records["records"][0]["id"].as_str().expect("id").to_string();

    assert_eq!(
        s.error_code(
            "attendance.updateRecord",
            json!({ "recordId": id, "patch": { "locked": false } }),
        ),
        "bad_params"
    );
    assert_eq!(
        s.error_code(
            "attendance.updateRecord",
            json!({ "recordId": "missing", "patch": { "status": "absent" } }),
        ),
        "not_found"
    );
    s.ok(
        "attendance.updateRecord",
        json!({ "recordId": id, "patch": { "status": "absent", "locked": true } }),
    );

    let summary = s.ok("class.summary", json!({ "classId": "CS2A", "date": "2024-01-15" }));
    assert_eq!(summary["present"], json!(0));
}

#[test]
fn class_details_include_roster_and_week_trend() {
    let mut s = Sidecar::with_workspace("attendanced-details");
    s.seed_class("CS2A", "2nd Year Computer Science A", 4);
    s.submit("CS2A", "2024-01-14", 2);
    s.submit("CS2A", "2024-01-15", 4);

    let details = s.ok("class.details", json!({ "classId": "CS2A", "date": "2024-01-15" }));
    let students = details["students"].as_array().expect("students");
    assert_eq!(students.len(), 4);
    assert!(students.iter().all(|st| st["status"] == json!("present")));

    let trend = details["trend"].as_array().expect("trend");
    assert_eq!(trend.len(), 7);
    assert_eq!(trend[0]["date"], json!("2024-01-09"));
    assert_eq!(trend[5]["percentage"], json!(50.0));
    assert_eq!(trend[6]["percentage"], json!(100.0));

    assert_eq!(
        s.error_code("class.details", json!({ "classId": "missing" })),
        "not_found"
    );

    let student = s.ok("student.details", json!({ "studentId": "CS2A-3", "today": "2024-01-15" }));
    assert_eq!(student["stats"]["totalDays"], json!(2));
    assert_eq!(student["stats"]["presentDays"], json!(1));
    assert_eq!(student["daily"][0]["date"], json!("2024-01-15"));
}
