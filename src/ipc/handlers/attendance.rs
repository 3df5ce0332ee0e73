use crate::db::SqliteStore;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    date_or_today, optional_date, optional_str, required_str, scope, with_workspace,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{
    AttendanceKind, AttendanceRecord, AttendanceStatus, RecordFilter, RecordPatch, RecordStore,
    Student,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

/// One (class, date, kind, period) submission key.
struct Group {
    class_id: String,
    date: NaiveDate,
    kind: AttendanceKind,
    period: Option<u32>,
}

fn group_params(params: &Value) -> Result<Group, HandlerErr> {
    let (kind, period) = scope(params)?;
    Ok(Group {
        class_id: required_str(params, "classId")?,
        date: date_or_today(params, "date")?,
        kind,
        period,
    })
}

/// Submissions need a concrete period for period attendance.
fn submission_group(params: &Value) -> Result<Group, HandlerErr> {
    let group = group_params(params)?;
    if group.kind == AttendanceKind::Period && group.period.is_none() {
        return Err(HandlerErr::bad_params("period is required for period attendance"));
    }
    Ok(group)
}

fn new_record(
    group: &Group,
    student_id: &str,
    status: AttendanceStatus,
    is_late: bool,
    marked_by: &str,
) -> AttendanceRecord {
    AttendanceRecord {
        id: uuid::Uuid::new_v4().to_string(),
        class_id: group.class_id.clone(),
        date: group.date,
        kind: group.kind,
        period: group.period,
        student_id: student_id.to_string(),
        status,
        is_late,
        marked_by: marked_by.to_string(),
        locked: true,
        created_at: chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S").to_string(),
        submitted_as: group.kind,
    }
}

fn roster_ids(store: &SqliteStore<'_>, group: &Group) -> Result<HashSet<String>, HandlerErr> {
    if store
        .get_class(&group.class_id)
        .map_err(HandlerErr::query_failed)?
        .is_none()
    {
        return Err(HandlerErr::not_found(format!("class not found: {}", group.class_id)));
    }
    Ok(store
        .list_students(&group.class_id)
        .map_err(HandlerErr::query_failed)?
        .into_iter()
        .map(|s| s.id)
        .collect())
}

/// Students with a present record in the group. Latecomers are drawn from everyone else.
fn present_ids(store: &SqliteStore<'_>, group: &Group) -> Result<HashSet<String>, HandlerErr> {
    Ok(store
        .get_records(&RecordFilter::group(
            &group.class_id,
            group.date,
            group.kind,
            group.period,
        ))
        .map_err(HandlerErr::query_failed)?
        .into_iter()
        .filter(|r| r.is_present())
        .map(|r| r.student_id)
        .collect())
}

fn require_locked(store: &SqliteStore<'_>, group: &Group) -> Result<(), HandlerErr> {
    if !is_locked(store, group)? {
        return Err(HandlerErr::new(
            "not_locked",
            "submit attendance for this class and date before marking latecomers",
        ));
    }
    Ok(())
}

fn is_locked(store: &SqliteStore<'_>, group: &Group) -> Result<bool, HandlerErr> {
    store
        .is_group_locked(&group.class_id, group.date, group.kind, group.period)
        .map_err(HandlerErr::query_failed)
}

fn attendance_records(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let kind = match optional_str(params, "kind") {
        Some(_) => Some(scope(params)?),
        None => None,
    };
    let filter = RecordFilter {
        class_id: optional_str(params, "classId"),
        date: optional_date(params, "date")?,
        kind: kind.map(|(k, _)| k),
        period: kind.and_then(|(_, p)| p),
    };
    let records = SqliteStore::new(conn)
        .get_records(&filter)
        .map_err(HandlerErr::query_failed)?;
    Ok(json!({ "records": records }))
}

fn attendance_status(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let group = group_params(params)?;
    let locked = is_locked(&SqliteStore::new(conn), &group)?;
    Ok(json!({ "locked": locked }))
}

/// Primary submission. Covers the whole roster; students missing from `records` are
/// written absent. Everything written is locked.
fn attendance_submit(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let store = SqliteStore::new(conn);
    let group = submission_group(params)?;
    let marked_by = required_str(params, "markedBy")?;
    let roster = roster_ids(&store, &group)?;

    let mut statuses: HashMap<String, AttendanceStatus> = HashMap::new();
    if let Some(entries) = params.get("records").filter(|v| !v.is_null()) {
        let entries = entries
            .as_array()
            .ok_or_else(|| HandlerErr::bad_params("records must be an array"))?;
        for entry in entries {
            let student_id = required_str(entry, "studentId")?;
            if !roster.contains(&student_id) {
                return Err(HandlerErr::bad_params(format!(
                    "student {} is not in class {}",
                    student_id, group.class_id
                )));
            }
            let status = entry
                .get("status")
                .and_then(|v| v.as_str())
                .and_then(AttendanceStatus::parse)
                .ok_or_else(|| HandlerErr::bad_params("status must be present or absent"))?;
            statuses.insert(student_id, status);
        }
    }

    if is_locked(&store, &group)? {
        return Err(HandlerErr::new(
            "attendance_locked",
            "attendance is already locked for this class and date",
        ));
    }

    let mut ids: Vec<&String> = roster.iter().collect();
    ids.sort();
    let records: Vec<AttendanceRecord> = ids
        .into_iter()
        .map(|id| {
            let status = statuses.get(id).copied().unwrap_or(AttendanceStatus::Absent);
            new_record(&group, id, status, false, &marked_by)
        })
        .collect();
    store
        .append_records(&records)
        .map_err(HandlerErr::update_failed)?;

    let present = records.iter().filter(|r| r.is_present()).count();
    tracing::info!(
        class = %group.class_id,
        date = %group.date,
        kind = group.kind.as_str(),
        period = ?group.period,
        count = records.len(),
        "attendance submitted"
    );
    Ok(json!({
        "written": records.len(),
        "present": present,
        "absent": records.len() - present,
    }))
}

/// Latecomers are only accepted once the primary submission has locked the group, and
/// only for students without a present record in it.
fn attendance_submit_latecomers(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let store = SqliteStore::new(conn);
    let group = submission_group(params)?;
    let marked_by = required_str(params, "markedBy")?;
    let roster = roster_ids(&store, &group)?;

    let student_ids: Vec<String> = match params.get("studentIds") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|_| HandlerErr::bad_params("studentIds must be an array of strings"))?,
        None => return Err(HandlerErr::bad_params("missing studentIds")),
    };
    if let Some(unknown) = student_ids.iter().find(|id| !roster.contains(*id)) {
        return Err(HandlerErr::bad_params(format!(
            "student {} is not in class {}",
            unknown, group.class_id
        )));
    }

    require_locked(&store, &group)?;
    let present = present_ids(&store, &group)?;
    if let Some(on_time) = student_ids.iter().find(|id| present.contains(*id)) {
        return Err(HandlerErr::new(
            "already_present",
            format!("student {} is already marked present", on_time),
        ));
    }

    let records: Vec<AttendanceRecord> = student_ids
        .iter()
        .map(|id| new_record(&group, id, AttendanceStatus::Present, true, &marked_by))
        .collect();
    store
        .append_records(&records)
        .map_err(HandlerErr::update_failed)?;
    tracing::info!(
        class = %group.class_id,
        date = %group.date,
        kind = group.kind.as_str(),
        period = ?group.period,
        count = records.len(),
        "latecomers submitted"
    );
    Ok(json!({ "written": records.len() }))
}

/// Roster students still eligible for latecomer marking, in roll order.
fn attendance_latecomer_candidates(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let store = SqliteStore::new(conn);
    let group = submission_group(params)?;
    roster_ids(&store, &group)?;
    require_locked(&store, &group)?;
    let present = present_ids(&store, &group)?;
    let mut students: Vec<Student> = store
        .list_students(&group.class_id)
        .map_err(HandlerErr::query_failed)?
        .into_iter()
        .filter(|s| !present.contains(&s.id))
        .collect();
    students.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));
    Ok(json!({
        "classId": group.class_id,
        "date": group.date,
        "students": students,
    }))
}

fn attendance_lock(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let group = group_params(params)?;
    let changed = SqliteStore::new(conn)
        .lock_group(&group.class_id, group.date, group.kind, group.period)
        .map_err(HandlerErr::update_failed)?;
    tracing::info!(
        class = %group.class_id,
        date = %group.date,
        kind = group.kind.as_str(),
        period = ?group.period,
        count = changed,
        "attendance group locked"
    );
    Ok(json!({ "locked": changed }))
}

/// A patch may lock a record but never unlock it.
fn attendance_update_record(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let record_id = required_str(params, "recordId")?;
    let patch: RecordPatch = match params.get("patch") {
        Some(v) if v.is_object() => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid patch: {}", e)))?,
        _ => return Err(HandlerErr::bad_params("patch must be an object")),
    };
    if patch.is_empty() {
        return Err(HandlerErr::bad_params("patch has no fields"));
    }
    if patch.locked == Some(false) {
        return Err(HandlerErr::bad_params("records cannot be unlocked"));
    }
    let found = SqliteStore::new(conn)
        .patch_record(&record_id, &patch)
        .map_err(HandlerErr::update_failed)?;
    if !found {
        return Err(HandlerErr::not_found(format!("record not found: {}", record_id)));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.records" => Some(with_workspace(state, req, attendance_records)),
        "attendance.status" => Some(with_workspace(state, req, attendance_status)),
        "attendance.submit" => Some(with_workspace(state, req, attendance_submit)),
        "attendance.submitLatecomers" => {
            Some(with_workspace(state, req, attendance_submit_latecomers))
        }
        "attendance.latecomerCandidates" => {
            Some(with_workspace(state, req, attendance_latecomer_candidates))
        }
        "attendance.lock" => Some(with_workspace(state, req, attendance_lock)),
        "attendance.updateRecord" => Some(with_workspace(state, req, attendance_update_record)),
        _ => None,
    }
}
