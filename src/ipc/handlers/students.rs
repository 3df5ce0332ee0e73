use crate::calc;
use crate::config;
use crate::db::{self, SqliteStore};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{date_or_today, optional_str, required_str, with_workspace};
use crate::ipc::types::{AppState, Request};
use crate::store::{RecordStore, Student};
use rusqlite::Connection;
use serde_json::{json, Value};

const MIN_SEARCH_CHARS: usize = 2;
const DAILY_HISTORY_LIMIT: usize = 20;

fn students_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let students = SqliteStore::new(conn)
        .list_students(&class_id)
        .map_err(HandlerErr::query_failed)?;
    Ok(json!({ "students": students }))
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student = Student {
        id: optional_str(params, "id").unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        roll_number: required_str(params, "rollNumber")?,
        name: required_str(params, "name")?,
        class_id: required_str(params, "classId")?,
        email: optional_str(params, "email").unwrap_or_default(),
        phone: optional_str(params, "phone").unwrap_or_default(),
    };
    db::insert_student(conn, &student).map_err(HandlerErr::update_failed)?;
    Ok(json!({ "studentId": student.id }))
}

/// Queries shorter than two characters return no matches.
fn students_search(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let text = optional_str(params, "text").unwrap_or_default();
    if text.chars().count() < MIN_SEARCH_CHARS {
        return Ok(json!({ "students": [] }));
    }
    let students = SqliteStore::new(conn)
        .search_students(&text)
        .map_err(HandlerErr::query_failed)?;
    Ok(json!({ "students": students }))
}

fn student_details(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let store = SqliteStore::new(conn);
    let student_id = required_str(params, "studentId")?;
    let today = date_or_today(params, "today")?;
    let settings = config::load_settings(conn).map_err(HandlerErr::query_failed)?;

    let student = store
        .get_student(&student_id)
        .map_err(HandlerErr::query_failed)?
        .ok_or_else(|| HandlerErr::not_found(format!("student not found: {}", student_id)))?;
    let class = store
        .get_class(&student.class_id)
        .map_err(HandlerErr::query_failed)?;

    let lookback = settings.analytics.student_lookback_days;
    let start = today - chrono::Duration::days(lookback as i64);
    let history = store
        .get_student_history(&student.id, start, today)
        .map_err(HandlerErr::query_failed)?;

    Ok(json!({
        "student": student,
        "class": class,
        "stats": calc::student_stats(&history),
        "daily": calc::daily_attendance(&history, DAILY_HISTORY_LIMIT),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_workspace(state, req, students_list)),
        "students.create" => Some(with_workspace(state, req, students_create)),
        "students.search" => Some(with_workspace(state, req, students_search)),
        "student.details" => Some(with_workspace(state, req, student_details)),
        _ => None,
    }
}
