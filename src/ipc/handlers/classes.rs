use crate::calc;
use crate::db::{self, SqliteStore};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{date_or_today, json_value, optional_str, required_str, scope, with_workspace};
use crate::ipc::types::{AppState, Request};
use crate::store::{ClassEntity, RecordStore};
use rusqlite::Connection;
use serde_json::{json, Value};

const CLASS_TREND_DAYS: u32 = 7;

fn classes_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let classes = SqliteStore::new(conn)
        .list_classes()
        .map_err(HandlerErr::query_failed)?;
    Ok(json!({ "classes": classes }))
}

fn classes_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let semester = match params.get("semester").filter(|v| !v.is_null()) {
        None => 1,
        Some(v) => v
            .as_i64()
            .filter(|s| *s >= 1)
            .ok_or_else(|| HandlerErr::bad_params("semester must be a positive integer"))?,
    };
    let class = ClassEntity {
        id: optional_str(params, "id").unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: required_str(params, "name")?,
        department: optional_str(params, "department").unwrap_or_default(),
        semester,
        section: optional_str(params, "section").unwrap_or_else(|| "A".to_string()),
    };
    db::insert_class(conn, &class).map_err(HandlerErr::update_failed)?;
    Ok(json!({ "classId": class.id }))
}

fn class_summary(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = date_or_today(params, "date")?;
    let (kind, period) = scope(params)?;
    let summary = calc::class_summary(&SqliteStore::new(conn), &class_id, date, kind, period)
        .map_err(HandlerErr::query_failed)?;
    json_value(&summary)
}

/// Summary, per-student status and the last week of day attendance, oldest first.
fn class_details(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let store = SqliteStore::new(conn);
    let class_id = required_str(params, "classId")?;
    let date = date_or_today(params, "date")?;
    let (kind, period) = scope(params)?;
    let class = store
        .get_class(&class_id)
        .map_err(HandlerErr::query_failed)?
        .ok_or_else(|| HandlerErr::not_found(format!("class not found: {}", class_id)))?;

    let summary = calc::class_summary(&store, &class.id, date, kind, period)
        .map_err(HandlerErr::query_failed)?;
    let students = calc::roster_status(&store, &class.id, date).map_err(HandlerErr::query_failed)?;
    let mut trend = calc::class_trend(&store, &class.id, date, CLASS_TREND_DAYS)
        .map_err(HandlerErr::query_failed)?;
    trend.reverse();

    Ok(json!({
        "class": class,
        "date": date,
        "summary": summary,
        "students": students,
        "trend": trend,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(with_workspace(state, req, classes_list)),
        "classes.create" => Some(with_workspace(state, req, classes_create)),
        "class.summary" => Some(with_workspace(state, req, class_summary)),
        "class.details" => Some(with_workspace(state, req, class_details)),
        _ => None,
    }
}
