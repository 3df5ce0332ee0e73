use crate::calc;
use crate::db::{self, SqliteStore};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{date_or_today, optional_str, required_str, with_workspace};
use crate::ipc::types::{AppState, Request};
use crate::store::{AttendanceKind, RecordStore, StaffUser};
use rusqlite::Connection;
use serde_json::{json, Value};

fn users_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let assigned_classes = match params.get("assignedClasses") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value::<Vec<String>>(v.clone())
            .map_err(|_| HandlerErr::bad_params("assignedClasses must be an array of strings"))?,
    };
    let user = StaffUser {
        id: optional_str(params, "id").unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        username: required_str(params, "username")?,
        name: required_str(params, "name")?,
        role: optional_str(params, "role").unwrap_or_else(|| "staff".to_string()),
        assigned_classes,
    };
    db::upsert_user(conn, &user).map_err(HandlerErr::update_failed)?;
    Ok(json!({ "userId": user.id }))
}

fn users_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let users = db::list_users(conn).map_err(HandlerErr::query_failed)?;
    Ok(json!({ "users": users }))
}

/// Day summaries for the classes assigned to one staff user. Assigned ids with no
/// matching class are skipped.
fn staff_dashboard(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let store = SqliteStore::new(conn);
    let user_id = required_str(params, "userId")?;
    let date = date_or_today(params, "date")?;
    let user = store
        .get_user(&user_id)
        .map_err(HandlerErr::query_failed)?
        .ok_or_else(|| HandlerErr::not_found(format!("user not found: {}", user_id)))?;

    let mut classes = Vec::new();
    for class_id in &user.assigned_classes {
        if store
            .get_class(class_id)
            .map_err(HandlerErr::query_failed)?
            .is_none()
        {
            continue;
        }
        classes.push(
            calc::class_summary(&store, class_id, date, AttendanceKind::Day, Some(1))
                .map_err(HandlerErr::query_failed)?,
        );
    }
    Ok(json!({
        "user": user,
        "date": date,
        "classes": classes,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(with_workspace(state, req, users_create)),
        "users.list" => Some(with_workspace(state, req, users_list)),
        "staff.dashboard" => Some(with_workspace(state, req, staff_dashboard)),
        _ => None,
    }
}
