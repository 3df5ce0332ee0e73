use crate::config::{self, SetupSection};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{required_str, with_workspace};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn setup_get(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let settings = config::load_settings(conn).map_err(HandlerErr::query_failed)?;
    Ok(json!({
        "analytics": config::section_json(&settings, SetupSection::Analytics)
            .map_err(HandlerErr::query_failed)?,
        "insights": config::section_json(&settings, SetupSection::Insights)
            .map_err(HandlerErr::query_failed)?,
    }))
}

fn setup_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let section_raw = required_str(params, "section")?;
    let section = SetupSection::parse(&section_raw)
        .ok_or_else(|| HandlerErr::bad_params("unknown section"))?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let mut settings = config::load_settings(conn).map_err(HandlerErr::query_failed)?;
    config::merge_section_patch(&mut settings, section, patch).map_err(HandlerErr::bad_params)?;
    config::save_section(conn, &settings, section).map_err(HandlerErr::update_failed)?;
    tracing::info!(section = section.key(), "settings updated");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(with_workspace(state, req, setup_get)),
        "setup.update" => Some(with_workspace(state, req, setup_update)),
        _ => None,
    }
}
