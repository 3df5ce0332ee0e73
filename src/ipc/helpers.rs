use super::error::{err, ok, HandlerErr};
use super::types::{AppState, Request};
use crate::store::AttendanceKind;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::Value;

/// Runs `f` against the open workspace, mapping the outcome to a response line.
pub fn with_workspace<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> Result<Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn parse_date(raw: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

/// `params[key]` as a date, or the local date when absent.
pub fn date_or_today(params: &Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    match optional_str(params, key) {
        Some(raw) => parse_date(&raw, key),
        None => Ok(local_today()),
    }
}

pub fn optional_date(params: &Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    optional_str(params, key)
        .map(|raw| parse_date(&raw, key))
        .transpose()
}

pub fn u32_or(params: &Value, key: &str, default: u32, min: u32, max: u32) -> Result<u32, HandlerErr> {
    let Some(v) = params.get(key).filter(|v| !v.is_null()) else {
        return Ok(default);
    };
    let n = v
        .as_u64()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key)))?;
    if n < min as u64 || n > max as u64 {
        return Err(HandlerErr::bad_params(format!(
            "{} must be in {}..={}",
            key, min, max
        )));
    }
    Ok(n as u32)
}

pub fn f64_or(params: &Value, key: &str, default: f64) -> Result<f64, HandlerErr> {
    match params.get(key).filter(|v| !v.is_null()) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

/// `kind` (default day) and `period`. Day attendance is the period-1 marker, so a day
/// scope always carries period 1; a period scope may leave it open.
pub fn scope(params: &Value) -> Result<(AttendanceKind, Option<u32>), HandlerErr> {
    let kind = match optional_str(params, "kind") {
        Some(raw) => AttendanceKind::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params("kind must be day or period"))?,
        None => AttendanceKind::Day,
    };
    let period = match params.get("period").filter(|v| !v.is_null()) {
        None => None,
        Some(v) => {
            let p = v
                .as_u64()
                .filter(|p| (1..=24).contains(p))
                .ok_or_else(|| HandlerErr::bad_params("period must be an integer in 1..=24"))?;
            Some(p as u32)
        }
    };
    Ok(match kind {
        AttendanceKind::Day => (kind, Some(1)),
        AttendanceKind::Period => (kind, period),
    })
}

pub fn json_value<T: serde::Serialize>(value: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(HandlerErr::serialize_failed)
}
