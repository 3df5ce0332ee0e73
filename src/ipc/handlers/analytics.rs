use crate::calc;
use crate::config;
use crate::db::SqliteStore;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{date_or_today, f64_or, json_value, scope, u32_or, with_workspace};
use crate::ipc::types::{AppState, Request};
use crate::store::AttendanceKind;
use chrono::Duration;
use rusqlite::Connection;
use serde_json::{json, Value};

const MAX_SERIES_DAYS: u32 = 366;
const DIRECTION_WINDOW: usize = 7;

/// `dayOverDay` compares each class against the previous day's day attendance,
/// whatever kind the summary itself uses.
fn department_summary(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let store = SqliteStore::new(conn);
    let date = date_or_today(params, "date")?;
    let (kind, period) = scope(params)?;
    let summary =
        calc::department_summary(&store, date, kind, period).map_err(HandlerErr::query_failed)?;
    let previous = calc::department_summary(
        &store,
        date - Duration::days(1),
        AttendanceKind::Day,
        Some(1),
    )
    .map_err(HandlerErr::query_failed)?;
    let mut out = json_value(&summary)?;
    out["dayOverDay"] = json_value(&calc::day_over_day(&summary, &previous))?;
    Ok(out)
}

fn analytics_trend(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let settings = config::load_settings(conn).map_err(HandlerErr::query_failed)?;
    let date = date_or_today(params, "date")?;
    let days = u32_or(params, "days", settings.analytics.trend_days, 1, MAX_SERIES_DAYS)?;
    let (kind, period) = scope(params)?;
    let series = calc::trend_series(&SqliteStore::new(conn), date, days, kind, period)
        .map_err(HandlerErr::query_failed)?;
    let nonzero = calc::nonzero_percentages(&series);
    let window = &nonzero[..nonzero.len().min(DIRECTION_WINDOW)];
    Ok(json!({
        "series": series,
        "average": calc::round_to(calc::mean(&nonzero), 2),
        "direction": calc::trend_direction(window),
    }))
}

fn analytics_weekdays(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let settings = config::load_settings(conn).map_err(HandlerErr::query_failed)?;
    let date = date_or_today(params, "date")?;
    let days = u32_or(params, "days", settings.analytics.trend_days, 1, MAX_SERIES_DAYS)?;
    let series = calc::trend_series(&SqliteStore::new(conn), date, days, AttendanceKind::Day, None)
        .map_err(HandlerErr::query_failed)?;
    json_value(&calc::weekday_pattern(&series))
}

/// `forecast` is null when fewer than three days carry data.
fn analytics_forecast(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let settings = config::load_settings(conn).map_err(HandlerErr::query_failed)?;
    let date = date_or_today(params, "date")?;
    let days = u32_or(params, "days", settings.analytics.history_days, 1, MAX_SERIES_DAYS)?;
    let horizon = u32_or(
        params,
        "horizon",
        settings.analytics.forecast_horizon_days,
        1,
        30,
    )?;
    let series = calc::trend_series(&SqliteStore::new(conn), date, days, AttendanceKind::Day, None)
        .map_err(HandlerErr::query_failed)?;
    let history = calc::nonzero_percentages(&series);
    Ok(json!({
        "dataPoints": history.len(),
        "forecast": calc::forecast(&history, horizon, date),
    }))
}

fn analytics_rankings(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let date = date_or_today(params, "date")?;
    let (kind, period) = scope(params)?;
    let ranking = calc::class_ranking(&SqliteStore::new(conn), date, kind, period)
        .map_err(HandlerErr::query_failed)?;
    json_value(&ranking)
}

fn analytics_best_classes(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let settings = config::load_settings(conn).map_err(HandlerErr::query_failed)?;
    let date = date_or_today(params, "date")?;
    let margin = f64_or(params, "margin", settings.insights.top_class_margin)?;
    let classes = calc::best_performing_classes(&SqliteStore::new(conn), date, margin)
        .map_err(HandlerErr::query_failed)?;
    Ok(json!({ "date": date, "classes": classes }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "department.summary" => Some(with_workspace(state, req, department_summary)),
        "analytics.trend" => Some(with_workspace(state, req, analytics_trend)),
        "analytics.weekdays" => Some(with_workspace(state, req, analytics_weekdays)),
        "analytics.forecast" => Some(with_workspace(state, req, analytics_forecast)),
        "analytics.rankings" => Some(with_workspace(state, req, analytics_rankings)),
        "analytics.bestClasses" => Some(with_workspace(state, req, analytics_best_classes)),
        _ => None,
    }
}
