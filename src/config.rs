use crate::db;
use clap::Parser;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "attendanced", version, about = "Attendance analytics sidecar (JSON lines over stdio)")]
pub struct Args {
    /// Workspace directory to open at startup.
    #[arg(long, env = "ATTENDANCED_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log filter, `EnvFilter` syntax. Logs go to stderr.
    #[arg(long, env = "ATTENDANCED_LOG", default_value = "info")]
    pub log: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSection {
    Analytics,
    Insights,
}

impl SetupSection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analytics" => Some(Self::Analytics),
            "insights" => Some(Self::Insights),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Analytics => "setup.analytics",
            Self::Insights => "setup.insights",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsSettings {
    pub trend_days: u32,
    pub chart_days: usize,
    pub history_days: u32,
    pub forecast_horizon_days: u32,
    pub student_lookback_days: u32,
    pub recent_history_limit: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            trend_days: 30,
            chart_days: 14,
            history_days: 14,
            forecast_horizon_days: 7,
            student_lookback_days: 30,
            recent_history_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightSettings {
    pub excellent_above: f64,
    pub warning_below: f64,
    pub engagement_below: f64,
    pub variability_stdev: f64,
    pub top_class_margin: f64,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            excellent_above: 90.0,
            warning_below: 75.0,
            engagement_below: 85.0,
            variability_stdev: 10.0,
            top_class_margin: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSettings {
    pub analytics: AnalyticsSettings,
    pub insights: InsightSettings,
}

fn parse_u64_range(v: &Value, key: &str, min: u64, max: u64) -> Result<u64, String> {
    let n = v
        .as_u64()
        .ok_or_else(|| format!("{} must be a non-negative integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v.as_f64().ok_or_else(|| format!("{} must be a number", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

/// Validates `patch` and applies it to one section. Unknown keys are rejected.
pub fn merge_section_patch(
    settings: &mut AssistantSettings,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    for (k, v) in patch {
        match section {
            SetupSection::Analytics => {
                let a = &mut settings.analytics;
                match k.as_str() {
                    "trendDays" => a.trend_days = parse_u64_range(v, k, 7, 120)? as u32,
                    "chartDays" => a.chart_days = parse_u64_range(v, k, 1, 60)? as usize,
                    "historyDays" => a.history_days = parse_u64_range(v, k, 3, 60)? as u32,
                    "forecastHorizonDays" => {
                        a.forecast_horizon_days = parse_u64_range(v, k, 1, 30)? as u32
                    }
                    "studentLookbackDays" => {
                        a.student_lookback_days = parse_u64_range(v, k, 1, 365)? as u32
                    }
                    "recentHistoryLimit" => {
                        a.recent_history_limit = parse_u64_range(v, k, 1, 100)? as usize
                    }
                    _ => return Err(format!("unknown analytics setting: {}", k)),
                }
            }
            SetupSection::Insights => {
                let i = &mut settings.insights;
                match k.as_str() {
                    "excellentAbove" => i.excellent_above = parse_f64_range(v, k, 0.0, 100.0)?,
                    "warningBelow" => i.warning_below = parse_f64_range(v, k, 0.0, 100.0)?,
                    "engagementBelow" => i.engagement_below = parse_f64_range(v, k, 0.0, 100.0)?,
                    "variabilityStdev" => i.variability_stdev = parse_f64_range(v, k, 0.0, 100.0)?,
                    "topClassMargin" => i.top_class_margin = parse_f64_range(v, k, 0.0, 100.0)?,
                    _ => return Err(format!("unknown insights setting: {}", k)),
                }
            }
        }
    }
    if settings.insights.warning_below > settings.insights.excellent_above {
        return Err("warningBelow must not exceed excellentAbove".into());
    }
    Ok(())
}

pub fn section_json(settings: &AssistantSettings, section: SetupSection) -> anyhow::Result<Value> {
    Ok(match section {
        SetupSection::Analytics => serde_json::to_value(&settings.analytics)?,
        SetupSection::Insights => serde_json::to_value(&settings.insights)?,
    })
}

/// Defaults overlaid with whatever the workspace has saved.
pub fn load_settings(conn: &Connection) -> anyhow::Result<AssistantSettings> {
    let mut settings = AssistantSettings::default();
    for section in [SetupSection::Analytics, SetupSection::Insights] {
        if let Some(saved) = db::settings_get_json(conn, section.key())? {
            if let Some(saved_obj) = saved.as_object() {
                // Best-effort: a stale or malformed saved value must not block queries.
                let mut candidate = settings.clone();
                if merge_section_patch(&mut candidate, section, saved_obj).is_ok() {
                    settings = candidate;
                } else {
                    tracing::warn!(key = section.key(), "ignoring invalid saved settings");
                }
            }
        }
    }
    Ok(settings)
}

pub fn save_section(
    conn: &Connection,
    settings: &AssistantSettings,
    section: SetupSection,
) -> anyhow::Result<()> {
    db::settings_set_json(conn, section.key(), &section_json(settings, section)?)
}
