use super::rules::Intent;
use crate::calc::{
    self, ClassRanking, DepartmentSummary, ForecastPoint, HistoryEntry, Latecomer, StudentStats,
    StudentStatus, TrendDirection, TrendPoint, WeekComparison, WeekdayPattern,
};
use crate::store::Student;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightLevel {
    Positive,
    Warning,
    Info,
    Suggestion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    #[serde(rename = "type")]
    pub level: InsightLevel,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsStatistics {
    pub average_attendance: f64,
    pub best_day: TrendPoint,
    pub worst_day: TrendPoint,
    pub trend_direction: TrendDirection,
}

/// Response payload, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ResponseBody {
    ClassAttendance {
        message: String,
        class_name: String,
        date: NaiveDate,
        summary: calc::Summary,
        students: Vec<StudentStatus>,
    },
    DepartmentAttendance {
        message: String,
        date: NaiveDate,
        summary: DepartmentSummary,
    },
    ClassLatecomers {
        message: String,
        class_name: String,
        date: NaiveDate,
        latecomers: Vec<Latecomer>,
    },
    AllLatecomers {
        message: String,
        date: NaiveDate,
        latecomers: Vec<Latecomer>,
    },
    StudentInfo {
        message: String,
        student: Student,
        stats: StudentStats,
        recent_history: Vec<HistoryEntry>,
    },
    AllClasses {
        message: String,
        date: NaiveDate,
        classes: Vec<calc::Summary>,
    },
    Summary {
        message: String,
        date: NaiveDate,
        summary: DepartmentSummary,
        weekly_trend: Vec<TrendPoint>,
    },
    Analytics {
        message: String,
        date_range: String,
        statistics: AnalyticsStatistics,
        patterns: WeekdayPattern,
        chart_data: Vec<TrendPoint>,
    },
    Predictions {
        message: String,
        current_trend: TrendDirection,
        historical_average: f64,
        predictions: Vec<ForecastPoint>,
    },
    Insights {
        message: String,
        current_average: f64,
        insights: Vec<Insight>,
        recommendations: Vec<String>,
    },
    Comparison {
        message: String,
        class_rankings: Vec<calc::Summary>,
        week_comparison: WeekComparison,
        top_performer: Option<calc::Summary>,
        needs_attention: Option<calc::Summary>,
    },
    Help {
        message: String,
        commands: Vec<String>,
    },
    Default {
        message: String,
        date: NaiveDate,
        summary: DepartmentSummary,
    },
    Error {
        message: String,
    },
}

impl ResponseBody {
    pub fn error(message: impl Into<String>) -> Self {
        ResponseBody::Error {
            message: message.into(),
        }
    }

    pub fn comparison(message: String, ranking: ClassRanking) -> Self {
        ResponseBody::Comparison {
            message,
            class_rankings: ranking.rankings,
            week_comparison: ranking.week_comparison,
            top_performer: ranking.top_performer,
            needs_attention: ranking.needs_attention,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ResponseBody::ClassAttendance { message, .. }
            | ResponseBody::DepartmentAttendance { message, .. }
            | ResponseBody::ClassLatecomers { message, .. }
            | ResponseBody::AllLatecomers { message, .. }
            | ResponseBody::StudentInfo { message, .. }
            | ResponseBody::AllClasses { message, .. }
            | ResponseBody::Summary { message, .. }
            | ResponseBody::Analytics { message, .. }
            | ResponseBody::Predictions { message, .. }
            | ResponseBody::Insights { message, .. }
            | ResponseBody::Comparison { message, .. }
            | ResponseBody::Help { message, .. }
            | ResponseBody::Default { message, .. }
            | ResponseBody::Error { message } => message,
        }
    }

    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseBody::ClassAttendance { .. } => "class_attendance",
            ResponseBody::DepartmentAttendance { .. } => "department_attendance",
            ResponseBody::ClassLatecomers { .. } => "class_latecomers",
            ResponseBody::AllLatecomers { .. } => "all_latecomers",
            ResponseBody::StudentInfo { .. } => "student_info",
            ResponseBody::AllClasses { .. } => "all_classes",
            ResponseBody::Summary { .. } => "summary",
            ResponseBody::Analytics { .. } => "analytics",
            ResponseBody::Predictions { .. } => "predictions",
            ResponseBody::Insights { .. } => "insights",
            ResponseBody::Comparison { .. } => "comparison",
            ResponseBody::Help { .. } => "help",
            ResponseBody::Default { .. } => "default",
            ResponseBody::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(flatten)]
    pub body: ResponseBody,
    pub intent: Intent,
    pub confidence: f64,
    pub follow_up: bool,
    pub suggestions: Vec<String>,
}

impl ResponseEnvelope {
    pub fn new(body: ResponseBody, intent: Intent, confidence: f64) -> Self {
        Self {
            body,
            intent,
            confidence,
            follow_up: false,
            suggestions: suggestions_for(intent),
        }
    }

    pub fn follow_up(mut self) -> Self {
        self.follow_up = true;
        self
    }
}

/// At most three follow-up prompts per intent.
pub fn suggestions_for(intent: Intent) -> Vec<String> {
    let list: &[&str] = match intent {
        Intent::Attendance => &[
            "Show latecomers for this class",
            "Compare with other classes",
            "Show attendance trend",
        ],
        Intent::Latecomer => &[
            "Show attendance for this class",
            "Show latecomers yesterday",
            "Show insights",
        ],
        Intent::Student => &[
            "Show class performance",
            "Compare with peers",
            "Show attendance history",
        ],
        Intent::Analytics => &[
            "Predict future attendance",
            "Compare class performance",
            "Show improvement tips",
        ],
        Intent::Prediction => &[
            "Show analytics for attendance trends",
            "Show insights",
            "Compare classes performance",
        ],
        Intent::Comparison => &[
            "Show analytics for attendance trends",
            "Predict attendance for next week",
            "Show insights",
        ],
        Intent::Insights => &[
            "Predict future attendance",
            "Compare classes performance",
            "Show summary for today",
        ],
        Intent::Summary | Intent::Classes => &[
            "Show latecomers today",
            "Compare classes performance",
            "Show analytics",
        ],
        Intent::Help | Intent::Unknown => &[],
    };
    list.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_flat_with_type_tag() {
        let env = ResponseEnvelope::new(
            ResponseBody::error("Not enough historical data for predictions"),
            Intent::Prediction,
            1.0,
        );
        let v = serde_json::to_value(&env).expect("json");
        assert_eq!(v["type"], json!("error"));
        assert_eq!(v["message"], json!("Not enough historical data for predictions"));
        assert_eq!(v["intent"], json!("prediction"));
        assert_eq!(v["followUp"], json!(false));
        assert_eq!(v["suggestions"].as_array().map(|a| a.len()), Some(3));
    }

    #[test]
    fn suggestions_never_exceed_three() {
        for intent in [
            Intent::Attendance,
            Intent::Latecomer,
            Intent::Student,
            Intent::Analytics,
            Intent::Prediction,
            Intent::Comparison,
            Intent::Insights,
            Intent::Summary,
            Intent::Classes,
            Intent::Help,
            Intent::Unknown,
        ] {
            assert!(suggestions_for(intent).len() <= 3);
        }
    }
}
