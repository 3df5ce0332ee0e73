use super::context::ConversationContext;
use super::entities::{self, Entities};
use super::response::{
    AnalyticsStatistics, Insight, InsightLevel, ResponseBody, ResponseEnvelope,
};
use super::rules::{self, Intent};
use crate::calc::{self, TrendPoint};
use crate::config::AssistantSettings;
use crate::store::{AttendanceKind, ClassEntity, RecordStore};
use chrono::NaiveDate;

const SUMMARY_TREND_DAYS: u32 = 7;
const TREND_WINDOW: usize = 7;
const TOP_CLASSES_SHOWN: usize = 3;
/// Lower bound of the middle recommendation band.
const WATCH_BAND: f64 = 80.0;

const HELP_COMMANDS: &[&str] = &[
    "Show attendance for [class name] today",
    "Show latecomers in [class name]",
    "Show student info for [student name/roll]",
    "Show summary for today",
    "Show all classes attendance",
    "Show attendance for yesterday",
    "Show latecomers today",
    "Show analytics for attendance trends",
    "Predict attendance for tomorrow",
    "Compare classes performance",
    "Show insights for this month",
    "Show period 2 attendance for cs2a",
];

/// Answers free-text questions against a record store.
pub struct Assistant<'a> {
    store: &'a dyn RecordStore,
    settings: &'a AssistantSettings,
}

impl<'a> Assistant<'a> {
    pub fn new(store: &'a dyn RecordStore, settings: &'a AssistantSettings) -> Self {
        Self { store, settings }
    }

    /// Classifies `text`, resolves its entities against `ctx` and builds the response.
    ///
    /// `ctx` is updated before dispatch: the raw text becomes the last query and any
    /// class, student or date found in it replaces the remembered one. A follow-up
    /// phrase only counts when an earlier query exists.
    pub fn answer_query(
        &self,
        ctx: &mut ConversationContext,
        text: &str,
        role: &str,
        today: NaiveDate,
    ) -> anyhow::Result<ResponseEnvelope> {
        let normalized = text.trim().to_lowercase();
        let had_previous = ctx.has_previous_query();
        ctx.record_query(text);

        if normalized.is_empty() {
            return Ok(ResponseEnvelope::new(
                self.default_response(today)?,
                Intent::Unknown,
                0.0,
            ));
        }

        let entities = entities::extract(&normalized, today);
        ctx.remember(&entities);
        let classification = rules::classify(&normalized);
        tracing::debug!(
            intent = classification.intent.as_str(),
            confidence = classification.confidence,
            role,
            class = entities.class_name.as_deref().unwrap_or(""),
            date = %entities.date,
            period = ?entities.period,
            numbers = ?entities.numbers,
            "classified query"
        );

        if had_previous && rules::is_follow_up(&normalized) {
            let class_name = entities.class_name.clone().or_else(|| ctx.last_class.clone());
            tracing::debug!(class = class_name.as_deref().unwrap_or(""), "resolving follow-up");
            let envelope = match class_name {
                Some(name) => ResponseEnvelope::new(
                    self.attendance(Some(&name), &entities)?,
                    Intent::Attendance,
                    classification.confidence,
                ),
                None => ResponseEnvelope::new(
                    self.default_response(entities.date)?,
                    Intent::Unknown,
                    0.0,
                ),
            };
            return Ok(envelope.follow_up());
        }

        let body = match classification.intent {
            Intent::Attendance => self.attendance(entities.class_name.as_deref(), &entities)?,
            Intent::Latecomer => self.latecomers(&entities)?,
            Intent::Student => self.student(&normalized, &entities)?,
            Intent::Analytics => self.analytics(entities.date)?,
            Intent::Prediction => self.predictions(entities.date)?,
            Intent::Comparison => self.comparison(entities.date)?,
            Intent::Insights => self.insights(entities.date)?,
            Intent::Summary => self.summary(entities.date)?,
            Intent::Classes => self.classes(&entities)?,
            Intent::Help => ResponseBody::Help {
                message: "Here are some things you can ask me:".to_string(),
                commands: HELP_COMMANDS.iter().map(|s| s.to_string()).collect(),
            },
            Intent::Unknown => self.default_response(entities.date)?,
        };
        Ok(ResponseEnvelope::new(
            body,
            classification.intent,
            classification.confidence,
        ))
    }

    /// First class whose name contains `name`, case-insensitively.
    fn find_class(&self, name: Option<&str>) -> anyhow::Result<Option<ClassEntity>> {
        let Some(name) = name else {
            return Ok(None);
        };
        let needle = name.to_lowercase();
        Ok(self
            .store
            .list_classes()?
            .into_iter()
            .find(|c| c.name.to_lowercase().contains(&needle)))
    }

    fn attendance(&self, class_name: Option<&str>, e: &Entities) -> anyhow::Result<ResponseBody> {
        let (kind, period) = match e.period {
            Some(p) => (AttendanceKind::Period, Some(p)),
            None => (AttendanceKind::Day, None),
        };
        if let Some(class) = self.find_class(class_name)? {
            let summary = calc::class_summary(self.store, &class.id, e.date, kind, period)?;
            let students = calc::roster_status(self.store, &class.id, e.date)?;
            return Ok(ResponseBody::ClassAttendance {
                message: format!("Attendance for {} on {}", class.name, e.date),
                class_name: class.name,
                date: e.date,
                summary,
                students,
            });
        }
        Ok(ResponseBody::DepartmentAttendance {
            message: format!("Department attendance summary for {}", e.date),
            date: e.date,
            summary: calc::department_summary(self.store, e.date, kind, period)?,
        })
    }

    fn latecomers(&self, e: &Entities) -> anyhow::Result<ResponseBody> {
        if let Some(class) = self.find_class(e.class_name.as_deref())? {
            let latecomers = calc::class_latecomers(self.store, &class, e.date)?;
            return Ok(ResponseBody::ClassLatecomers {
                message: format!("Latecomers in {} on {}", class.name, e.date),
                class_name: class.name,
                date: e.date,
                latecomers,
            });
        }
        Ok(ResponseBody::AllLatecomers {
            message: format!("All latecomers on {}", e.date),
            date: e.date,
            latecomers: calc::all_latecomers(self.store, e.date)?,
        })
    }

    fn student(&self, normalized: &str, e: &Entities) -> anyhow::Result<ResponseBody> {
        for token in entities::student_candidates(normalized) {
            let Some(student) = self.store.search_students(&token)?.into_iter().next() else {
                continue;
            };
            let profile = calc::student_profile(
                self.store,
                student,
                e.date,
                self.settings.analytics.student_lookback_days,
                self.settings.analytics.recent_history_limit,
            )?;
            return Ok(ResponseBody::StudentInfo {
                message: format!("Attendance information for {}", profile.student.name),
                student: profile.student,
                stats: profile.stats,
                recent_history: profile.recent_history,
            });
        }
        Ok(ResponseBody::error(
            "Student not found. Please provide a valid student name or roll number.",
        ))
    }

    fn classes(&self, e: &Entities) -> anyhow::Result<ResponseBody> {
        if self.find_class(e.class_name.as_deref())?.is_some() {
            return self.attendance(e.class_name.as_deref(), e);
        }
        let dept = calc::department_summary(self.store, e.date, AttendanceKind::Day, None)?;
        Ok(ResponseBody::AllClasses {
            message: format!("All classes attendance for {}", e.date),
            date: e.date,
            classes: dept.classes,
        })
    }

    fn summary(&self, date: NaiveDate) -> anyhow::Result<ResponseBody> {
        Ok(ResponseBody::Summary {
            message: format!("Department attendance summary for {}", date),
            date,
            summary: calc::department_summary(self.store, date, AttendanceKind::Day, None)?,
            weekly_trend: calc::trend_series(
                self.store,
                date,
                SUMMARY_TREND_DAYS,
                AttendanceKind::Day,
                None,
            )?,
        })
    }

    fn analytics(&self, date: NaiveDate) -> anyhow::Result<ResponseBody> {
        let a = &self.settings.analytics;
        let series = calc::trend_series(self.store, date, a.trend_days, AttendanceKind::Day, None)?;
        let (Some(newest), Some(oldest)) = (series.first(), series.last()) else {
            return Ok(ResponseBody::error("Not enough historical data for analytics"));
        };
        let percentages = calc::nonzero_percentages(&series);

        let mut best: &TrendPoint = newest;
        let mut worst: &TrendPoint = newest;
        // Zero days never win "worst"; they rank as 100 there.
        let worst_key = |p: &TrendPoint| if p.percentage > 0.0 { p.percentage } else { 100.0 };
        for point in &series {
            if point.percentage > best.percentage {
                best = point;
            }
            if worst_key(point) < worst_key(worst) {
                worst = point;
            }
        }

        Ok(ResponseBody::Analytics {
            message: "Here's your attendance analytics for the past month".to_string(),
            date_range: format!("{} to {}", oldest.date, newest.date),
            statistics: AnalyticsStatistics {
                average_attendance: calc::round_to(calc::mean(&percentages), 2),
                best_day: best.clone(),
                worst_day: worst.clone(),
                trend_direction: calc::trend_direction(
                    &percentages[..percentages.len().min(TREND_WINDOW)],
                ),
            },
            patterns: calc::weekday_pattern(&series),
            chart_data: series.iter().take(a.chart_days).cloned().collect(),
        })
    }

    fn recent_percentages(&self, date: NaiveDate) -> anyhow::Result<Vec<f64>> {
        let series = calc::trend_series(
            self.store,
            date,
            self.settings.analytics.history_days,
            AttendanceKind::Day,
            None,
        )?;
        Ok(calc::nonzero_percentages(&series))
    }

    fn predictions(&self, date: NaiveDate) -> anyhow::Result<ResponseBody> {
        let history = self.recent_percentages(date)?;
        let Some(forecast) =
            calc::forecast(&history, self.settings.analytics.forecast_horizon_days, date)
        else {
            return Ok(ResponseBody::error("Not enough historical data for predictions"));
        };
        Ok(ResponseBody::Predictions {
            message: format!(
                "Attendance predictions based on recent {} trend",
                forecast.current_trend.as_str()
            ),
            current_trend: forecast.current_trend,
            historical_average: forecast.historical_average,
            predictions: forecast.predictions,
        })
    }

    fn insights(&self, date: NaiveDate) -> anyhow::Result<ResponseBody> {
        let t = &self.settings.insights;
        let history = self.recent_percentages(date)?;
        if history.is_empty() {
            return Ok(ResponseBody::error(
                "No recent attendance data available for insights",
            ));
        }
        if history.len() < calc::MIN_FORECAST_POINTS {
            return Ok(ResponseBody::error("Not enough historical data for insights"));
        }

        let avg = calc::mean(&history);
        let mut insights = Vec::new();
        if avg > t.excellent_above {
            insights.push(Insight {
                level: InsightLevel::Positive,
                title: "Excellent Attendance".to_string(),
                message: format!(
                    "Your department maintains excellent attendance at {:.1}%",
                    avg
                ),
            });
        } else if avg < t.warning_below {
            insights.push(Insight {
                level: InsightLevel::Warning,
                title: "Low Attendance Alert".to_string(),
                message: format!("Department attendance is below target at {:.1}%", avg),
            });
        }

        let best = calc::best_performing_classes(self.store, date, t.top_class_margin)?;
        if !best.is_empty() {
            let shown: Vec<&str> = best.iter().take(TOP_CLASSES_SHOWN).map(String::as_str).collect();
            insights.push(Insight {
                level: InsightLevel::Info,
                title: "Top Performing Classes".to_string(),
                message: format!("Classes with highest attendance: {}", shown.join(", ")),
            });
        }

        if avg < t.engagement_below {
            insights.push(Insight {
                level: InsightLevel::Suggestion,
                title: "Engagement Strategy".to_string(),
                message: "Consider implementing attendance incentives or morning activities to \
                          boost participation"
                    .to_string(),
            });
        }
        if calc::sample_stdev(&history).is_some_and(|s| s > t.variability_stdev) {
            insights.push(Insight {
                level: InsightLevel::Warning,
                title: "Inconsistent Attendance".to_string(),
                message: "Attendance varies significantly. Review scheduling and communication \
                          strategies"
                    .to_string(),
            });
        }

        Ok(ResponseBody::Insights {
            message: "Here are intelligent insights based on your attendance data".to_string(),
            current_average: calc::round_to(avg, 2),
            insights,
            recommendations: recommendations(avg, t.excellent_above),
        })
    }

    fn comparison(&self, date: NaiveDate) -> anyhow::Result<ResponseBody> {
        let ranking = calc::class_ranking(self.store, date, AttendanceKind::Day, None)?;
        Ok(ResponseBody::comparison(
            "Here's a comparative analysis of attendance performance".to_string(),
            ranking,
        ))
    }

    fn default_response(&self, date: NaiveDate) -> anyhow::Result<ResponseBody> {
        Ok(ResponseBody::Default {
            message: format!(
                "Here's the attendance overview for {}. Type 'help' for more options.",
                date
            ),
            date,
            summary: calc::department_summary(self.store, date, AttendanceKind::Day, None)?,
        })
    }
}

fn recommendations(avg: f64, excellent_above: f64) -> Vec<String> {
    let list: &[&str] = if avg > excellent_above {
        &[
            "Maintain current excellent practices",
            "Consider sharing strategies with other departments",
            "Monitor for any declining trends",
        ]
    } else if avg > WATCH_BAND {
        &[
            "Focus on reducing absenteeism",
            "Implement early intervention for at-risk students",
            "Review scheduling conflicts",
        ]
    } else {
        &[
            "Urgent attention needed for attendance improvement",
            "Conduct detailed analysis of absence reasons",
            "Implement comprehensive attendance strategy",
            "Consider additional support for students",
        ]
    };
    list.iter().map(|s| s.to_string()).collect()
}
