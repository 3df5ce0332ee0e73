use crate::store::{
    AttendanceKind, AttendanceRecord, AttendanceStatus, ClassEntity, RecordFilter, RecordStore,
    Student,
};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Marker name when the marking user is not in the staff directory.
pub const UNKNOWN_MARKER: &str = "Unknown";
/// Marker name when no record matched the summary key.
pub const NO_MARKER: &str = "N/A";

pub fn round_to(x: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (x * f).round() / f
}

pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; `None` below two points.
pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub class_id: String,
    pub class_name: String,
    pub total_students: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub percentage: f64,
    pub locked: bool,
    pub marked_by_user: String,
}

/// Summary for one (class, date, kind, period) key.
///
/// Present and late are sets of roster student ids, so duplicate records never double
/// count and `present + absent == total_students` always holds. The marking user comes
/// from the first matching record in store order; with several submitters for one key
/// the pick is arbitrary. A missing class or empty roster yields a zero summary.
pub fn class_summary(
    store: &dyn RecordStore,
    class_id: &str,
    date: NaiveDate,
    kind: AttendanceKind,
    period: Option<u32>,
) -> anyhow::Result<Summary> {
    let class_name = store
        .get_class(class_id)?
        .map(|c| c.name)
        .unwrap_or_default();
    let roster: HashSet<String> = store
        .list_students(class_id)?
        .into_iter()
        .map(|s| s.id)
        .collect();
    let records = store.get_records(&RecordFilter::group(class_id, date, kind, period))?;

    let mut present: HashSet<&str> = HashSet::new();
    let mut late: HashSet<&str> = HashSet::new();
    let mut locked = false;
    for rec in &records {
        locked |= rec.locked;
        if !roster.contains(&rec.student_id) {
            continue;
        }
        if rec.is_present() {
            present.insert(rec.student_id.as_str());
            if rec.is_late {
                late.insert(rec.student_id.as_str());
            }
        }
    }

    let marked_by_user = match records.first() {
        Some(first) => store
            .get_user(&first.marked_by)?
            .map(|u| u.name)
            .unwrap_or_else(|| UNKNOWN_MARKER.to_string()),
        None => NO_MARKER.to_string(),
    };

    let total_students = roster.len();
    Ok(Summary {
        class_id: class_id.to_string(),
        class_name,
        total_students,
        present: present.len(),
        absent: total_students - present.len(),
        late: late.len(),
        percentage: percentage(present.len(), total_students),
        locked,
        marked_by_user,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub date: NaiveDate,
    pub kind: AttendanceKind,
    pub period: Option<u32>,
    pub classes: Vec<Summary>,
    pub total_students: usize,
    pub total_present: usize,
    pub total_late: usize,
    pub overall_percentage: f64,
}

pub fn department_summary(
    store: &dyn RecordStore,
    date: NaiveDate,
    kind: AttendanceKind,
    period: Option<u32>,
) -> anyhow::Result<DepartmentSummary> {
    let mut classes = Vec::new();
    let mut total_students = 0;
    let mut total_present = 0;
    let mut total_late = 0;
    for class in store.list_classes()? {
        let mut summary = class_summary(store, &class.id, date, kind, period)?;
        summary.class_name = class.name;
        total_students += summary.total_students;
        total_present += summary.present;
        total_late += summary.late;
        classes.push(summary);
    }
    Ok(DepartmentSummary {
        date,
        kind,
        period,
        classes,
        total_students,
        total_present,
        total_late,
        overall_percentage: percentage(total_present, total_students),
    })
}

/// Per-class percentage change against `previous`, keyed by class id. A class missing
/// from `previous` gets 0.
pub fn day_over_day(
    current: &DepartmentSummary,
    previous: &DepartmentSummary,
) -> BTreeMap<String, f64> {
    current
        .classes
        .iter()
        .map(|c| {
            let delta = previous
                .classes
                .iter()
                .find(|p| p.class_id == c.class_id)
                .map(|p| c.percentage - p.percentage)
                .unwrap_or(0.0);
            (c.class_id.clone(), delta)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub percentage: f64,
    pub total_students: usize,
    pub total_present: usize,
}

/// Department series for `days` dates ending at `reference`, most recent first.
/// Every point is an independent department summary.
pub fn trend_series(
    store: &dyn RecordStore,
    reference: NaiveDate,
    days: u32,
    kind: AttendanceKind,
    period: Option<u32>,
) -> anyhow::Result<Vec<TrendPoint>> {
    let mut out = Vec::with_capacity(days as usize);
    for i in 0..days {
        let date = reference - Duration::days(i as i64);
        let dept = department_summary(store, date, kind, period)?;
        out.push(TrendPoint {
            date,
            percentage: dept.overall_percentage,
            total_students: dept.total_students,
            total_present: dept.total_present,
        });
    }
    Ok(out)
}

/// Day-attendance series for a single class, most recent first.
pub fn class_trend(
    store: &dyn RecordStore,
    class_id: &str,
    reference: NaiveDate,
    days: u32,
) -> anyhow::Result<Vec<TrendPoint>> {
    let mut out = Vec::with_capacity(days as usize);
    for i in 0..days {
        let date = reference - Duration::days(i as i64);
        let s = class_summary(store, class_id, date, AttendanceKind::Day, None)?;
        out.push(TrendPoint {
            date,
            percentage: s.percentage,
            total_students: s.total_students,
            total_present: s.present,
        });
    }
    Ok(out)
}

/// Percentages of the days that carry data. A 0% day counts as "no data".
pub fn nonzero_percentages(series: &[TrendPoint]) -> Vec<f64> {
    series
        .iter()
        .map(|p| p.percentage)
        .filter(|p| *p > 0.0)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Coarse half-split heuristic, not a statistical test.
///
/// Input is most recent first. The recent half is `[..len/2]`, the older half the rest;
/// a recent mean more than 2 points above the older mean is improving, more than 2 below
/// is declining. Fewer than 3 points is always stable.
///
/// Keep the subtraction as recent minus older. The reverse order (older half minus
/// recent half over a most-recent-first series) reports rising attendance as declining.
pub fn trend_direction(most_recent_first: &[f64]) -> TrendDirection {
    if most_recent_first.len() < 3 {
        return TrendDirection::Stable;
    }
    let mid = most_recent_first.len() / 2;
    let recent = mean(&most_recent_first[..mid]);
    let older = mean(&most_recent_first[mid..]);
    let difference = recent - older;
    if difference > 2.0 {
        TrendDirection::Improving
    } else if difference < -2.0 {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayAverage {
    pub weekday: String,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayPattern {
    /// Monday first; weekdays without data are omitted.
    pub averages: Vec<WeekdayAverage>,
    pub best_day: String,
    pub worst_day: String,
}

/// Zero-percentage days are skipped, so a real 0% day is indistinguishable from a day
/// without records. Ties resolve to the earlier weekday; no data at all reports Monday.
pub fn weekday_pattern(series: &[TrendPoint]) -> WeekdayPattern {
    let mut buckets: [Vec<f64>; 7] = Default::default();
    for point in series {
        if point.percentage > 0.0 {
            buckets[point.date.weekday().num_days_from_monday() as usize].push(point.percentage);
        }
    }

    let mut averages = Vec::new();
    let mut best: Option<(usize, f64)> = None;
    let mut worst: Option<(usize, f64)> = None;
    for (idx, values) in buckets.iter().enumerate() {
        if values.is_empty() {
            continue;
        }
        let avg = round_to(mean(values), 2);
        if best.map(|(_, b)| avg > b).unwrap_or(true) {
            best = Some((idx, avg));
        }
        if worst.map(|(_, w)| avg < w).unwrap_or(true) {
            worst = Some((idx, avg));
        }
        averages.push(WeekdayAverage {
            weekday: weekday_name(weekday_from_index(idx)).to_string(),
            average: avg,
        });
    }

    let name = |slot: Option<(usize, f64)>| {
        weekday_name(weekday_from_index(slot.map(|(i, _)| i).unwrap_or(0))).to_string()
    };
    WeekdayPattern {
        averages,
        best_day: name(best),
        worst_day: name(worst),
    }
}

fn weekday_from_index(idx: usize) -> Weekday {
    match idx {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_attendance: f64,
    pub confidence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub current_trend: TrendDirection,
    pub historical_average: f64,
    pub predictions: Vec<ForecastPoint>,
}

pub const MIN_FORECAST_POINTS: usize = 3;

/// Heuristic extrapolation from the recent baseline.
///
/// `history` is most recent first; zero entries are dropped. Returns `None` with fewer
/// than three usable points. Baseline is the mean of the latest seven. For day `i`:
/// improving adds `2i` capped at 100, declining subtracts `1.5i` floored at 60, stable
/// alternates +1.5 (odd) / -1.5 (even). Confidence is `max(60, 90 - 5i)`.
pub fn forecast(history: &[f64], horizon_days: u32, from: NaiveDate) -> Option<Forecast> {
    let usable: Vec<f64> = history.iter().copied().filter(|p| *p > 0.0).collect();
    if usable.len() < MIN_FORECAST_POINTS {
        return None;
    }
    let window = &usable[..usable.len().min(7)];
    let baseline = mean(window);
    let trend = trend_direction(window);

    let predictions = (1..=horizon_days)
        .map(|i| {
            let step = i as f64;
            let predicted = match trend {
                TrendDirection::Improving => (baseline + 2.0 * step).min(100.0),
                TrendDirection::Declining => (baseline - 1.5 * step).max(60.0),
                TrendDirection::Stable => baseline + ((i % 2) as f64 * 3.0 - 1.5),
            };
            ForecastPoint {
                date: from + Duration::days(i as i64),
                predicted_attendance: round_to(predicted, 1),
                confidence: 90u32.saturating_sub(5 * i).max(60),
            }
        })
        .collect();

    Some(Forecast {
        current_trend: trend,
        historical_average: round_to(baseline, 2),
        predictions,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekComparison {
    pub current_week: f64,
    pub last_week: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRanking {
    pub rankings: Vec<Summary>,
    pub week_comparison: WeekComparison,
    pub top_performer: Option<Summary>,
    pub needs_attention: Option<Summary>,
}

/// Classes by percentage, highest first (ties keep class order), with the department
/// delta against the same weekday one week earlier.
pub fn class_ranking(
    store: &dyn RecordStore,
    date: NaiveDate,
    kind: AttendanceKind,
    period: Option<u32>,
) -> anyhow::Result<ClassRanking> {
    let current = department_summary(store, date, kind, period)?;
    let last_week = department_summary(store, date - Duration::days(7), kind, period)?;

    let mut rankings = current.classes;
    rankings.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(Ordering::Equal)
    });

    Ok(ClassRanking {
        top_performer: rankings.first().cloned(),
        needs_attention: rankings.last().cloned(),
        week_comparison: WeekComparison {
            current_week: current.overall_percentage,
            last_week: last_week.overall_percentage,
            change: current.overall_percentage - last_week.overall_percentage,
        },
        rankings,
    })
}

/// Names of classes within `margin` points of the best class on `date`.
/// Classes at 0% count as having no data and are left out, so a date without any
/// records yields an empty list.
pub fn best_performing_classes(
    store: &dyn RecordStore,
    date: NaiveDate,
    margin: f64,
) -> anyhow::Result<Vec<String>> {
    let mut performance: Vec<(String, f64)> = Vec::new();
    for class in store.list_classes()? {
        let s = class_summary(store, &class.id, date, AttendanceKind::Day, None)?;
        if s.percentage > 0.0 {
            performance.push((class.name, s.percentage));
        }
    }
    performance.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    let Some(top) = performance.first().map(|(_, p)| *p) else {
        return Ok(Vec::new());
    };
    Ok(performance
        .into_iter()
        .filter(|(_, p)| top - p <= margin)
        .map(|(name, _)| name)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatus {
    pub student_id: String,
    pub name: String,
    pub roll: String,
    pub status: AttendanceStatus,
    pub is_late: bool,
}

/// Roster view for a class and date. Students default to absent; every record of the
/// date (any kind) overwrites the status in store order.
pub fn roster_status(
    store: &dyn RecordStore,
    class_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<StudentStatus>> {
    let mut rows: Vec<StudentStatus> = store
        .list_students(class_id)?
        .into_iter()
        .map(|s| StudentStatus {
            student_id: s.id,
            name: s.name,
            roll: s.roll_number,
            status: AttendanceStatus::Absent,
            is_late: false,
        })
        .collect();
    for rec in store.get_records(&RecordFilter::class_day(class_id, date))? {
        if let Some(row) = rows.iter_mut().find(|r| r.student_id == rec.student_id) {
            row.status = rec.status;
            row.is_late = rec.is_late;
        }
    }
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Latecomer {
    pub name: String,
    pub roll: String,
    pub class_name: String,
    pub time: String,
}

pub fn class_latecomers(
    store: &dyn RecordStore,
    class: &ClassEntity,
    date: NaiveDate,
) -> anyhow::Result<Vec<Latecomer>> {
    let mut out = Vec::new();
    for rec in store.get_records(&RecordFilter::class_day(&class.id, date))? {
        if !rec.is_latecomer() {
            continue;
        }
        if let Some(student) = store.get_student(&rec.student_id)? {
            out.push(Latecomer {
                name: student.name,
                roll: student.roll_number,
                class_name: class.name.clone(),
                time: rec.created_at,
            });
        }
    }
    Ok(out)
}

pub fn all_latecomers(store: &dyn RecordStore, date: NaiveDate) -> anyhow::Result<Vec<Latecomer>> {
    let mut out = Vec::new();
    for class in store.list_classes()? {
        out.extend(class_latecomers(store, &class, date)?);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub attendance_percentage: f64,
    pub total_days: usize,
    pub present_days: usize,
    pub absent_days: usize,
    pub late_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub is_late: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student: Student,
    pub stats: StudentStats,
    pub recent_history: Vec<HistoryEntry>,
}

/// Days are distinct dates with any record; a day is present if any record that day is.
pub fn student_stats(history: &[AttendanceRecord]) -> StudentStats {
    let all_days: HashSet<NaiveDate> = history.iter().map(|r| r.date).collect();
    let present_days: HashSet<NaiveDate> = history
        .iter()
        .filter(|r| r.is_present())
        .map(|r| r.date)
        .collect();
    StudentStats {
        attendance_percentage: percentage(present_days.len(), all_days.len()),
        total_days: all_days.len(),
        present_days: present_days.len(),
        absent_days: all_days.len() - present_days.len(),
        late_count: history.iter().filter(|r| r.is_late).count(),
    }
}

pub fn student_profile(
    store: &dyn RecordStore,
    student: Student,
    today: NaiveDate,
    lookback_days: u32,
    recent_limit: usize,
) -> anyhow::Result<StudentProfile> {
    let start = today - Duration::days(lookback_days as i64);
    let history = store.get_student_history(&student.id, start, today)?;
    Ok(StudentProfile {
        stats: student_stats(&history),
        recent_history: history
            .iter()
            .take(recent_limit)
            .map(|r| HistoryEntry {
                date: r.date,
                status: r.status,
                is_late: r.is_late,
            })
            .collect(),
        student,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendance {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub records: Vec<AttendanceRecord>,
}

/// Groups a history by date, newest first.
pub fn daily_attendance(history: &[AttendanceRecord], limit: usize) -> Vec<DailyAttendance> {
    let mut by_date: BTreeMap<NaiveDate, Vec<AttendanceRecord>> = BTreeMap::new();
    for rec in history {
        by_date.entry(rec.date).or_default().push(rec.clone());
    }
    by_date
        .into_iter()
        .rev()
        .take(limit)
        .map(|(date, records)| DailyAttendance {
            date,
            status: if records.iter().any(|r| r.is_present()) {
                AttendanceStatus::Present
            } else {
                AttendanceStatus::Absent
            },
            is_late: records.iter().any(|r| r.is_late),
            records,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{self, SqliteStore};
    use crate::store::StaffUser;
    use rusqlite::Connection;

    pub(crate) fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    pub(crate) fn add_class(conn: &Connection, id: &str, name: &str, students: usize) {
        db::insert_class(
            conn,
            &ClassEntity {
                id: id.to_string(),
                name: name.to_string(),
                department: "Computer Science".to_string(),
                semester: 3,
                section: "A".to_string(),
            },
        )
        .expect("class");
        for i in 1..=students {
            db::insert_student(
                conn,
                &Student {
                    id: format!("{}-{:03}", id, i),
                    roll_number: format!("{}{:03}", id, i),
                    name: format!("Student {} {}", name, i),
                    class_id: id.to_string(),
                    email: String::new(),
                    phone: String::new(),
                },
            )
            .expect("student");
        }
    }

    pub(crate) fn rec(
        class_id: &str,
        student: usize,
        date: &str,
        status: AttendanceStatus,
        is_late: bool,
    ) -> AttendanceRecord {
        AttendanceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            class_id: class_id.to_string(),
            date: d(date),
            kind: AttendanceKind::Day,
            period: None,
            student_id: format!("{}-{:03}", class_id, student),
            status,
            is_late,
            marked_by: "staff1".to_string(),
            locked: true,
            created_at: format!("{}T09:00:00", date),
            submitted_as: AttendanceKind::Day,
        }
    }

    /// Marks the first `present` of `total` students present on `date`, rest absent.
    pub(crate) fn mark(store: &SqliteStore<'_>, class_id: &str, date: &str, present: usize, total: usize) {
        let records: Vec<AttendanceRecord> = (1..=total)
            .map(|i| {
                let status = if i <= present {
                    AttendanceStatus::Present
                } else {
                    AttendanceStatus::Absent
                };
                rec(class_id, i, date, status, false)
            })
            .collect();
        store.append_records(&records).expect("append");
    }

    fn scenario() -> Connection {
        let conn = db::open_in_memory().expect("db");
        add_class(&conn, "CS2A", "2nd Year Computer Science A", 5);
        db::upsert_user(
            &conn,
            &StaffUser {
                id: "staff1".into(),
                username: "staff1".into(),
                name: "Prof. John Smith".into(),
                role: "staff".into(),
                assigned_classes: vec!["CS2A".into()],
            },
        )
        .expect("user");
        let store = SqliteStore::new(&conn);
        store
            .append_records(&[
                rec("CS2A", 1, "2024-09-05", AttendanceStatus::Present, false),
                rec("CS2A", 2, "2024-09-05", AttendanceStatus::Present, false),
                rec("CS2A", 3, "2024-09-05", AttendanceStatus::Present, true),
                rec("CS2A", 4, "2024-09-05", AttendanceStatus::Absent, false),
                rec("CS2A", 5, "2024-09-05", AttendanceStatus::Absent, false),
            ])
            .expect("append");
        conn
    }

    #[test]
    fn day_over_day_compares_each_class_with_previous_day() {
        let conn = scenario();
        add_class(&conn, "IT3B", "3rd Year Information Technology B", 4);
        let store = SqliteStore::new(&conn);
        mark(&store, "CS2A", "2024-09-06", 4, 5);

        let today = department_summary(&store, d("2024-09-06"), AttendanceKind::Day, Some(1))
            .expect("today");
        let yesterday = department_summary(&store, d("2024-09-05"), AttendanceKind::Day, Some(1))
            .expect("yesterday");
        let delta = day_over_day(&today, &yesterday);
        assert!((delta["CS2A"] - 20.0).abs() < 1e-9);
        assert_eq!(delta["IT3B"], 0.0);

        let mut partial = yesterday.clone();
        partial.classes.retain(|c| c.class_id != "CS2A");
        assert_eq!(day_over_day(&today, &partial)["CS2A"], 0.0);
    }

    #[test]
    fn class_summary_counts_present_absent_late() {
        let conn = scenario();
        let store = SqliteStore::new(&conn);
        let s = class_summary(&store, "CS2A", d("2024-09-05"), AttendanceKind::Day, None)
            .expect("summary");
        assert_eq!(s.total_students, 5);
        assert_eq!(s.present, 3);
        assert_eq!(s.absent, 2);
        assert_eq!(s.late, 1);
        assert!((s.percentage - 60.0).abs() < 1e-9);
        assert!(s.locked);
        assert_eq!(s.marked_by_user, "Prof. John Smith");
        assert_eq!(s.class_name, "2nd Year Computer Science A");
    }

    #[test]
    fn duplicate_present_records_count_once() {
        let conn = scenario();
        let store = SqliteStore::new(&conn);
        store
            .append_records(&[
                rec("CS2A", 1, "2024-09-05", AttendanceStatus::Present, true),
                rec("CS2A", 1, "2024-09-05", AttendanceStatus::Present, false),
            ])
            .expect("append");
        let s = class_summary(&store, "CS2A", d("2024-09-05"), AttendanceKind::Day, None)
            .expect("summary");
        assert_eq!(s.present, 3);
        assert_eq!(s.late, 2);
        assert_eq!(s.present + s.absent, s.total_students);
    }

    #[test]
    fn latecomer_submitted_for_an_absent_student_moves_them_to_present() {
        let conn = scenario();
        let store = SqliteStore::new(&conn);
        store
            .append_records(&[rec("CS2A", 4, "2024-09-05", AttendanceStatus::Present, true)])
            .expect("append");
        let s = class_summary(&store, "CS2A", d("2024-09-05"), AttendanceKind::Day, None)
            .expect("summary");
        assert_eq!((s.present, s.absent, s.late), (4, 1, 2));
    }

    #[test]
    fn absent_records_flagged_late_are_not_latecomers() {
        let conn = scenario();
        let store = SqliteStore::new(&conn);
        store
            .append_records(&[rec("CS2A", 5, "2024-09-06", AttendanceStatus::Absent, true)])
            .expect("append");
        let s = class_summary(&store, "CS2A", d("2024-09-06"), AttendanceKind::Day, None)
            .expect("summary");
        assert_eq!(s.late, 0);
        assert!(all_latecomers(&store, d("2024-09-06")).expect("late").is_empty());
    }

    #[test]
    fn unknown_class_and_marker_degrade_to_empty_values() {
        let conn = scenario();
        let store = SqliteStore::new(&conn);
        let s = class_summary(&store, "NOPE", d("2024-09-05"), AttendanceKind::Day, None)
            .expect("summary");
        assert_eq!(s.total_students, 0);
        assert_eq!(s.percentage, 0.0);
        assert_eq!(s.marked_by_user, NO_MARKER);

        let mut stray = rec("CS2A", 1, "2024-09-07", AttendanceStatus::Present, false);
        stray.marked_by = "ghost".into();
        store.append_records(&[stray]).expect("append");
        let s = class_summary(&store, "CS2A", d("2024-09-07"), AttendanceKind::Day, None)
            .expect("summary");
        assert_eq!(s.marked_by_user, UNKNOWN_MARKER);
    }

    #[test]
    fn department_summary_with_no_classes_is_zero() {
        let conn = db::open_in_memory().expect("db");
        let store = SqliteStore::new(&conn);
        let dept = department_summary(&store, d("2024-09-05"), AttendanceKind::Day, None)
            .expect("dept");
        assert_eq!(dept.total_students, 0);
        assert_eq!(dept.overall_percentage, 0.0);
        assert!(dept.classes.is_empty());
    }

    #[test]
    fn department_summary_is_idempotent() {
        let conn = scenario();
        add_class(&conn, "CS2B", "2nd Year Computer Science B", 4);
        let store = SqliteStore::new(&conn);
        mark(&store, "CS2B", "2024-09-05", 4, 4);
        let a = department_summary(&store, d("2024-09-05"), AttendanceKind::Day, None)
            .expect("dept");
        let b = department_summary(&store, d("2024-09-05"), AttendanceKind::Day, None)
            .expect("dept");
        assert_eq!(a, b);
        assert_eq!(a.total_students, 9);
        assert_eq!(a.total_present, 7);
        assert!((a.overall_percentage - 700.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn trend_direction_needs_three_points() {
        assert_eq!(trend_direction(&[]), TrendDirection::Stable);
        assert_eq!(trend_direction(&[100.0, 10.0]), TrendDirection::Stable);
        assert_eq!(trend_direction(&[90.0, 80.0, 70.0]), TrendDirection::Improving);
        assert_eq!(trend_direction(&[70.0, 80.0, 90.0]), TrendDirection::Declining);
        assert_eq!(trend_direction(&[80.0, 81.0, 80.0, 79.5]), TrendDirection::Stable);
    }

    #[test]
    fn forecast_improving_is_capped_and_non_decreasing() {
        let history = [98.0, 97.0, 96.0, 90.0, 88.0, 86.0];
        let f = forecast(&history, 7, d("2024-09-05")).expect("forecast");
        assert_eq!(f.current_trend, TrendDirection::Improving);
        let values: Vec<f64> = f.predictions.iter().map(|p| p.predicted_attendance).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().all(|v| *v <= 100.0));
        assert_eq!(values.last().copied(), Some(100.0));
        assert_eq!(f.predictions[0].date, d("2024-09-06"));
        let confidences: Vec<u32> = f.predictions.iter().map(|p| p.confidence).collect();
        assert_eq!(confidences, vec![85, 80, 75, 70, 65, 60, 60]);
    }

    #[test]
    fn forecast_declining_is_floored_at_sixty() {
        let history = [60.0, 61.0, 62.0, 75.0, 80.0, 85.0];
        let f = forecast(&history, 7, d("2024-09-05")).expect("forecast");
        assert_eq!(f.current_trend, TrendDirection::Declining);
        assert!(f.predictions.iter().all(|p| p.predicted_attendance >= 60.0));
        assert_eq!(f.predictions[6].predicted_attendance, 60.0);
    }

    #[test]
    fn forecast_stable_alternates_by_parity() {
        let f = forecast(&[80.0, 80.0, 80.0], 4, d("2024-09-05")).expect("forecast");
        let values: Vec<f64> = f.predictions.iter().map(|p| p.predicted_attendance).collect();
        assert_eq!(values, vec![81.5, 78.5, 81.5, 78.5]);
        assert_eq!(f.historical_average, 80.0);
    }

    #[test]
    fn forecast_requires_three_nonzero_points() {
        assert!(forecast(&[90.0, 0.0, 85.0, 0.0], 7, d("2024-09-05")).is_none());
    }

    #[test]
    fn weekday_pattern_skips_zero_days() {
        // 2024-09-02 is a Monday.
        let pt = |date: &str, percentage: f64| TrendPoint {
            date: d(date),
            percentage,
            total_students: 10,
            total_present: (percentage / 10.0) as usize,
        };
        let series = vec![
            pt("2024-09-02", 80.0),
            pt("2024-09-09", 0.0),
            pt("2024-09-03", 90.0),
            pt("2024-09-04", 70.0),
        ];
        let p = weekday_pattern(&series);
        assert_eq!(p.averages.len(), 3);
        assert_eq!(p.averages[0].weekday, "Monday");
        assert_eq!(p.averages[0].average, 80.0);
        assert_eq!(p.best_day, "Tuesday");
        assert_eq!(p.worst_day, "Wednesday");

        let empty = weekday_pattern(&[]);
        assert!(empty.averages.is_empty());
        assert_eq!(empty.best_day, "Monday");
        assert_eq!(empty.worst_day, "Monday");
    }

    #[test]
    fn ranking_sorts_and_compares_week_over_week() {
        let conn = db::open_in_memory().expect("db");
        add_class(&conn, "A", "Class A", 4);
        add_class(&conn, "B", "Class B", 4);
        let store = SqliteStore::new(&conn);
        mark(&store, "A", "2024-09-12", 2, 4);
        mark(&store, "B", "2024-09-12", 4, 4);
        mark(&store, "A", "2024-09-05", 2, 4);
        mark(&store, "B", "2024-09-05", 2, 4);

        let r = class_ranking(&store, d("2024-09-12"), AttendanceKind::Day, None).expect("rank");
        assert_eq!(r.rankings[0].class_name, "Class B");
        assert_eq!(r.top_performer.as_ref().map(|s| s.class_id.as_str()), Some("B"));
        assert_eq!(r.needs_attention.as_ref().map(|s| s.class_id.as_str()), Some("A"));
        assert!((r.week_comparison.current_week - 75.0).abs() < 1e-9);
        assert!((r.week_comparison.last_week - 50.0).abs() < 1e-9);
        assert!((r.week_comparison.change - 25.0).abs() < 1e-9);
    }

    #[test]
    fn best_classes_within_margin_and_skip_zero() {
        let conn = db::open_in_memory().expect("db");
        add_class(&conn, "A", "Class A", 20);
        add_class(&conn, "B", "Class B", 20);
        add_class(&conn, "C", "Class C", 20);
        add_class(&conn, "D", "Class D", 20);
        let store = SqliteStore::new(&conn);
        mark(&store, "A", "2024-09-05", 19, 20);
        mark(&store, "B", "2024-09-05", 18, 20);
        mark(&store, "C", "2024-09-05", 10, 20);
        let best = best_performing_classes(&store, d("2024-09-05"), 5.0).expect("best");
        assert_eq!(best, vec!["Class A".to_string(), "Class B".to_string()]);
        assert!(best_performing_classes(&store, d("2024-09-06"), 5.0)
            .expect("best")
            .is_empty());
    }

    #[test]
    fn student_stats_use_distinct_days() {
        let conn = scenario();
        let store = SqliteStore::new(&conn);
        store
            .append_records(&[
                rec("CS2A", 3, "2024-09-04", AttendanceStatus::Absent, false),
                rec("CS2A", 3, "2024-09-03", AttendanceStatus::Present, false),
            ])
            .expect("append");
        let student = store.get_student("CS2A-003").expect("get").expect("student");
        let p = student_profile(&store, student, d("2024-09-05"), 30, 10).expect("profile");
        assert_eq!(p.stats.total_days, 3);
        assert_eq!(p.stats.present_days, 2);
        assert_eq!(p.stats.absent_days, 1);
        assert_eq!(p.stats.late_count, 1);
        assert_eq!(p.recent_history[0].date, d("2024-09-05"));
    }

    #[test]
    fn roster_status_defaults_to_absent() {
        let conn = scenario();
        let store = SqliteStore::new(&conn);
        let rows = roster_status(&store, "CS2A", d("2024-09-06")).expect("roster");
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.status == AttendanceStatus::Absent));
        let rows = roster_status(&store, "CS2A", d("2024-09-05")).expect("roster");
        assert!(rows[2].is_late);
    }
}
