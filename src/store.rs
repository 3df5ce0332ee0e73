use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceKind {
    Day,
    Period,
}

impl AttendanceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceKind::Day => "day",
            AttendanceKind::Period => "period",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Some(Self::Day),
            "period" => Some(Self::Period),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassEntity {
    pub id: String,
    pub name: String,
    pub department: String,
    pub semester: i64,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub roll_number: String,
    pub name: String,
    /// Plain field; a class id with no matching class is tolerated.
    pub class_id: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: String,
    pub assigned_classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub kind: AttendanceKind,
    pub period: Option<u32>,
    pub student_id: String,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub marked_by: String,
    pub locked: bool,
    pub created_at: String,
    pub submitted_as: AttendanceKind,
}

impl AttendanceRecord {
    /// Storage does not enforce that absent records are never late, so both fields are checked.
    pub fn is_latecomer(&self) -> bool {
        self.status == AttendanceStatus::Present && self.is_late
    }

    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Present
    }
}

/// Optional filters for record fetches. `None` fields match everything.
///
/// A `Day` kind matches records whose period is null or 1. A `Period` kind with a period
/// only matches that period; without one it matches every period record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub class_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub kind: Option<AttendanceKind>,
    pub period: Option<u32>,
}

impl RecordFilter {
    pub fn group(class_id: &str, date: NaiveDate, kind: AttendanceKind, period: Option<u32>) -> Self {
        Self {
            class_id: Some(class_id.to_string()),
            date: Some(date),
            kind: Some(kind),
            period,
        }
    }

    pub fn class_day(class_id: &str, date: NaiveDate) -> Self {
        Self {
            class_id: Some(class_id.to_string()),
            date: Some(date),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    pub status: Option<AttendanceStatus>,
    pub is_late: Option<bool>,
    pub locked: Option<bool>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.is_late.is_none() && self.locked.is_none()
    }
}

/// Read/append access to the attendance workspace.
pub trait RecordStore {
    fn list_classes(&self) -> anyhow::Result<Vec<ClassEntity>>;
    fn get_class(&self, id: &str) -> anyhow::Result<Option<ClassEntity>>;
    fn list_students(&self, class_id: &str) -> anyhow::Result<Vec<Student>>;
    fn get_student(&self, id: &str) -> anyhow::Result<Option<Student>>;
    /// Case-insensitive substring match on name or roll number.
    fn search_students(&self, text: &str) -> anyhow::Result<Vec<Student>>;
    /// Records in insertion order.
    fn get_records(&self, filter: &RecordFilter) -> anyhow::Result<Vec<AttendanceRecord>>;
    /// Inclusive range, newest first.
    fn get_student_history(
        &self,
        student_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<AttendanceRecord>>;
    fn append_records(&self, records: &[AttendanceRecord]) -> anyhow::Result<()>;
    /// Returns false when no record has this id.
    fn patch_record(&self, id: &str, patch: &RecordPatch) -> anyhow::Result<bool>;
    /// Sets `locked` on every record of the group and returns how many rows changed.
    fn lock_group(
        &self,
        class_id: &str,
        date: NaiveDate,
        kind: AttendanceKind,
        period: Option<u32>,
    ) -> anyhow::Result<usize>;
    fn get_user(&self, id: &str) -> anyhow::Result<Option<StaffUser>>;

    fn is_group_locked(
        &self,
        class_id: &str,
        date: NaiveDate,
        kind: AttendanceKind,
        period: Option<u32>,
    ) -> anyhow::Result<bool> {
        let records = self.get_records(&RecordFilter::group(class_id, date, kind, period))?;
        Ok(records.iter().any(|r| r.locked))
    }
}
