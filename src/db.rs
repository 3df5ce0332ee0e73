use crate::store::{
    AttendanceKind, AttendanceRecord, AttendanceStatus, ClassEntity, RecordFilter, RecordPatch,
    RecordStore, StaffUser, Student,
};
use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const DATE_FMT: &str = "%Y-%m-%d";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("attendance.sqlite3");
    let conn = Connection::open(&db_path)
        .with_context(|| format!("open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            assigned_classes TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL DEFAULT '',
            semester INTEGER NOT NULL DEFAULT 0,
            section TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // No foreign key on class_id: a student pointing at a missing class yields empty joins.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            roll_number TEXT NOT NULL,
            name TEXT NOT NULL,
            class_id TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            kind TEXT NOT NULL,
            period INTEGER,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL,
            is_late INTEGER NOT NULL DEFAULT 0,
            marked_by TEXT NOT NULL DEFAULT '',
            locked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            submitted_as TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_class_date ON attendance_records(class_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance_records(student_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn insert_class(conn: &Connection, class: &ClassEntity) -> anyhow::Result<()> {
    let next_sort: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM classes",
        [],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO classes(id, name, department, semester, section, sort_order)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &class.id,
            &class.name,
            &class.department,
            class.semester,
            &class.section,
            next_sort,
        ),
    )
    .with_context(|| format!("insert class {}", class.id))?;
    Ok(())
}

pub fn insert_student(conn: &Connection, student: &Student) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO students(id, roll_number, name, class_id, email, phone)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.roll_number,
            &student.name,
            &student.class_id,
            &student.email,
            &student.phone,
        ),
    )
    .with_context(|| format!("insert student {}", student.id))?;
    Ok(())
}

pub fn upsert_user(conn: &Connection, user: &StaffUser) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users(id, username, name, role, assigned_classes)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           username = excluded.username,
           name = excluded.name,
           role = excluded.role,
           assigned_classes = excluded.assigned_classes",
        (
            &user.id,
            &user.username,
            &user.name,
            &user.role,
            serde_json::to_string(&user.assigned_classes)?,
        ),
    )?;
    Ok(())
}

pub fn list_users(conn: &Connection) -> anyhow::Result<Vec<StaffUser>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, name, role, assigned_classes FROM users ORDER BY username",
    )?;
    let rows = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<StaffUser> {
    let assigned_raw: String = r.get(4)?;
    let assigned_classes = serde_json::from_str::<Vec<String>>(&assigned_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(StaffUser {
        id: r.get(0)?,
        username: r.get(1)?,
        name: r.get(2)?,
        role: r.get(3)?,
        assigned_classes,
    })
}

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<ClassEntity> {
    Ok(ClassEntity {
        id: r.get(0)?,
        name: r.get(1)?,
        department: r.get(2)?,
        semester: r.get(3)?,
        section: r.get(4)?,
    })
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        roll_number: r.get(1)?,
        name: r.get(2)?,
        class_id: r.get(3)?,
        email: r.get(4)?,
        phone: r.get(5)?,
    })
}

fn parse_date_col(r: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = r.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_kind_col(r: &Row<'_>, idx: usize) -> rusqlite::Result<AttendanceKind> {
    let raw: String = r.get(idx)?;
    AttendanceKind::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown attendance kind: {}", raw).into(),
        )
    })
}

const RECORD_COLUMNS: &str = "id, class_id, date, kind, period, student_id, status, is_late,
    marked_by, locked, created_at, submitted_as";

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let status_raw: String = r.get(6)?;
    let status = AttendanceStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("unknown attendance status: {}", status_raw).into(),
        )
    })?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        class_id: r.get(1)?,
        date: parse_date_col(r, 2)?,
        kind: parse_kind_col(r, 3)?,
        period: r.get::<_, Option<i64>>(4)?.map(|p| p as u32),
        student_id: r.get(5)?,
        status,
        is_late: r.get::<_, i64>(7)? != 0,
        marked_by: r.get(8)?,
        locked: r.get::<_, i64>(9)? != 0,
        created_at: r.get(10)?,
        submitted_as: parse_kind_col(r, 11)?,
    })
}

fn filter_clause(filter: &RecordFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(class_id) = &filter.class_id {
        clauses.push("class_id = ?");
        values.push(Value::Text(class_id.clone()));
    }
    if let Some(date) = filter.date {
        clauses.push("date = ?");
        values.push(Value::Text(date.format(DATE_FMT).to_string()));
    }
    if let Some(kind) = filter.kind {
        clauses.push("kind = ?");
        values.push(Value::Text(kind.as_str().to_string()));
        match kind {
            AttendanceKind::Day => clauses.push("(period IS NULL OR period = 1)"),
            AttendanceKind::Period => {
                if let Some(p) = filter.period {
                    clauses.push("period = ?");
                    values.push(Value::Integer(p as i64));
                }
            }
        }
    }
    if clauses.is_empty() {
        ("1 = 1".to_string(), values)
    } else {
        (clauses.join(" AND "), values)
    }
}

/// `RecordStore` over a workspace connection.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl RecordStore for SqliteStore<'_> {
    fn list_classes(&self) -> anyhow::Result<Vec<ClassEntity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, department, semester, section FROM classes ORDER BY sort_order, id",
        )?;
        let rows = stmt
            .query_map([], class_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_class(&self, id: &str) -> anyhow::Result<Option<ClassEntity>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, department, semester, section FROM classes WHERE id = ?",
                [id],
                class_from_row,
            )
            .optional()?)
    }

    fn list_students(&self, class_id: &str) -> anyhow::Result<Vec<Student>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, roll_number, name, class_id, email, phone
             FROM students
             WHERE class_id = ?
             ORDER BY roll_number, rowid",
        )?;
        let rows = stmt
            .query_map([class_id], student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_student(&self, id: &str) -> anyhow::Result<Option<Student>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, roll_number, name, class_id, email, phone FROM students WHERE id = ?",
                [id],
                student_from_row,
            )
            .optional()?)
    }

    fn search_students(&self, text: &str) -> anyhow::Result<Vec<Student>> {
        let needle = text.to_lowercase();
        let mut stmt = self.conn.prepare(
            "SELECT id, roll_number, name, class_id, email, phone
             FROM students
             WHERE instr(lower(name), ?1) > 0 OR instr(lower(roll_number), ?1) > 0
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([needle], student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_records(&self, filter: &RecordFilter) -> anyhow::Result<Vec<AttendanceRecord>> {
        let (clause, values) = filter_clause(filter);
        let sql = format!(
            "SELECT {} FROM attendance_records WHERE {} ORDER BY rowid",
            RECORD_COLUMNS, clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_student_history(
        &self,
        student_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {} FROM attendance_records
             WHERE student_id = ? AND date >= ? AND date <= ?
             ORDER BY date DESC, rowid",
            RECORD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                (
                    student_id,
                    start.format(DATE_FMT).to_string(),
                    end.format(DATE_FMT).to_string(),
                ),
                record_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn append_records(&self, records: &[AttendanceRecord]) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for rec in records {
            tx.execute(
                "INSERT INTO attendance_records(
                    id, class_id, date, kind, period, student_id, status, is_late,
                    marked_by, locked, created_at, submitted_as)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    rec.id,
                    rec.class_id,
                    rec.date.format(DATE_FMT).to_string(),
                    rec.kind.as_str(),
                    rec.period.map(|p| p as i64),
                    rec.student_id,
                    rec.status.as_str(),
                    rec.is_late as i64,
                    rec.marked_by,
                    rec.locked as i64,
                    rec.created_at,
                    rec.submitted_as.as_str(),
                ],
            )
            .with_context(|| format!("insert attendance record {}", rec.id))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn patch_record(&self, id: &str, patch: &RecordPatch) -> anyhow::Result<bool> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(status) = patch.status {
            sets.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(is_late) = patch.is_late {
            sets.push("is_late = ?");
            values.push(Value::Integer(is_late as i64));
        }
        if let Some(locked) = patch.locked {
            sets.push("locked = ?");
            values.push(Value::Integer(locked as i64));
        }
        if sets.is_empty() {
            let exists = self
                .conn
                .query_row("SELECT 1 FROM attendance_records WHERE id = ?", [id], |r| {
                    r.get::<_, i64>(0)
                })
                .optional()?
                .is_some();
            return Ok(exists);
        }
        values.push(Value::Text(id.to_string()));
        let sql = format!(
            "UPDATE attendance_records SET {} WHERE id = ?",
            sets.join(", ")
        );
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed > 0)
    }

    fn lock_group(
        &self,
        class_id: &str,
        date: NaiveDate,
        kind: AttendanceKind,
        period: Option<u32>,
    ) -> anyhow::Result<usize> {
        let (clause, values) = filter_clause(&RecordFilter::group(class_id, date, kind, period));
        let sql = format!("UPDATE attendance_records SET locked = 1 WHERE {}", clause);
        Ok(self.conn.execute(&sql, params_from_iter(values))?)
    }

    fn get_user(&self, id: &str) -> anyhow::Result<Option<StaffUser>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, username, name, role, assigned_classes FROM users WHERE id = ?",
                [id],
                user_from_row,
            )
            .optional()?)
    }
}
