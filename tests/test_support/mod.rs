#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_attendanced");
        let mut child = Command::new(exe)
            .env_remove("ATTENDANCED_WORKSPACE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn attendanced");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Spawns a sidecar with a fresh workspace selected.
    pub fn with_workspace(prefix: &str) -> Self {
        let mut sidecar = Self::spawn();
        let workspace = temp_dir(prefix);
        sidecar.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
        sidecar
    }

    pub fn send_line(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    /// Sends a request that must succeed and returns its result.
    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Sends a request that must fail and returns its error code.
    pub fn error_code(&mut self, method: &str, params: Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    /// One class with `students` students (`{class_id}-1`..) and a staff user `staff1`.
    pub fn seed_class(&mut self, class_id: &str, name: &str, students: usize) {
        self.ok(
            "users.create",
            json!({ "id": "staff1", "username": "jsmith", "name": "Prof. John Smith" }),
        );
        self.ok(
            "classes.create",
            json!({
                "id": class_id,
                "name": name,
                "department": "Computer Science",
                "semester": 3,
                "section": "A"
            }),
        );
        for i in 1..=students {
            self.ok(
                "students.create",
                json!({
                    "id": format!("{}-{}", class_id, i),
                    "rollNumber": format!("{}{:03}", class_id, i),
                    "name": format!("Student {}", i),
                    "classId": class_id
                }),
            );
        }
    }

    /// Primary submission marking the first `present` students present.
    pub fn submit(&mut self, class_id: &str, date: &str, present: usize) -> Value {
        let records: Vec<Value> = (1..=present)
            .map(|i| json!({ "studentId": format!("{}-{}", class_id, i), "status": "present" }))
            .collect();
        self.ok(
            "attendance.submit",
            json!({
                "classId": class_id,
                "date": date,
                "kind": "day",
                "markedBy": "staff1",
                "records": records
            }),
        )
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
