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

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultd");
    let mut child = Command::new(exe)
        .env_remove("RESULTD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(Value::Null)
}

/// Sends a request expected to fail and returns its error code.
pub fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

pub fn str_at(v: &Value, pointer: &str) -> String {
    v.pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing string at {} in {}", pointer, v))
        .to_string()
}

/// A sidecar with a workspace holding one class, one subject, one session,
/// a default grading system and a default senior-secondary configuration
/// (test1 15, test2 15, exam 70).
pub struct SeniorSchool {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    pub class_id: String,
    pub subject_id: String,
    pub session_id: String,
    next_id: u32,
}

impl SeniorSchool {
    pub fn open(prefix: &str) -> Self {
        let workspace = temp_dir(prefix);
        let (child, stdin, reader) = spawn_sidecar();
        let mut school = Self {
            child,
            stdin,
            reader,
            class_id: String::new(),
            subject_id: String::new(),
            session_id: String::new(),
            next_id: 0,
        };
        school.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        let class = school.ok("classes.create", json!({ "name": "SS2 Gold" }));
        school.class_id = str_at(&class, "/classId");
        let subject = school.ok("subjects.create", json!({ "name": "English", "code": "ENG" }));
        school.subject_id = str_at(&subject, "/subjectId");
        let session = school.ok(
            "sessions.create",
            json!({ "name": "First Term 2025/2026", "resultType": "TERMLY" }),
        );
        school.session_id = str_at(&session, "/examSessionId");
        school.ok(
            "grading.create",
            json!({
                "name": "Standard",
                "isDefault": true,
                "bands": [
                    { "minScore": 0, "maxScore": 39, "letter": "F", "gradePoint": 0, "isPassing": false },
                    { "minScore": 40, "maxScore": 54, "letter": "C", "gradePoint": 2, "isPassing": true },
                    { "minScore": 55, "maxScore": 69, "letter": "B", "gradePoint": 3, "isPassing": true },
                    { "minScore": 70, "maxScore": 100, "letter": "A", "gradePoint": 4, "isPassing": true }
                ]
            }),
        );
        school.ok(
            "scoring.create",
            json!({
                "config": {
                    "name": "Senior termly",
                    "educationLevel": "SENIOR_SECONDARY",
                    "resultType": "TERMLY",
                    "components": [
                        { "key": "test1", "max": 15 },
                        { "key": "test2", "max": 15 },
                        { "key": "exam", "max": 70 }
                    ],
                    "totalMaxScore": 100,
                    "caWeight": 30,
                    "examWeight": 70,
                    "isDefault": true
                }
            }),
        );
        school
    }

    fn next(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let id = self.next();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn err_code(&mut self, method: &str, params: Value) -> String {
        let id = self.next();
        request_err_code(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn student(&mut self, last_name: &str) -> String {
        let class_id = self.class_id.clone();
        let v = self.ok(
            "students.create",
            json!({
                "classId": class_id,
                "lastName": last_name,
                "firstName": "Test",
                "educationLevel": "SENIOR_SECONDARY"
            }),
        );
        str_at(&v, "/studentId")
    }

    /// Enters a DRAFT result whose total equals `total`.
    pub fn draft_result(&mut self, student_id: &str, total: f64) -> String {
        let exam = total.min(70.0);
        let test1 = (total - exam).min(15.0);
        let test2 = total - exam - test1;
        let (subject, session) = (self.subject_id.clone(), self.session_id.clone());
        let v = self.ok(
            "results.create",
            json!({
                "studentId": student_id,
                "subjectId": subject,
                "examSessionId": session,
                "scores": { "test1": test1, "test2": test2, "exam": exam },
                "enteredBy": "teacher-1"
            }),
        );
        str_at(&v, "/result/id")
    }

    pub fn approve(&mut self, result_id: &str) -> Value {
        self.ok("results.submit", json!({ "resultId": result_id }));
        self.ok(
            "results.approve",
            json!({ "resultId": result_id, "actor": "hod" }),
        )
    }

    pub fn result(&mut self, result_id: &str) -> Value {
        self.ok("results.get", json!({ "resultId": result_id }))
            .get("result")
            .cloned()
            .expect("result")
    }

    pub fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}
