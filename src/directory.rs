//! Identity lookups for classes, subjects, students and exam sessions.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::model::{now_rfc3339, EducationLevel};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: String,
    pub class_id: String,
    pub display_name: String,
    pub education_level: EducationLevel,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSession {
    pub id: String,
    pub name: String,
    pub result_type: String,
    pub is_active: bool,
    pub is_current: bool,
}

/// "Last, First", the ordering key used to break ranking ties.
pub fn display_name(last: &str, first: &str) -> String {
    format!("{}, {}", last, first)
}

pub fn create_class(conn: &Connection, name: &str) -> EngineResult<String> {
    let name = require_name(name)?;
    let id = Uuid::new_v4().to_string();
    conn.execute("INSERT INTO classes(id, name) VALUES(?, ?)", (&id, name))?;
    Ok(id)
}

pub fn create_subject(conn: &Connection, name: &str, code: Option<&str>) -> EngineResult<String> {
    let name = require_name(name)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, name, code) VALUES(?, ?, ?)",
        (&id, name, code),
    )?;
    Ok(id)
}

pub fn create_student(
    conn: &Connection,
    class_id: &str,
    last_name: &str,
    first_name: &str,
    level: EducationLevel,
) -> EngineResult<String> {
    let last_name = require_name(last_name)?;
    let first_name = first_name.trim();
    if !class_exists(conn, class_id)? {
        return Err(EngineError::not_found("class", class_id));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, class_id, last_name, first_name, education_level)
         VALUES(?, ?, ?, ?, ?)",
        (&id, class_id, last_name, first_name, level.as_str()),
    )?;
    Ok(id)
}

pub fn create_session(conn: &Connection, name: &str, result_type: &str) -> EngineResult<String> {
    let name = require_name(name)?;
    let result_type = normalize_result_type(result_type)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO exam_sessions(id, name, result_type, is_active, is_current, created_at)
         VALUES(?, ?, ?, 1, 0, ?)",
        (&id, name, &result_type, now_rfc3339()),
    )?;
    Ok(id)
}

pub fn set_current_session(conn: &Connection, session_id: &str) -> EngineResult<()> {
    let tx = conn.unchecked_transaction()?;
    let exists = tx
        .query_row(
            "SELECT 1 FROM exam_sessions WHERE id = ?",
            [session_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    if !exists {
        return Err(EngineError::not_found("exam session", session_id));
    }
    tx.execute("UPDATE exam_sessions SET is_current = 0 WHERE is_current = 1", [])?;
    tx.execute(
        "UPDATE exam_sessions SET is_current = 1 WHERE id = ?",
        [session_id],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn get_student(conn: &Connection, student_id: &str) -> EngineResult<StudentRef> {
    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT class_id, last_name, first_name, education_level FROM students WHERE id = ?",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let Some((class_id, last, first, level)) = row else {
        return Err(EngineError::not_found("student", student_id));
    };
    Ok(StudentRef {
        id: student_id.to_string(),
        class_id,
        display_name: display_name(&last, &first),
        education_level: EducationLevel::parse_required(&level)?,
    })
}

pub fn get_session(conn: &Connection, session_id: &str) -> EngineResult<ExamSession> {
    conn.query_row(
        "SELECT id, name, result_type, is_active, is_current FROM exam_sessions WHERE id = ?",
        [session_id],
        map_session,
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("exam session", session_id))
}

pub fn list_sessions(conn: &Connection) -> EngineResult<Vec<ExamSession>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, result_type, is_active, is_current
         FROM exam_sessions
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], map_session)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRow {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub fn list_classes(conn: &Connection) -> EngineResult<Vec<NamedRow>> {
    let mut stmt = conn.prepare("SELECT id, name FROM classes ORDER BY name, rowid")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(NamedRow {
                id: r.get(0)?,
                name: r.get(1)?,
                code: None,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_subjects(conn: &Connection) -> EngineResult<Vec<NamedRow>> {
    let mut stmt = conn.prepare("SELECT id, name, code FROM subjects ORDER BY name, rowid")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(NamedRow {
                id: r.get(0)?,
                name: r.get(1)?,
                code: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_students(conn: &Connection, class_id: Option<&str>) -> EngineResult<Vec<StudentRef>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, last_name, first_name, education_level
         FROM students
         WHERE (?1 IS NULL OR class_id = ?1)
         ORDER BY last_name, first_name, id",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(id, class_id, last, first, level)| {
            Ok(StudentRef {
                id,
                class_id,
                display_name: display_name(&last, &first),
                education_level: EducationLevel::parse_required(&level)?,
            })
        })
        .collect()
}

pub fn subject_exists(conn: &Connection, subject_id: &str) -> EngineResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [subject_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn class_exists(conn: &Connection, class_id: &str) -> EngineResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn map_session(r: &rusqlite::Row<'_>) -> rusqlite::Result<ExamSession> {
    Ok(ExamSession {
        id: r.get(0)?,
        name: r.get(1)?,
        result_type: r.get(2)?,
        is_active: r.get::<_, i64>(3)? != 0,
        is_current: r.get::<_, i64>(4)? != 0,
    })
}

fn require_name(name: &str) -> EngineResult<&str> {
    let t = name.trim();
    if t.is_empty() {
        return Err(EngineError::bad_params("name must not be empty"));
    }
    Ok(t)
}

pub fn normalize_result_type(raw: &str) -> EngineResult<String> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(EngineError::bad_params("resultType must not be empty"));
    }
    Ok(t.to_ascii_uppercase())
}
