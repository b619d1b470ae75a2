use rusqlite::Connection;
use serde_json::{json, Value};

use crate::directory;
use crate::error::EngineResult;
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_level, to_value, with_db};
use crate::ipc::types::{AppState, Request};

fn classes_create(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let name = get_required_str(params, "name")?;
    let id = directory::create_class(conn, &name)?;
    Ok(json!({ "classId": id }))
}

fn subjects_create(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let name = get_required_str(params, "name")?;
    let code = get_optional_str(params, "code");
    let id = directory::create_subject(conn, &name, code.as_deref())?;
    Ok(json!({ "subjectId": id }))
}

fn students_create(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let class_id = get_required_str(params, "classId")?;
    let last = get_required_str(params, "lastName")?;
    let first = get_optional_str(params, "firstName").unwrap_or_default();
    let level = parse_level(params, "educationLevel")?;
    let id = directory::create_student(conn, &class_id, &last, &first, level)?;
    Ok(json!({ "studentId": id }))
}

fn students_list(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let class_id = get_optional_str(params, "classId");
    let students = directory::list_students(conn, class_id.as_deref())?;
    Ok(json!({ "students": to_value(&students)? }))
}

fn sessions_create(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let name = get_required_str(params, "name")?;
    let result_type = get_optional_str(params, "resultType").unwrap_or_else(|| "TERMLY".into());
    let id = directory::create_session(conn, &name, &result_type)?;
    Ok(json!({ "examSessionId": id }))
}

fn sessions_set_current(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let id = get_required_str(params, "examSessionId")?;
    directory::set_current_session(conn, &id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let resp = match req.method.as_str() {
        "classes.create" => with_db(state, req, classes_create),
        "classes.list" => with_db(state, req, |conn, _| {
            Ok(json!({ "classes": to_value(&directory::list_classes(conn)?)? }))
        }),
        "subjects.create" => with_db(state, req, subjects_create),
        "subjects.list" => with_db(state, req, |conn, _| {
            Ok(json!({ "subjects": to_value(&directory::list_subjects(conn)?)? }))
        }),
        "students.create" => with_db(state, req, students_create),
        "students.list" => with_db(state, req, students_list),
        "sessions.create" => with_db(state, req, sessions_create),
        "sessions.list" => with_db(state, req, |conn, _| {
            Ok(json!({ "sessions": to_value(&directory::list_sessions(conn)?)? }))
        }),
        "sessions.setCurrent" => with_db(state, req, sessions_set_current),
        _ => return None,
    };
    Some(resp)
}
