use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{EducationLevel, Scope};

pub fn with_db<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> EngineResult<Value>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn get_required_str(params: &Value, key: &str) -> EngineResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_bool_or(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

pub fn parse_level(params: &Value, key: &str) -> EngineResult<EducationLevel> {
    EducationLevel::parse_required(&get_required_str(params, key)?)
}

pub fn parse_optional_level(params: &Value, key: &str) -> EngineResult<Option<EducationLevel>> {
    get_optional_str(params, key)
        .map(|s| EducationLevel::parse_required(&s))
        .transpose()
}

/// Deserializes `params[key]`, or the whole params object when `key` is
/// `None`.
pub fn parse_params<T: DeserializeOwned>(params: &Value, key: Option<&str>) -> EngineResult<T> {
    let v = match key {
        Some(k) => params
            .get(k)
            .cloned()
            .ok_or_else(|| EngineError::bad_params(format!("missing {}", k)))?,
        None => params.clone(),
    };
    serde_json::from_value(v).map_err(|e| EngineError::bad_params(e.to_string()))
}

pub fn parse_scope(params: &Value) -> EngineResult<Scope> {
    Ok(Scope {
        education_level: parse_optional_level(params, "educationLevel")?,
        exam_session_id: get_optional_str(params, "examSessionId"),
        class_id: get_optional_str(params, "classId"),
    })
}

pub fn to_value<T: serde::Serialize>(v: &T) -> EngineResult<Value> {
    serde_json::to_value(v).map_err(|e| EngineError::bad_params(e.to_string()))
}
