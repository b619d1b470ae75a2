use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::{EngineError, EngineResult};
use crate::grading::{self, GradeBand};
use crate::ipc::helpers::{
    get_bool_or, get_optional_str, get_required_str, parse_params, to_value, with_db,
};
use crate::ipc::types::{AppState, Request};

fn grading_create(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let name = get_required_str(params, "name")?;
    let bands: Vec<GradeBand> = parse_params(params, Some("bands"))?;
    let make_default = get_bool_or(params, "isDefault", false);
    let id = grading::create(conn, &name, &bands, make_default)?;
    Ok(json!({ "gradingSystemId": id }))
}

fn grading_set_default(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let id = get_required_str(params, "gradingSystemId")?;
    grading::set_default(conn, &id)?;
    Ok(json!({ "ok": true }))
}

fn grading_resolve(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let percentage = params
        .get("percentage")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| EngineError::bad_params("missing percentage"))?;
    let id = match get_optional_str(params, "gradingSystemId") {
        Some(id) => grading::get(conn, &id)?.id,
        None => grading::default_id(conn)?,
    };
    let bands = grading::load_bands(conn, &id)?;
    let grade = grading::resolve_grade(percentage, &bands);
    Ok(json!({
        "gradingSystemId": id,
        "grade": to_value(&grade)?,
        "resolved": grade.is_resolved(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let resp = match req.method.as_str() {
        "grading.create" => with_db(state, req, grading_create),
        "grading.list" => with_db(state, req, |conn, _| {
            Ok(json!({ "gradingSystems": to_value(&grading::list(conn)?)? }))
        }),
        "grading.setDefault" => with_db(state, req, grading_set_default),
        "grading.resolve" => with_db(state, req, grading_resolve),
        _ => return None,
    };
    Some(resp)
}
