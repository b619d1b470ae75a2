use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::EngineResult;
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_scope, to_value, with_db};
use crate::ipc::types::{AppState, Request};
use crate::ranking::{self, GroupKey};

/// Accepts either `resultId` (recompute that Result's group) or the four
/// group fields.
fn stats_recompute_group(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let key = match get_optional_str(params, "resultId") {
        Some(id) => ranking::group_of(conn, &id)?,
        None => GroupKey::from_parts(
            &get_required_str(params, "subjectId")?,
            &get_required_str(params, "examSessionId")?,
            &get_required_str(params, "classId")?,
            &get_required_str(params, "educationLevel")?,
        )?,
    };
    let outcome = ranking::recompute_group(conn, &key)?;
    Ok(json!({ "outcome": to_value(&outcome)? }))
}

fn stats_recompute_scope(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let scope = parse_scope(params)?;
    let summary = ranking::recompute_scope(conn, &scope)?;
    Ok(json!({ "summary": to_value(&summary)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let resp = match req.method.as_str() {
        "stats.recomputeGroup" => with_db(state, req, stats_recompute_group),
        "stats.recomputeScope" => with_db(state, req, stats_recompute_scope),
        _ => return None,
    };
    Some(resp)
}
