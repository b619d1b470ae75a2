use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::EngineResult;
use crate::ipc::helpers::{get_optional_str, parse_scope, to_value, with_db};
use crate::ipc::types::{AppState, Request};
use crate::recalc;

const DEFAULT_RUNS_LIMIT: usize = 20;

fn recalc_run(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let scope = parse_scope(params)?;
    let summary = recalc::run(conn, &scope)?;
    Ok(json!({ "summary": to_value(&summary)? }))
}

fn recalc_runs(conn: &Connection, params: &Value) -> EngineResult<Value> {
    if let Some(id) = get_optional_str(params, "runId") {
        return Ok(json!({ "runs": [to_value(&recalc::get_run(conn, &id)?)?] }));
    }
    let limit = params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_RUNS_LIMIT);
    Ok(json!({ "runs": to_value(&recalc::list_runs(conn, limit)?)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let resp = match req.method.as_str() {
        "recalc.run" => with_db(state, req, recalc_run),
        "recalc.runs" => with_db(state, req, recalc_runs),
        _ => return None,
    };
    Some(resp)
}
