use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::EngineResult;
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_level, parse_scope, to_value, with_db};
use crate::ipc::types::{AppState, Request};
use crate::model::Transition;
use crate::term_reports::{self, ReportKey};

fn generate(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let scope = parse_scope(params)?;
    let created = term_reports::generate(conn, &scope)?;
    Ok(json!({ "created": created }))
}

/// One report by `reportId`, or every report in the given scope.
fn calculate_metrics(conn: &Connection, params: &Value) -> EngineResult<Value> {
    if let Some(id) = get_optional_str(params, "reportId") {
        let report = term_reports::calculate_metrics(conn, &id)?;
        return Ok(json!({ "report": to_value(&report)? }));
    }
    let scope = parse_scope(params)?;
    let mut updated = 0usize;
    for id in term_reports::ids_in_scope(conn, &scope)? {
        term_reports::calculate_metrics(conn, &id)?;
        updated += 1;
    }
    Ok(json!({ "updated": updated }))
}

fn recompute_positions(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let key = ReportKey {
        exam_session_id: get_required_str(params, "examSessionId")?,
        class_id: get_required_str(params, "classId")?,
        education_level: parse_level(params, "educationLevel")?,
    };
    let ranked = term_reports::recompute_positions(conn, &key)?;
    Ok(json!({ "ranked": ranked }))
}

fn list(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let scope = parse_scope(params)?;
    Ok(json!({ "reports": to_value(&term_reports::list(conn, &scope)?)? }))
}

fn transition(conn: &Connection, params: &Value, action: Transition) -> EngineResult<Value> {
    let id = get_required_str(params, "reportId")?;
    let actor = get_optional_str(params, "actor");
    let report = term_reports::transition(conn, &id, action, actor.as_deref())?;
    Ok(json!({ "report": to_value(&report)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let action = match req.method.as_str() {
        "termReports.generate" => return Some(with_db(state, req, generate)),
        "termReports.calculateMetrics" => return Some(with_db(state, req, calculate_metrics)),
        "termReports.recomputePositions" => return Some(with_db(state, req, recompute_positions)),
        "termReports.list" => return Some(with_db(state, req, list)),
        "termReports.submit" => Transition::Submit,
        "termReports.approve" => Transition::Approve,
        "termReports.publish" => Transition::Publish,
        "termReports.reject" => Transition::Reject,
        _ => return None,
    };
    Some(with_db(state, req, |conn, params| {
        transition(conn, params, action)
    }))
}
