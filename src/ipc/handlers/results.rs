use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::EngineResult;
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_params, parse_scope, to_value, with_db};
use crate::ipc::types::{AppState, Request};
use crate::model::{Status, Transition};
use crate::results::{self, NewResult, RawScores, ResultFilter};

fn results_create(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let input = NewResult {
        student_id: get_required_str(params, "studentId")?,
        subject_id: get_required_str(params, "subjectId")?,
        exam_session_id: get_required_str(params, "examSessionId")?,
        grading_system_id: get_optional_str(params, "gradingSystemId"),
        scores: parse_params(params, Some("scores"))?,
        entered_by: get_optional_str(params, "enteredBy"),
        remarks: get_optional_str(params, "remarks"),
    };
    let record = results::create(conn, &input)?;
    Ok(json!({ "result": to_value(&record)? }))
}

fn results_update_scores(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let id = get_required_str(params, "resultId")?;
    let scores: RawScores = parse_params(params, Some("scores"))?;
    let grading = get_optional_str(params, "gradingSystemId");
    let entered_by = get_optional_str(params, "enteredBy");
    let record = results::update_scores(
        conn,
        &id,
        &scores,
        grading.as_deref(),
        entered_by.as_deref(),
    )?;
    Ok(json!({ "result": to_value(&record)? }))
}

fn results_get(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let id = get_required_str(params, "resultId")?;
    Ok(json!({ "result": to_value(&results::get(conn, &id)?)? }))
}

fn results_list(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let status = match get_optional_str(params, "status") {
        Some(s) => Some(
            Status::parse(&s.to_ascii_uppercase())
                .ok_or_else(|| crate::error::EngineError::bad_params(format!("unknown status '{s}'")))?,
        ),
        None => None,
    };
    let filter = ResultFilter {
        scope: parse_scope(params)?,
        subject_id: get_optional_str(params, "subjectId"),
        student_id: get_optional_str(params, "studentId"),
        status,
    };
    Ok(json!({ "results": to_value(&results::list(conn, &filter)?)? }))
}

fn results_transition(conn: &Connection, params: &Value, action: Transition) -> EngineResult<Value> {
    let id = get_required_str(params, "resultId")?;
    let actor = get_optional_str(params, "actor");
    let record = results::transition(conn, &id, action, actor.as_deref())?;
    Ok(json!({ "result": to_value(&record)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let action = match req.method.as_str() {
        "results.create" => return Some(with_db(state, req, results_create)),
        "results.updateScores" => return Some(with_db(state, req, results_update_scores)),
        "results.get" => return Some(with_db(state, req, results_get)),
        "results.list" => return Some(with_db(state, req, results_list)),
        "results.submit" => Transition::Submit,
        "results.approve" => Transition::Approve,
        "results.publish" => Transition::Publish,
        "results.reject" => Transition::Reject,
        _ => return None,
    };
    Some(with_db(state, req, |conn, params| {
        results_transition(conn, params, action)
    }))
}
