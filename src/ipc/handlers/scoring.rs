use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::EngineResult;
use crate::ipc::helpers::{
    get_required_str, parse_level, parse_optional_level, parse_params, to_value, with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::scoring::{self, ScoringDraft};

fn scoring_create(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let draft: ScoringDraft = parse_params(params, Some("config"))?;
    let id = scoring::create(conn, &draft)?;
    Ok(json!({ "configId": id }))
}

fn scoring_update(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let id = get_required_str(params, "configId")?;
    let draft: ScoringDraft = parse_params(params, Some("config"))?;
    scoring::update(conn, &id, &draft)?;
    Ok(json!({ "config": to_value(&scoring::get(conn, &id)?)? }))
}

fn scoring_list(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let level = parse_optional_level(params, "educationLevel")?;
    Ok(json!({ "configs": to_value(&scoring::list(conn, level)?)? }))
}

fn scoring_set_default(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let id = get_required_str(params, "configId")?;
    scoring::set_default(conn, &id)?;
    Ok(json!({ "ok": true }))
}

fn scoring_resolve(conn: &Connection, params: &Value) -> EngineResult<Value> {
    let level = parse_level(params, "educationLevel")?;
    let result_type = get_required_str(params, "resultType")?;
    let config = scoring::resolve(conn, level, &result_type)?;
    Ok(json!({ "config": to_value(&config)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let resp = match req.method.as_str() {
        "scoring.create" => with_db(state, req, scoring_create),
        "scoring.update" => with_db(state, req, scoring_update),
        "scoring.list" => with_db(state, req, scoring_list),
        "scoring.setDefault" => with_db(state, req, scoring_set_default),
        "scoring.resolve" => with_db(state, req, scoring_resolve),
        _ => return None,
    };
    Some(resp)
}
