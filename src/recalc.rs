//! Scoped batch recalculation. A failure inside a stage is recorded against
//! its target and the stage moves on.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::model::{now_rfc3339, Scope};
use crate::ranking::GroupFailure;
use crate::results::bad_column;
use crate::{ranking, results, term_reports};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compute,
    ClassRanking,
    TermAggregation,
    TermRanking,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageError {
    pub stage: Stage,
    pub target: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub scope: Scope,
    pub started_at: String,
    pub finished_at: String,
    pub results_recomputed: usize,
    pub groups_ranked: usize,
    pub reports_created: usize,
    pub reports_aggregated: usize,
    pub report_groups_ranked: usize,
    pub errors: Vec<StageError>,
}

impl RunSummary {
    fn fail(&mut self, stage: Stage, target: impl Into<String>, e: &EngineError) {
        let target = target.into();
        tracing::warn!(?stage, %target, error = %e, "recalculation step failed");
        self.errors.push(StageError {
            stage,
            target,
            code: e.code().to_string(),
            message: e.to_string(),
        });
    }

    fn record(&mut self, stage: Stage, f: GroupFailure) {
        self.errors.push(StageError {
            stage,
            target: f.group,
            code: f.code,
            message: f.message,
        });
    }
}

/// Only a failure to read the scope or to record the run itself is returned
/// as an error; everything else lands in `RunSummary::errors`.
pub fn run(conn: &Connection, scope: &Scope) -> EngineResult<RunSummary> {
    let mut summary = RunSummary {
        run_id: Uuid::new_v4().to_string(),
        scope: scope.clone(),
        started_at: now_rfc3339(),
        ..Default::default()
    };
    let filters = serde_json::to_string(scope)
        .map_err(|e| EngineError::bad_params(format!("scope: {e}")))?;
    conn.execute(
        "INSERT INTO recalculation_runs(id, filters, started_at) VALUES(?, ?, ?)",
        (&summary.run_id, &filters, &summary.started_at),
    )?;
    tracing::info!(run_id = %summary.run_id, ?scope, "recalculation started");

    for id in results::ids_in_scope(conn, scope)? {
        match results::recompute_derived(conn, &id) {
            Ok(_) => summary.results_recomputed += 1,
            Err(e) => summary.fail(Stage::Compute, id, &e),
        }
    }

    let (groups, unreadable) = ranking::distinct_groups(conn, scope)?;
    let ranked = ranking::recompute_groups(conn, &groups);
    summary.groups_ranked = ranked.groups;
    for f in unreadable.into_iter().chain(ranked.failures) {
        summary.record(Stage::ClassRanking, f);
    }

    match term_reports::generate(conn, scope) {
        Ok(n) => summary.reports_created = n,
        Err(e) => summary.fail(Stage::TermAggregation, "generate", &e),
    }
    // Every report in scope is aggregated before any group is ranked.
    for id in term_reports::ids_in_scope(conn, scope)? {
        match term_reports::calculate_metrics(conn, &id) {
            Ok(_) => summary.reports_aggregated += 1,
            Err(e) => summary.fail(Stage::TermAggregation, id, &e),
        }
    }

    let (report_groups, unreadable) = term_reports::distinct_report_groups(conn, scope)?;
    for f in unreadable {
        summary.record(Stage::TermRanking, f);
    }
    for key in report_groups {
        match term_reports::recompute_positions(conn, &key) {
            Ok(_) => summary.report_groups_ranked += 1,
            Err(e) => summary.fail(Stage::TermRanking, key.to_string(), &e),
        }
    }

    summary.finished_at = now_rfc3339();
    let recorded = serde_json::to_string(&summary)
        .map_err(|e| EngineError::bad_params(format!("summary: {e}")))?;
    conn.execute(
        "UPDATE recalculation_runs SET finished_at = ?, summary = ? WHERE id = ?",
        (&summary.finished_at, &recorded, &summary.run_id),
    )?;
    tracing::info!(
        run_id = %summary.run_id,
        results = summary.results_recomputed,
        groups = summary.groups_ranked,
        reports = summary.reports_aggregated,
        errors = summary.errors.len(),
        "recalculation finished"
    );
    Ok(summary)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub filters: serde_json::Value,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub summary: Option<serde_json::Value>,
}

fn map_run(r: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    let filters: String = r.get(1)?;
    let summary: Option<String> = r.get(4)?;
    let summary = match summary {
        Some(s) => Some(serde_json::from_str(&s).map_err(|_| bad_column(4, &s))?),
        None => None,
    };
    Ok(RunRecord {
        id: r.get(0)?,
        filters: serde_json::from_str(&filters).map_err(|_| bad_column(1, &filters))?,
        started_at: r.get(2)?,
        finished_at: r.get(3)?,
        summary,
    })
}

pub fn list_runs(conn: &Connection, limit: usize) -> EngineResult<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, filters, started_at, finished_at, summary
         FROM recalculation_runs
         ORDER BY rowid DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map([limit as i64], map_run)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_run(conn: &Connection, id: &str) -> EngineResult<RunRecord> {
    conn.query_row(
        "SELECT id, filters, started_at, finished_at, summary
         FROM recalculation_runs WHERE id = ?",
        [id],
        map_run,
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("recalculation run", id))
}
