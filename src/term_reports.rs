//! Term reports. `calculate_metrics` must have run for every report in a
//! group before `recompute_positions` ranks it.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::display_name;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    now_rfc3339, round_off_2_decimals, scope_sql, EducationLevel, Scope, Status, Transition,
    ELIGIBLE_STATUS_SQL,
};
use crate::ranking::{assign_positions, GroupFailure, RankEntry};
use crate::results::bad_column;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermReport {
    pub id: String,
    pub student_id: String,
    pub exam_session_id: String,
    pub class_id: String,
    pub education_level: EducationLevel,
    pub total_score: f64,
    pub average_score: f64,
    pub overall_percentage: f64,
    pub subjects_count: i64,
    pub class_position: Option<i64>,
    pub total_students: Option<i64>,
    pub status: Status,
    pub approved_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TermReport {
    pub fn key(&self) -> ReportKey {
        ReportKey {
            exam_session_id: self.exam_session_id.clone(),
            class_id: self.class_id.clone(),
            education_level: self.education_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportKey {
    pub exam_session_id: String,
    pub class_id: String,
    pub education_level: EducationLevel,
}

impl std::fmt::Display for ReportKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.exam_session_id, self.class_id, self.education_level
        )
    }
}

const SELECT_COLUMNS: &str = "id, student_id, exam_session_id, class_id, education_level,
     total_score, average_score, overall_percentage, subjects_count,
     class_position, total_students, status, approved_by, created_at, updated_at";

fn map_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<TermReport> {
    let level: String = r.get(4)?;
    let status: String = r.get(11)?;
    Ok(TermReport {
        id: r.get(0)?,
        student_id: r.get(1)?,
        exam_session_id: r.get(2)?,
        class_id: r.get(3)?,
        education_level: EducationLevel::parse(&level).ok_or_else(|| bad_column(4, &level))?,
        total_score: r.get(5)?,
        average_score: r.get(6)?,
        overall_percentage: r.get(7)?,
        subjects_count: r.get(8)?,
        class_position: r.get(9)?,
        total_students: r.get(10)?,
        status: Status::parse(&status).ok_or_else(|| bad_column(11, &status))?,
        approved_by: r.get(12)?,
        created_at: r.get(13)?,
        updated_at: r.get(14)?,
    })
}

pub fn get(conn: &Connection, id: &str) -> EngineResult<TermReport> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM term_reports WHERE id = ?");
    conn.query_row(&sql, [id], map_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("term report", id))
}

pub fn list(conn: &Connection, scope: &Scope) -> EngineResult<Vec<TermReport>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM term_reports t
         WHERE {}
         ORDER BY t.exam_session_id, t.class_id, t.education_level,
                  t.class_position IS NULL, t.class_position, t.rowid",
        scope_sql("t")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(scope.bind_values()), map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn generate(conn: &Connection, scope: &Scope) -> EngineResult<usize> {
    let sql = format!(
        "SELECT DISTINCT r.student_id, r.exam_session_id, r.class_id, r.education_level
         FROM results r
         WHERE {} AND r.{ELIGIBLE_STATUS_SQL}
         ORDER BY r.exam_session_id, r.class_id, r.student_id",
        scope_sql("r")
    );
    let tx = conn.unchecked_transaction()?;
    let candidates = {
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(scope.bind_values()), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let now = now_rfc3339();
    let mut created = 0usize;
    for (student_id, session_id, class_id, level) in &candidates {
        created += tx.execute(
            "INSERT INTO term_reports(
                id, student_id, exam_session_id, class_id, education_level,
                status, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, 'DRAFT', ?, ?)
             ON CONFLICT(student_id, exam_session_id, education_level) DO NOTHING",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                student_id,
                session_id,
                class_id,
                level,
                now,
                now
            ],
        )?;
    }
    tx.commit()?;
    tracing::debug!(candidates = candidates.len(), created, "term reports generated");
    Ok(created)
}

/// A report with no eligible Results gets zeros.
pub fn calculate_metrics(conn: &Connection, report_id: &str) -> EngineResult<TermReport> {
    let report = get(conn, report_id)?;
    let sql = format!(
        "SELECT COALESCE(SUM(total_score), 0), COUNT(*), COALESCE(AVG(total_percentage), 0)
         FROM results
         WHERE student_id = ? AND exam_session_id = ? AND education_level = ?
           AND {ELIGIBLE_STATUS_SQL}"
    );
    let (total, count, overall): (f64, i64, f64) = conn.query_row(
        &sql,
        (
            &report.student_id,
            &report.exam_session_id,
            report.education_level.as_str(),
        ),
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    let average = if count > 0 {
        round_off_2_decimals(total / count as f64)
    } else {
        0.0
    };
    let overall = round_off_2_decimals(overall);

    conn.execute(
        "UPDATE term_reports SET
            total_score = ?, average_score = ?, overall_percentage = ?,
            subjects_count = ?, updated_at = ?
         WHERE id = ?",
        rusqlite::params![total, average, overall, count, now_rfc3339(), report_id],
    )?;
    get(conn, report_id)
}

pub fn ids_in_scope(conn: &Connection, scope: &Scope) -> EngineResult<Vec<String>> {
    let sql = format!(
        "SELECT t.id FROM term_reports t WHERE {} ORDER BY t.rowid",
        scope_sql("t")
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(rusqlite::params_from_iter(scope.bind_values()), |r| {
            r.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn distinct_report_groups(
    conn: &Connection,
    scope: &Scope,
) -> EngineResult<(Vec<ReportKey>, Vec<GroupFailure>)> {
    let sql = format!(
        "SELECT DISTINCT t.exam_session_id, t.class_id, t.education_level
         FROM term_reports t
         WHERE {}
         ORDER BY t.exam_session_id, t.class_id, t.education_level",
        scope_sql("t")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(scope.bind_values()), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut keys = Vec::with_capacity(rows.len());
    let mut unreadable = Vec::new();
    for (exam_session_id, class_id, level) in rows {
        match EducationLevel::parse_required(&level) {
            Ok(education_level) => keys.push(ReportKey {
                exam_session_id,
                class_id,
                education_level,
            }),
            Err(e) => {
                let group = format!("{exam_session_id}/{class_id}/{level}");
                tracing::warn!(%group, error = %e, "skipping unreadable report group");
                unreadable.push(GroupFailure::new(group, &e));
            }
        }
    }
    Ok((keys, unreadable))
}

/// Ranks the eligible reports of one group on their stored metrics. Reads
/// whatever `calculate_metrics` last wrote.
pub fn recompute_positions(conn: &Connection, key: &ReportKey) -> EngineResult<usize> {
    let column = key.education_level.report_ranking_column();
    let tx = conn.unchecked_transaction()?;
    let entries = {
        let sql = format!(
            "SELECT t.id, t.{column}, s.last_name, s.first_name
             FROM term_reports t
             JOIN students s ON s.id = t.student_id
             WHERE t.exam_session_id = ? AND t.class_id = ? AND t.education_level = ?
               AND t.{ELIGIBLE_STATUS_SQL}"
        );
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map(
                (
                    &key.exam_session_id,
                    &key.class_id,
                    key.education_level.as_str(),
                ),
                |r| {
                    let last: String = r.get(2)?;
                    let first: String = r.get(3)?;
                    Ok(RankEntry {
                        id: r.get(0)?,
                        score: r.get(1)?,
                        display_name: display_name(&last, &first),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let total_students = entries.len() as i64;
    for (id, position) in assign_positions(&entries) {
        tx.execute(
            "UPDATE term_reports SET class_position = ?, total_students = ? WHERE id = ?",
            rusqlite::params![position, total_students, id],
        )?;
    }
    tx.commit()?;
    tracing::debug!(group = %key, members = entries.len(), "term report positions recomputed");
    Ok(entries.len())
}

pub fn transition(
    conn: &Connection,
    id: &str,
    action: Transition,
    actor: Option<&str>,
) -> EngineResult<TermReport> {
    let current = get(conn, id)?;
    let next = current.status.apply(action)?;
    match action {
        Transition::Approve => {
            conn.execute(
                "UPDATE term_reports SET status = ?, approved_by = ?, updated_at = ? WHERE id = ?",
                rusqlite::params![next.as_str(), actor, now_rfc3339(), id],
            )?;
        }
        Transition::Reject => {
            conn.execute(
                "UPDATE term_reports SET status = ?, approved_by = NULL,
                    class_position = NULL, total_students = NULL, updated_at = ?
                 WHERE id = ?",
                rusqlite::params![next.as_str(), now_rfc3339(), id],
            )?;
        }
        Transition::Submit | Transition::Publish => {
            conn.execute(
                "UPDATE term_reports SET status = ?, updated_at = ? WHERE id = ?",
                rusqlite::params![next.as_str(), now_rfc3339(), id],
            )?;
        }
    }
    tracing::debug!(report_id = %id, from = %current.status, to = %next, "term report transition");

    // Membership of the ranked set may have changed.
    if current.status.is_eligible() != next.is_eligible() {
        if let Err(e) = recompute_positions(conn, &current.key()) {
            tracing::warn!(group = %current.key(), error = %e, "term ranking refresh failed");
        }
    }
    get(conn, id)
}
