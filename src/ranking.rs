//! Class statistics and subject positions. Only APPROVED and PUBLISHED rows
//! of a group take part.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::directory::display_name;
use crate::error::{EngineError, EngineResult};
use crate::model::{round_off_2_decimals, scope_sql, EducationLevel, Scope, ELIGIBLE_STATUS_SQL};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    pub subject_id: String,
    pub exam_session_id: String,
    pub class_id: String,
    pub education_level: EducationLevel,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.subject_id, self.exam_session_id, self.class_id, self.education_level
        )
    }
}

#[derive(Debug, Clone)]
pub struct RankEntry {
    pub id: String,
    pub score: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
}

/// Sorts by score descending, then display name, then id, and numbers the
/// rows 1..N in that order. Equal scores get consecutive positions, never a
/// shared one.
pub fn assign_positions(entries: &[RankEntry]) -> Vec<(String, i64)> {
    let mut sorted: Vec<&RankEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.id.cmp(&b.id))
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, e)| (e.id.clone(), i as i64 + 1))
        .collect()
}

pub fn group_stats(scores: &[f64]) -> Option<GroupStats> {
    if scores.is_empty() {
        return None;
    }
    let sum: f64 = scores.iter().sum();
    let highest = scores.iter().copied().fold(f64::MIN, f64::max);
    let lowest = scores.iter().copied().fold(f64::MAX, f64::min);
    Some(GroupStats {
        average: round_off_2_decimals(sum / scores.len() as f64),
        highest,
        lowest,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOutcome {
    pub group: GroupKey,
    pub ranked: usize,
    pub stats: Option<GroupStats>,
}

pub fn recompute_group(conn: &Connection, key: &GroupKey) -> EngineResult<GroupOutcome> {
    let column = key.education_level.ranking_field().column();
    let tx = conn.unchecked_transaction()?;

    let entries = {
        let sql = format!(
            "SELECT r.id, r.{column}, s.last_name, s.first_name
             FROM results r
             JOIN students s ON s.id = r.student_id
             WHERE r.subject_id = ? AND r.exam_session_id = ? AND r.class_id = ?
               AND r.education_level = ? AND r.{ELIGIBLE_STATUS_SQL}"
        );
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map(
                (
                    &key.subject_id,
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

    let scores: Vec<f64> = entries.iter().map(|e| e.score).collect();
    let stats = group_stats(&scores);
    if let Some(stats) = stats {
        let mut update = tx.prepare(
            "UPDATE results SET
                class_average = ?, highest_in_class = ?, lowest_in_class = ?,
                subject_position = ?
             WHERE id = ?",
        )?;
        for (id, position) in assign_positions(&entries) {
            update.execute(rusqlite::params![
                stats.average,
                stats.highest,
                stats.lowest,
                position,
                id
            ])?;
        }
    }
    tx.commit()?;

    tracing::debug!(group = %key, members = entries.len(), "group recomputed");
    Ok(GroupOutcome {
        group: key.clone(),
        ranked: entries.len(),
        stats,
    })
}

/// Groups with at least one Result inside `scope`. A group whose stored
/// level no longer parses comes back as a failure, not an error.
pub fn distinct_groups(
    conn: &Connection,
    scope: &Scope,
) -> EngineResult<(Vec<GroupKey>, Vec<GroupFailure>)> {
    let sql = format!(
        "SELECT DISTINCT r.subject_id, r.exam_session_id, r.class_id, r.education_level
         FROM results r
         WHERE {}
         ORDER BY r.exam_session_id, r.class_id, r.education_level, r.subject_id",
        scope_sql("r")
    );
    let mut stmt = conn.prepare(&sql)?;
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

    let mut groups = Vec::with_capacity(rows.len());
    let mut unreadable = Vec::new();
    for (subject_id, exam_session_id, class_id, level) in rows {
        match EducationLevel::parse_required(&level) {
            Ok(education_level) => groups.push(GroupKey {
                subject_id,
                exam_session_id,
                class_id,
                education_level,
            }),
            Err(e) => {
                let group = format!("{subject_id}/{exam_session_id}/{class_id}/{level}");
                tracing::warn!(%group, error = %e, "skipping unreadable group");
                unreadable.push(GroupFailure::new(group, &e));
            }
        }
    }
    Ok((groups, unreadable))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFailure {
    pub group: String,
    pub code: String,
    pub message: String,
}

impl GroupFailure {
    pub fn new(group: impl Into<String>, e: &EngineError) -> Self {
        Self {
            group: group.into(),
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSummary {
    pub groups: usize,
    pub rows_ranked: usize,
    pub failures: Vec<GroupFailure>,
}

pub fn recompute_scope(conn: &Connection, scope: &Scope) -> EngineResult<ScopeSummary> {
    let (groups, mut failures) = distinct_groups(conn, scope)?;
    let mut summary = recompute_groups(conn, &groups);
    failures.append(&mut summary.failures);
    summary.failures = failures;
    Ok(summary)
}

pub fn recompute_groups(conn: &Connection, groups: &[GroupKey]) -> ScopeSummary {
    let mut summary = ScopeSummary::default();
    for key in groups {
        match recompute_group(conn, key) {
            Ok(outcome) => {
                summary.groups += 1;
                summary.rows_ranked += outcome.ranked;
            }
            Err(e) => {
                tracing::warn!(group = %key, error = %e, "group recompute failed");
                summary.failures.push(GroupFailure::new(key.to_string(), &e));
            }
        }
    }
    summary
}

/// Called after a single Result write has committed. The write itself stands
/// even if the refresh fails; the next recompute will catch up.
pub(crate) fn refresh_group_after_write(conn: &Connection, key: &GroupKey) {
    if let Err(e) = recompute_group(conn, key) {
        tracing::warn!(group = %key, error = %e, "group refresh after write failed");
    }
}

pub fn group_of(conn: &Connection, result_id: &str) -> EngineResult<GroupKey> {
    let record = crate::results::get(conn, result_id)?;
    Ok(record.group_key())
}

impl GroupKey {
    pub fn from_parts(
        subject_id: &str,
        exam_session_id: &str,
        class_id: &str,
        level: &str,
    ) -> EngineResult<Self> {
        if subject_id.is_empty() || exam_session_id.is_empty() || class_id.is_empty() {
            return Err(EngineError::bad_params(
                "subjectId, examSessionId and classId are required",
            ));
        }
        Ok(Self {
            subject_id: subject_id.to_string(),
            exam_session_id: exam_session_id.to_string(),
            class_id: class_id.to_string(),
            education_level: EducationLevel::parse_required(level)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Status, Transition};
    use crate::results::tests::{add_student, fixture, new_result, senior_scores};
    use crate::results::{self, RawScores};

    fn entry(id: &str, score: f64, name: &str) -> RankEntry {
        RankEntry {
            id: id.into(),
            score,
            display_name: name.into(),
        }
    }

    fn exam(v: f64) -> RawScores {
        [("exam".to_string(), v)].into_iter().collect()
    }

    #[test]
    fn ties_get_consecutive_positions() {
        let entries = vec![
            entry("r1", 88.0, "Adeyemi, Tolu"),
            entry("r2", 72.0, "Bello, Sade"),
            entry("r3", 72.0, "Chukwu, Ada"),
        ];
        let positions = assign_positions(&entries);
        assert_eq!(
            positions,
            vec![
                ("r1".to_string(), 1),
                ("r2".to_string(), 2),
                ("r3".to_string(), 3)
            ]
        );
    }

    #[test]
    fn equal_score_and_name_falls_back_to_id() {
        let entries = vec![entry("b", 50.0, "Same, Name"), entry("a", 50.0, "Same, Name")];
        let positions = assign_positions(&entries);
        assert_eq!(positions[0].0, "a");
        assert_eq!(positions[1].0, "b");
    }

    #[test]
    fn stats_round_average_only() {
        let s = group_stats(&[88.0, 72.0, 72.0]).expect("stats");
        assert_eq!(s.average, 77.33);
        assert_eq!(s.highest, 88.0);
        assert_eq!(s.lowest, 72.0);
        assert!(group_stats(&[]).is_none());
    }

    fn approve(conn: &Connection, id: &str) {
        results::transition(conn, id, Transition::Submit, None).expect("submit");
        results::transition(conn, id, Transition::Approve, Some("hod")).expect("approve");
    }

    #[test]
    fn senior_scenario_ranks_88_72_72_as_1_2_3() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let mut ids = Vec::new();
        for (name, score) in [("Adeyemi", 88.0), ("Bello", 72.0), ("Chukwu", 72.0)] {
            let s = add_student(&f, name, EducationLevel::SeniorSecondary);
            let r = results::create(&f.conn, &new_result(&f, &s, senior_scores(score)))
                .expect("create");
            approve(&f.conn, &r.id);
            ids.push(r.id);
        }
        let positions: Vec<Option<i64>> = ids
            .iter()
            .map(|id| results::get(&f.conn, id).expect("get").subject_position)
            .collect();
        assert_eq!(positions, vec![Some(1), Some(2), Some(3)]);

        let r = results::get(&f.conn, &ids[0]).expect("get");
        assert_eq!(r.class_average, Some(77.33));
        assert_eq!(r.highest_in_class, Some(88.0));
        assert_eq!(r.lowest_in_class, Some(72.0));
    }

    #[test]
    fn recompute_is_idempotent_and_positions_are_contiguous() {
        let f = fixture(EducationLevel::Primary);
        for (i, score) in [55.0, 40.0, 60.0, 40.0, 12.0].into_iter().enumerate() {
            let s = add_student(&f, &format!("Student{i}"), EducationLevel::Primary);
            let r = results::create(&f.conn, &new_result(&f, &s, exam(score))).expect("create");
            approve(&f.conn, &r.id);
        }
        let key = results::list(&f.conn, &Default::default()).expect("list")[0].group_key();

        let snapshot = |conn: &Connection| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, class_average, highest_in_class, lowest_in_class,
                            subject_position, updated_at
                     FROM results ORDER BY id",
                )
                .expect("prepare");
            stmt.query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, Option<f64>>(1)?,
                    r.get::<_, Option<f64>>(2)?,
                    r.get::<_, Option<f64>>(3)?,
                    r.get::<_, Option<i64>>(4)?,
                    r.get::<_, String>(5)?,
                ))
            })
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows")
        };

        recompute_group(&f.conn, &key).expect("first");
        let first = snapshot(&f.conn);
        let outcome = recompute_group(&f.conn, &key).expect("second");
        assert_eq!(snapshot(&f.conn), first);
        assert_eq!(outcome.ranked, 5);

        let mut positions: Vec<i64> = first.iter().filter_map(|row| row.4).collect();
        positions.sort();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn approving_a_draft_shifts_only_lower_peers() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let mut ids = Vec::new();
        for (name, score) in [("Ade", 90.0), ("Bayo", 60.0), ("Chidi", 40.0)] {
            let s = add_student(&f, name, EducationLevel::SeniorSecondary);
            let r = results::create(&f.conn, &new_result(&f, &s, senior_scores(score)))
                .expect("create");
            approve(&f.conn, &r.id);
            ids.push(r.id);
        }
        let late = add_student(&f, "Dayo", EducationLevel::SeniorSecondary);
        let draft = results::create(&f.conn, &new_result(&f, &late, exam(65.0))).expect("draft");
        assert_eq!(draft.subject_position, None);

        let position = |id: &str| results::get(&f.conn, id).expect("get").subject_position;
        assert_eq!(
            ids.iter().map(|id| position(id)).collect::<Vec<_>>(),
            vec![Some(1), Some(2), Some(3)]
        );

        approve(&f.conn, &draft.id);
        assert_eq!(position(&draft.id), Some(2));
        assert_eq!(
            ids.iter().map(|id| position(id)).collect::<Vec<_>>(),
            vec![Some(1), Some(3), Some(4)]
        );
    }

    #[test]
    fn deleting_an_excluded_row_leaves_peers_alone() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let a = add_student(&f, "Ade", EducationLevel::SeniorSecondary);
        let b = add_student(&f, "Bayo", EducationLevel::SeniorSecondary);
        let ra = results::create(&f.conn, &new_result(&f, &a, exam(50.0))).expect("a");
        approve(&f.conn, &ra.id);
        let rb = results::create(&f.conn, &new_result(&f, &b, exam(70.0))).expect("b");
        assert_eq!(rb.status, Status::Draft);

        f.conn
            .execute("DELETE FROM results WHERE id = ?", [&rb.id])
            .expect("delete");
        let key = ra.group_key();
        recompute_group(&f.conn, &key).expect("recompute");
        assert_eq!(results::get(&f.conn, &ra.id).expect("get").subject_position, Some(1));
    }

    #[test]
    fn scope_recompute_visits_each_group_once() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let math = crate::directory::create_subject(&f.conn, "Maths", None).expect("subject");
        let s = add_student(&f, "Ade", EducationLevel::SeniorSecondary);
        results::create(&f.conn, &new_result(&f, &s, exam(50.0))).expect("english");
        let mut m = new_result(&f, &s, exam(30.0));
        m.subject_id = math;
        results::create(&f.conn, &m).expect("maths");

        let summary = recompute_scope(
            &f.conn,
            &Scope {
                exam_session_id: Some(f.session_id.clone()),
                ..Default::default()
            },
        )
        .expect("scope");
        assert_eq!(summary.groups, 2);
        assert_eq!(summary.rows_ranked, 0);
        assert!(summary.failures.is_empty());

        let other = recompute_scope(
            &f.conn,
            &Scope {
                class_id: Some("no-such-class".into()),
                ..Default::default()
            },
        )
        .expect("empty scope");
        assert_eq!(other.groups, 0);
    }

    #[test]
    fn scope_recompute_skips_group_with_unreadable_level() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let a = add_student(&f, "Ade", EducationLevel::SeniorSecondary);
        let b = add_student(&f, "Bayo", EducationLevel::SeniorSecondary);
        let ra = results::create(&f.conn, &new_result(&f, &a, exam(50.0))).expect("a");
        approve(&f.conn, &ra.id);
        let rb = results::create(&f.conn, &new_result(&f, &b, exam(60.0))).expect("b");
        f.conn
            .execute(
                "UPDATE results SET education_level = 'KINDERGARTEN' WHERE id = ?",
                [&rb.id],
            )
            .expect("corrupt level");

        let summary = recompute_scope(&f.conn, &Scope::default()).expect("scope");
        assert_eq!(summary.groups, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].code, "bad_params");
        assert_eq!(results::get(&f.conn, &ra.id).expect("a").subject_position, Some(1));
    }
}
