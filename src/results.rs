//! Result records: raw component scores in, totals, percentages and grade out.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::directory;
use crate::error::{is_unique_violation, EngineError, EngineResult};
use crate::grading::{self, resolve_grade, GradeBand, ResolvedGrade};
use crate::model::{
    now_rfc3339, percent_of, scope_sql, ComponentKind, EducationLevel, Scope, Status, Transition,
};
use crate::ranking::{self, GroupKey};
use crate::scoring::{self, ScoringConfiguration};

pub type RawScores = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedScores {
    pub ca_total: f64,
    pub exam_score: f64,
    pub total_score: f64,
    pub ca_percentage: f64,
    pub exam_percentage: f64,
    pub total_percentage: f64,
    pub grade: ResolvedGrade,
}

/// CA components are summed as entered; the only bound is each component's
/// own maximum.
pub fn compute(
    config: &ScoringConfiguration,
    raw: &RawScores,
    bands: &[GradeBand],
) -> EngineResult<DerivedScores> {
    let level = config.education_level;
    let mut ca_total = 0.0_f64;
    let mut exam_score = 0.0_f64;

    for (key, &value) in raw {
        let Some(kind) = level.component_kind(key) else {
            return Err(EngineError::InvalidScoringSchema(format!(
                "component '{}' is not part of {}",
                key, level
            )));
        };
        let Some(max) = config.component_max(key) else {
            return Err(EngineError::InvalidScoringSchema(format!(
                "component '{}' is not configured in '{}'",
                key, config.name
            )));
        };
        if !value.is_finite() || value < 0.0 || value > max {
            return Err(EngineError::ScoreOutOfRange {
                component: key.clone(),
                value,
                max,
            });
        }
        match kind {
            ComponentKind::Ca => ca_total += value,
            ComponentKind::Exam => exam_score += value,
        }
    }

    let total_score = ca_total + exam_score;
    let ca_percentage = percent_of(ca_total, config.kind_max(ComponentKind::Ca));
    let exam_percentage = percent_of(exam_score, config.kind_max(ComponentKind::Exam));
    let total_percentage = percent_of(total_score, config.total_max_score);
    let grade = resolve_grade(total_percentage, bands);

    Ok(DerivedScores {
        ca_total,
        exam_score,
        total_score,
        ca_percentage,
        exam_percentage,
        total_percentage,
        grade,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub exam_session_id: String,
    pub class_id: String,
    pub education_level: EducationLevel,
    pub grading_system_id: String,
    pub scoring_configuration_id: String,
    pub raw_scores: RawScores,
    pub ca_total: f64,
    pub exam_score: f64,
    pub total_score: f64,
    pub ca_percentage: f64,
    pub exam_percentage: f64,
    pub total_percentage: f64,
    pub grade: String,
    pub grade_point: Option<f64>,
    pub is_passed: bool,
    pub class_average: Option<f64>,
    pub highest_in_class: Option<f64>,
    pub lowest_in_class: Option<f64>,
    pub subject_position: Option<i64>,
    pub status: Status,
    pub entered_by: Option<String>,
    pub approved_by: Option<String>,
    pub remarks: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ResultRecord {
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            subject_id: self.subject_id.clone(),
            exam_session_id: self.exam_session_id.clone(),
            class_id: self.class_id.clone(),
            education_level: self.education_level,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewResult {
    pub student_id: String,
    pub subject_id: String,
    pub exam_session_id: String,
    pub grading_system_id: Option<String>,
    pub scores: RawScores,
    pub entered_by: Option<String>,
    pub remarks: Option<String>,
}

const SELECT_COLUMNS: &str = "id, student_id, subject_id, exam_session_id, class_id, education_level,
     grading_system_id, scoring_configuration_id, raw_scores, ca_total, exam_score, total_score,
     ca_percentage, exam_percentage, total_percentage, grade, grade_point, is_passed,
     class_average, highest_in_class, lowest_in_class, subject_position, status,
     entered_by, approved_by, remarks, created_at, updated_at";

fn map_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ResultRecord> {
    let level: String = r.get(5)?;
    let raw: String = r.get(8)?;
    let status: String = r.get(22)?;
    Ok(ResultRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        exam_session_id: r.get(3)?,
        class_id: r.get(4)?,
        education_level: EducationLevel::parse(&level).ok_or_else(|| bad_column(5, &level))?,
        grading_system_id: r.get(6)?,
        scoring_configuration_id: r.get(7)?,
        raw_scores: serde_json::from_str(&raw).map_err(|_| bad_column(8, &raw))?,
        ca_total: r.get(9)?,
        exam_score: r.get(10)?,
        total_score: r.get(11)?,
        ca_percentage: r.get(12)?,
        exam_percentage: r.get(13)?,
        total_percentage: r.get(14)?,
        grade: r.get(15)?,
        grade_point: r.get(16)?,
        is_passed: r.get::<_, i64>(17)? != 0,
        class_average: r.get(18)?,
        highest_in_class: r.get(19)?,
        lowest_in_class: r.get(20)?,
        subject_position: r.get(21)?,
        status: Status::parse(&status).ok_or_else(|| bad_column(22, &status))?,
        entered_by: r.get(23)?,
        approved_by: r.get(24)?,
        remarks: r.get(25)?,
        created_at: r.get(26)?,
        updated_at: r.get(27)?,
    })
}

pub(crate) fn bad_column(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unexpected stored value '{value}'").into(),
    )
}

pub fn get(conn: &Connection, id: &str) -> EngineResult<ResultRecord> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM results WHERE id = ?");
    conn.query_row(&sql, [id], map_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("result", id))
}

#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub scope: Scope,
    pub subject_id: Option<String>,
    pub student_id: Option<String>,
    pub status: Option<Status>,
}

pub fn list(conn: &Connection, filter: &ResultFilter) -> EngineResult<Vec<ResultRecord>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM results r
         WHERE {}
           AND (?4 IS NULL OR r.subject_id = ?4)
           AND (?5 IS NULL OR r.student_id = ?5)
           AND (?6 IS NULL OR r.status = ?6)
         ORDER BY r.exam_session_id, r.subject_id, r.class_id, r.subject_position IS NULL,
                  r.subject_position, r.rowid",
        scope_sql("r")
    );
    let [level, session, class] = filter.scope.bind_values();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![
                level,
                session,
                class,
                filter.subject_id,
                filter.student_id,
                filter.status.map(|s| s.as_str())
            ],
            map_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create(conn: &Connection, input: &NewResult) -> EngineResult<ResultRecord> {
    let student = directory::get_student(conn, &input.student_id)?;
    if !directory::subject_exists(conn, &input.subject_id)? {
        return Err(EngineError::not_found("subject", &input.subject_id));
    }
    let session = directory::get_session(conn, &input.exam_session_id)?;
    let config = scoring::resolve(conn, student.education_level, &session.result_type)?;
    let grading_system_id = match &input.grading_system_id {
        Some(id) => grading::get(conn, id)?.id,
        None => grading::default_id(conn)?,
    };
    let bands = grading::load_bands(conn, &grading_system_id)?;
    let derived = compute(&config, &input.scores, &bands)?;

    let duplicate = conn
        .query_row(
            "SELECT 1 FROM results WHERE student_id = ? AND subject_id = ? AND exam_session_id = ?",
            (&input.student_id, &input.subject_id, &input.exam_session_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    if duplicate {
        return Err(duplicate_error(input));
    }

    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    let raw_json = serde_json::to_string(&input.scores)
        .map_err(|e| EngineError::bad_params(format!("scores: {e}")))?;
    conn.execute(
        "INSERT INTO results(
            id, student_id, subject_id, exam_session_id, class_id, education_level,
            grading_system_id, scoring_configuration_id, raw_scores,
            ca_total, exam_score, total_score, ca_percentage, exam_percentage, total_percentage,
            grade, grade_point, is_passed, status, entered_by, remarks, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'DRAFT', ?, ?, ?, ?)",
        rusqlite::params![
            id,
            input.student_id,
            input.subject_id,
            input.exam_session_id,
            student.class_id,
            student.education_level.as_str(),
            grading_system_id,
            config.id,
            raw_json,
            derived.ca_total,
            derived.exam_score,
            derived.total_score,
            derived.ca_percentage,
            derived.exam_percentage,
            derived.total_percentage,
            derived.grade.letter,
            derived.grade.grade_point,
            derived.grade.is_passing as i64,
            input.entered_by,
            input.remarks,
            now,
            now
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            duplicate_error(input)
        } else {
            EngineError::Db(e)
        }
    })?;
    tracing::debug!(result_id = %id, student_id = %input.student_id, "result created");

    let record = get(conn, &id)?;
    ranking::refresh_group_after_write(conn, &record.group_key());
    get(conn, &id)
}

fn duplicate_error(input: &NewResult) -> EngineError {
    EngineError::DuplicateResult {
        student_id: input.student_id.clone(),
        subject_id: input.subject_id.clone(),
        exam_session_id: input.exam_session_id.clone(),
    }
}

pub fn update_scores(
    conn: &Connection,
    id: &str,
    scores: &RawScores,
    grading_system_id: Option<&str>,
    entered_by: Option<&str>,
) -> EngineResult<ResultRecord> {
    let current = get(conn, id)?;
    let mut raw = current.raw_scores.clone();
    for (k, v) in scores {
        raw.insert(k.clone(), *v);
    }
    let grading_system_id = match grading_system_id {
        Some(g) => grading::get(conn, g)?.id,
        None => current.grading_system_id.clone(),
    };
    let config = scoring::get(conn, &current.scoring_configuration_id)?;
    let bands = grading::load_bands(conn, &grading_system_id)?;
    let derived = compute(&config, &raw, &bands)?;
    let raw_json =
        serde_json::to_string(&raw).map_err(|e| EngineError::bad_params(format!("scores: {e}")))?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE results SET
            raw_scores = ?, grading_system_id = ?,
            entered_by = COALESCE(?, entered_by), updated_at = ?
         WHERE id = ?",
        rusqlite::params![raw_json, grading_system_id, entered_by, now_rfc3339(), id],
    )?;
    write_derived(&tx, id, &derived)?;
    tx.commit()?;
    tracing::debug!(result_id = %id, total = derived.total_score, "result scores updated");

    ranking::refresh_group_after_write(conn, &current.group_key());
    get(conn, id)
}

fn write_derived(conn: &Connection, id: &str, d: &DerivedScores) -> EngineResult<()> {
    conn.execute(
        "UPDATE results SET
            ca_total = ?, exam_score = ?, total_score = ?,
            ca_percentage = ?, exam_percentage = ?, total_percentage = ?,
            grade = ?, grade_point = ?, is_passed = ?
         WHERE id = ?",
        rusqlite::params![
            d.ca_total,
            d.exam_score,
            d.total_score,
            d.ca_percentage,
            d.exam_percentage,
            d.total_percentage,
            d.grade.letter,
            d.grade.grade_point,
            d.grade.is_passing as i64,
            id
        ],
    )?;
    Ok(())
}

/// Re-derives the stored row from its raw scores, pinned configuration and
/// grading system. Used by the batch job after bulk corrections.
pub fn recompute_derived(conn: &Connection, id: &str) -> EngineResult<DerivedScores> {
    let current = get(conn, id)?;
    let config = scoring::get(conn, &current.scoring_configuration_id)?;
    let bands = grading::load_bands(conn, &current.grading_system_id)?;
    let derived = compute(&config, &current.raw_scores, &bands)?;
    write_derived(conn, id, &derived)?;
    Ok(derived)
}

pub fn ids_in_scope(conn: &Connection, scope: &Scope) -> EngineResult<Vec<String>> {
    let sql = format!(
        "SELECT r.id FROM results r WHERE {} ORDER BY r.rowid",
        scope_sql("r")
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(rusqlite::params_from_iter(scope.bind_values()), |r| {
            r.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn transition(
    conn: &Connection,
    id: &str,
    action: Transition,
    actor: Option<&str>,
) -> EngineResult<ResultRecord> {
    let current = get(conn, id)?;
    let next = current.status.apply(action)?;

    let tx = conn.unchecked_transaction()?;
    match action {
        Transition::Approve => {
            tx.execute(
                "UPDATE results SET status = ?, approved_by = ?, updated_at = ? WHERE id = ?",
                rusqlite::params![next.as_str(), actor, now_rfc3339(), id],
            )?;
        }
        Transition::Reject => {
            tx.execute(
                "UPDATE results SET status = ?, approved_by = NULL,
                    class_average = NULL, highest_in_class = NULL,
                    lowest_in_class = NULL, subject_position = NULL,
                    updated_at = ?
                 WHERE id = ?",
                rusqlite::params![next.as_str(), now_rfc3339(), id],
            )?;
        }
        Transition::Submit | Transition::Publish => {
            tx.execute(
                "UPDATE results SET status = ?, updated_at = ? WHERE id = ?",
                rusqlite::params![next.as_str(), now_rfc3339(), id],
            )?;
        }
    }
    recompute_derived(&tx, id)?;
    tx.commit()?;
    tracing::debug!(result_id = %id, from = %current.status, to = %next, "result transition");

    ranking::refresh_group_after_write(conn, &current.group_key());
    get(conn, id)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::grading::GradeBand;
    use crate::scoring::{ComponentMax, ScoringDraft};

    pub(crate) fn bands() -> Vec<GradeBand> {
        let b = |min: f64, max: f64, letter: &str, point: f64, passing: bool| GradeBand {
            min_score: min,
            max_score: max,
            letter: letter.into(),
            grade_point: Some(point),
            is_passing: passing,
        };
        vec![
            b(0.0, 39.0, "F", 0.0, false),
            b(40.0, 54.0, "C", 2.0, true),
            b(55.0, 69.0, "B", 3.0, true),
            b(70.0, 100.0, "A", 4.0, true),
        ]
    }

    pub(crate) fn primary_config() -> ScoringConfiguration {
        ScoringConfiguration {
            id: "cfg".into(),
            name: "Primary termly".into(),
            education_level: EducationLevel::Primary,
            result_type: "TERMLY".into(),
            components: vec![
                ComponentMax { key: "continuous_assessment".into(), max: 10.0 },
                ComponentMax { key: "take_home_test".into(), max: 10.0 },
                ComponentMax { key: "project".into(), max: 10.0 },
                ComponentMax { key: "note_copying".into(), max: 10.0 },
                ComponentMax { key: "exam".into(), max: 60.0 },
            ],
            total_max_score: 100.0,
            ca_weight: Some(40.0),
            exam_weight: Some(60.0),
            is_default: true,
            is_active: true,
        }
    }

    fn scores(pairs: &[(&str, f64)]) -> RawScores {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn totals_and_percentages_follow_components() {
        let cfg = primary_config();
        let raw = scores(&[
            ("continuous_assessment", 8.0),
            ("take_home_test", 7.0),
            ("project", 9.0),
            ("exam", 45.0),
        ]);
        let d = compute(&cfg, &raw, &bands()).expect("compute");
        assert_eq!(d.ca_total, 24.0);
        assert_eq!(d.exam_score, 45.0);
        assert_eq!(d.total_score, d.ca_total + d.exam_score);
        assert_eq!(d.ca_percentage, 60.0);
        assert_eq!(d.exam_percentage, 75.0);
        assert_eq!(d.total_percentage, 69.0);
        assert_eq!(d.grade.letter, "B");
        assert!(d.grade.is_passing);
    }

    #[test]
    fn component_above_max_is_out_of_range() {
        let raw = scores(&[("exam", 61.0)]);
        let err = compute(&primary_config(), &raw, &bands()).expect_err("too high");
        assert_eq!(err.code(), "score_out_of_range");
        assert_eq!(err.details().expect("details")["field"], "exam");

        let raw = scores(&[("project", -1.0)]);
        assert!(matches!(
            compute(&primary_config(), &raw, &bands()),
            Err(EngineError::ScoreOutOfRange { .. })
        ));
    }

    #[test]
    fn unconfigured_or_foreign_component_is_rejected() {
        // `practical` belongs to PRIMARY but this configuration leaves it out.
        let raw = scores(&[("practical", 5.0)]);
        let err = compute(&primary_config(), &raw, &bands()).expect_err("unconfigured");
        assert_eq!(err.code(), "invalid_scoring_schema");

        let raw = scores(&[("test1", 5.0)]);
        let err = compute(&primary_config(), &raw, &bands()).expect_err("senior key");
        assert_eq!(err.code(), "invalid_scoring_schema");
    }

    #[test]
    fn zero_maximum_yields_zero_percentage() {
        let mut cfg = primary_config();
        cfg.components = vec![ComponentMax { key: "exam".into(), max: 0.0 }];
        cfg.total_max_score = 0.0;
        let d = compute(&cfg, &scores(&[("exam", 0.0)]), &bands()).expect("compute");
        assert_eq!(d.ca_percentage, 0.0);
        assert_eq!(d.exam_percentage, 0.0);
        assert_eq!(d.total_percentage, 0.0);
        assert_eq!(d.grade.letter, "F");
    }

    #[test]
    fn ungraded_percentage_keeps_na_sentinel() {
        let d = compute(&primary_config(), &scores(&[("exam", 0.0)]), &[]).expect("compute");
        assert_eq!(d.grade, ResolvedGrade::unresolved());
    }

    pub(crate) struct Fixture {
        pub conn: Connection,
        pub class_id: String,
        pub subject_id: String,
        pub session_id: String,
        pub grading_id: String,
    }

    pub(crate) fn fixture(level: EducationLevel) -> Fixture {
        let conn = open_in_memory();
        let class_id = directory::create_class(&conn, "Class A").expect("class");
        let subject_id = directory::create_subject(&conn, "English", Some("ENG")).expect("subject");
        let session_id = directory::create_session(&conn, "First Term", "TERMLY").expect("session");
        let grading_id = grading::create(&conn, "Standard", &bands(), true).expect("grading");
        let components = match level {
            EducationLevel::Nursery => vec![ComponentMax { key: "mark_obtained".into(), max: 100.0 }],
            EducationLevel::SeniorSecondary => vec![
                ComponentMax { key: "test1".into(), max: 15.0 },
                ComponentMax { key: "test2".into(), max: 15.0 },
                ComponentMax { key: "exam".into(), max: 70.0 },
            ],
            EducationLevel::Primary | EducationLevel::JuniorSecondary => vec![
                ComponentMax { key: "continuous_assessment".into(), max: 40.0 },
                ComponentMax { key: "exam".into(), max: 60.0 },
            ],
        };
        scoring::create(
            &conn,
            &ScoringDraft {
                name: "default".into(),
                education_level: level,
                result_type: "TERMLY".into(),
                components,
                total_max_score: 100.0,
                ca_weight: None,
                exam_weight: None,
                is_active: true,
                is_default: true,
            },
        )
        .expect("config");
        Fixture {
            conn,
            class_id,
            subject_id,
            session_id,
            grading_id,
        }
    }

    /// Spreads `total` over the senior fixture's exam (70), test1 and test2
    /// (15 each).
    pub(crate) fn senior_scores(total: f64) -> RawScores {
        let exam = total.min(70.0);
        let test1 = (total - exam).min(15.0);
        let test2 = total - exam - test1;
        scores(&[("exam", exam), ("test1", test1), ("test2", test2)])
    }

    pub(crate) fn add_student(f: &Fixture, last: &str, level: EducationLevel) -> String {
        directory::create_student(&f.conn, &f.class_id, last, "Test", level).expect("student")
    }

    pub(crate) fn new_result(f: &Fixture, student_id: &str, scores: RawScores) -> NewResult {
        NewResult {
            student_id: student_id.to_string(),
            subject_id: f.subject_id.clone(),
            exam_session_id: f.session_id.clone(),
            grading_system_id: None,
            scores,
            entered_by: Some("teacher-1".into()),
            remarks: None,
        }
    }

    #[test]
    fn second_result_for_same_triple_is_duplicate() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let s = add_student(&f, "Okafor", EducationLevel::SeniorSecondary);
        let first = create(&f.conn, &new_result(&f, &s, scores(&[("exam", 50.0)]))).expect("first");
        assert_eq!(first.status, Status::Draft);
        assert_eq!(first.grading_system_id, f.grading_id);

        let err = create(&f.conn, &new_result(&f, &s, scores(&[("exam", 10.0)])))
            .expect_err("duplicate");
        assert_eq!(err.code(), "duplicate_result");
    }

    #[test]
    fn update_merges_scores_and_rederives() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let s = add_student(&f, "Okafor", EducationLevel::SeniorSecondary);
        let r = create(
            &f.conn,
            &new_result(&f, &s, scores(&[("test1", 10.0), ("exam", 50.0)])),
        )
        .expect("create");
        assert_eq!(r.total_score, 60.0);

        let r = update_scores(&f.conn, &r.id, &scores(&[("test2", 12.0)]), None, None)
            .expect("update");
        assert_eq!(r.raw_scores.len(), 3);
        assert_eq!(r.ca_total, 22.0);
        assert_eq!(r.total_score, 72.0);
        assert_eq!(r.grade, "A");

        let err = update_scores(&f.conn, &r.id, &scores(&[("exam", 71.0)]), None, None)
            .expect_err("out of range");
        assert_eq!(err.code(), "score_out_of_range");
        assert_eq!(get(&f.conn, &r.id).expect("get").total_score, 72.0);
    }

    #[test]
    fn failed_derived_write_rolls_back_raw_scores() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let s = add_student(&f, "Okafor", EducationLevel::SeniorSecondary);
        let r = create(
            &f.conn,
            &new_result(&f, &s, scores(&[("test1", 10.0), ("exam", 50.0)])),
        )
        .expect("create");
        f.conn
            .execute_batch(
                "CREATE TEMP TRIGGER block_totals BEFORE UPDATE OF total_score ON results
                 BEGIN SELECT RAISE(ABORT, 'totals locked'); END;",
            )
            .expect("trigger");

        let err = update_scores(&f.conn, &r.id, &scores(&[("test2", 12.0)]), None, None)
            .expect_err("derived write blocked");
        assert_eq!(err.code(), "db_error");

        let stored = get(&f.conn, &r.id).expect("get");
        assert_eq!(stored.raw_scores, r.raw_scores);
        assert_eq!(stored.total_score, 60.0);
    }

    #[test]
    fn missing_configuration_blocks_entry() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let s = add_student(&f, "Ade", EducationLevel::Primary);
        let err = create(&f.conn, &new_result(&f, &s, scores(&[("exam", 10.0)])))
            .expect_err("no primary config");
        assert_eq!(err.code(), "configuration_not_found");
    }

    #[test]
    fn reject_clears_own_ranking_cache() {
        let f = fixture(EducationLevel::SeniorSecondary);
        let s = add_student(&f, "Okafor", EducationLevel::SeniorSecondary);
        let r = create(&f.conn, &new_result(&f, &s, scores(&[("exam", 50.0)]))).expect("create");
        transition(&f.conn, &r.id, Transition::Submit, None).expect("submit");
        let r = transition(&f.conn, &r.id, Transition::Approve, Some("hod")).expect("approve");
        assert_eq!(r.subject_position, Some(1));
        assert_eq!(r.approved_by.as_deref(), Some("hod"));

        let r = transition(&f.conn, &r.id, Transition::Reject, None).expect("reject");
        assert_eq!(r.status, Status::Draft);
        assert_eq!(r.subject_position, None);
        assert_eq!(r.class_average, None);
        assert_eq!(r.approved_by, None);

        let err = transition(&f.conn, &r.id, Transition::Publish, None).expect_err("draft");
        assert_eq!(err.code(), "invalid_transition");
    }
}
