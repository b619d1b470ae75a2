//! Grading systems: ordered percentage bands mapped to letter grades.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::model::now_rfc3339;

pub const UNRESOLVED_LETTER: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub min_score: f64,
    pub max_score: f64,
    pub letter: String,
    #[serde(default)]
    pub grade_point: Option<f64>,
    pub is_passing: bool,
}

impl GradeBand {
    pub fn contains(&self, percentage: f64) -> bool {
        percentage >= self.min_score && percentage <= self.max_score
    }

    /// A whole-number upper bound also covers the fractions below the next
    /// whole mark, so `[0, 39]` catches 39.99 when no band holds it.
    fn covers_fraction_above(&self, percentage: f64) -> bool {
        self.max_score.fract() == 0.0
            && percentage > self.max_score
            && percentage < self.max_score + 1.0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingSystem {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub is_active: bool,
    pub bands: Vec<GradeBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGrade {
    pub letter: String,
    pub grade_point: Option<f64>,
    pub is_passing: bool,
}

impl ResolvedGrade {
    pub fn unresolved() -> Self {
        Self {
            letter: UNRESOLVED_LETTER.to_string(),
            grade_point: None,
            is_passing: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.letter != UNRESOLVED_LETTER
    }
}

/// First band, in declared order, whose inclusive range contains
/// `percentage`. Falls back to `("N/A", None, false)` instead of failing.
pub fn resolve_grade(percentage: f64, bands: &[GradeBand]) -> ResolvedGrade {
    let band = bands
        .iter()
        .find(|b| b.contains(percentage))
        .or_else(|| bands.iter().find(|b| b.covers_fraction_above(percentage)));
    match band {
        Some(b) => ResolvedGrade {
            letter: b.letter.clone(),
            grade_point: b.grade_point,
            is_passing: b.is_passing,
        },
        None => {
            tracing::debug!(percentage, "no grade band matched; using N/A");
            ResolvedGrade::unresolved()
        }
    }
}

fn validate_bands(bands: &[GradeBand]) -> EngineResult<()> {
    if bands.is_empty() {
        return Err(EngineError::bad_params("at least one grade band is required"));
    }
    for (i, b) in bands.iter().enumerate() {
        if b.letter.trim().is_empty() {
            return Err(EngineError::bad_params(format!("band {} has an empty letter", i)));
        }
        if !(b.min_score.is_finite() && b.max_score.is_finite()) || b.min_score > b.max_score {
            return Err(EngineError::bad_params(format!(
                "band {} has an invalid range [{}, {}]",
                i, b.min_score, b.max_score
            )));
        }
    }
    Ok(())
}

pub fn create(
    conn: &Connection,
    name: &str,
    bands: &[GradeBand],
    make_default: bool,
) -> EngineResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::bad_params("name must not be empty"));
    }
    validate_bands(bands)?;

    let id = Uuid::new_v4().to_string();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO grading_systems(id, name, is_default, is_active, created_at)
         VALUES(?, ?, 0, 1, ?)",
        (&id, name, now_rfc3339()),
    )?;
    for (i, b) in bands.iter().enumerate() {
        tx.execute(
            "INSERT INTO grade_bands(
                id, grading_system_id, sort_order, min_score, max_score, letter, grade_point, is_passing)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                id,
                i as i64,
                b.min_score,
                b.max_score,
                b.letter.trim(),
                b.grade_point,
                b.is_passing as i64
            ],
        )?;
    }
    if make_default {
        flip_default(&tx, &id)?;
    }
    tx.commit()?;
    Ok(id)
}

pub fn set_default(conn: &Connection, id: &str) -> EngineResult<()> {
    let tx = conn.unchecked_transaction()?;
    let exists = tx
        .query_row("SELECT 1 FROM grading_systems WHERE id = ?", [id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !exists {
        return Err(EngineError::not_found("grading system", id));
    }
    flip_default(&tx, id)?;
    tx.commit()?;
    Ok(())
}

fn flip_default(conn: &Connection, id: &str) -> EngineResult<()> {
    conn.execute("UPDATE grading_systems SET is_default = 0 WHERE is_default = 1", [])?;
    conn.execute("UPDATE grading_systems SET is_default = 1 WHERE id = ?", [id])?;
    Ok(())
}

pub fn load_bands(conn: &Connection, grading_system_id: &str) -> EngineResult<Vec<GradeBand>> {
    let mut stmt = conn.prepare(
        "SELECT min_score, max_score, letter, grade_point, is_passing
         FROM grade_bands
         WHERE grading_system_id = ?
         ORDER BY sort_order",
    )?;
    let bands = stmt
        .query_map([grading_system_id], |r| {
            Ok(GradeBand {
                min_score: r.get(0)?,
                max_score: r.get(1)?,
                letter: r.get(2)?,
                grade_point: r.get(3)?,
                is_passing: r.get::<_, i64>(4)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bands)
}

pub fn get(conn: &Connection, id: &str) -> EngineResult<GradingSystem> {
    let row: Option<(String, String, bool, bool)> = conn
        .query_row(
            "SELECT id, name, is_default, is_active FROM grading_systems WHERE id = ?",
            [id],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get::<_, i64>(2)? != 0,
                    r.get::<_, i64>(3)? != 0,
                ))
            },
        )
        .optional()?;
    let Some((id, name, is_default, is_active)) = row else {
        return Err(EngineError::not_found("grading system", id));
    };
    let bands = load_bands(conn, &id)?;
    Ok(GradingSystem {
        id,
        name,
        is_default,
        is_active,
        bands,
    })
}

pub fn list(conn: &Connection) -> EngineResult<Vec<GradingSystem>> {
    let mut stmt = conn.prepare("SELECT id FROM grading_systems ORDER BY rowid")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter().map(|id| get(conn, id)).collect()
}

pub fn default_id(conn: &Connection) -> EngineResult<String> {
    conn.query_row(
        "SELECT id FROM grading_systems WHERE is_default = 1 AND is_active = 1 LIMIT 1",
        [],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| EngineError::bad_params("no gradingSystemId given and no default grading system"))
}
