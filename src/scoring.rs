//! Scoring configurations: which components a level's results carry and how
//! many marks each is out of.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::normalize_result_type;
use crate::error::{EngineError, EngineResult};
use crate::model::{now_rfc3339, ComponentKind, EducationLevel};

const SUM_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMax {
    pub key: String,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfiguration {
    pub id: String,
    pub name: String,
    pub education_level: EducationLevel,
    pub result_type: String,
    pub components: Vec<ComponentMax>,
    pub total_max_score: f64,
    pub ca_weight: Option<f64>,
    pub exam_weight: Option<f64>,
    pub is_default: bool,
    pub is_active: bool,
}

impl ScoringConfiguration {
    pub fn component_max(&self, key: &str) -> Option<f64> {
        self.components.iter().find(|c| c.key == key).map(|c| c.max)
    }

    pub fn kind_max(&self, kind: ComponentKind) -> f64 {
        self.components
            .iter()
            .filter(|c| self.education_level.component_kind(&c.key) == Some(kind))
            .map(|c| c.max)
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringDraft {
    pub name: String,
    pub education_level: EducationLevel,
    pub result_type: String,
    pub components: Vec<ComponentMax>,
    pub total_max_score: f64,
    #[serde(default)]
    pub ca_weight: Option<f64>,
    #[serde(default)]
    pub exam_weight: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
}

fn default_true() -> bool {
    true
}

pub fn validate(draft: &ScoringDraft) -> EngineResult<()> {
    if draft.name.trim().is_empty() {
        return Err(EngineError::bad_params("name must not be empty"));
    }
    if draft.components.is_empty() {
        return Err(EngineError::InvalidScoringSchema(
            "at least one component is required".into(),
        ));
    }
    let mut seen: Vec<&str> = Vec::new();
    for c in &draft.components {
        if draft.education_level.component_kind(&c.key).is_none() {
            return Err(EngineError::InvalidScoringSchema(format!(
                "component '{}' is not defined for {}",
                c.key, draft.education_level
            )));
        }
        if seen.contains(&c.key.as_str()) {
            return Err(EngineError::InvalidScoringSchema(format!(
                "component '{}' is declared twice",
                c.key
            )));
        }
        seen.push(&c.key);
        if !c.max.is_finite() || c.max < 0.0 {
            return Err(EngineError::InvalidScoringSchema(format!(
                "component '{}' must have a non-negative maximum",
                c.key
            )));
        }
    }

    let declared: f64 = draft.components.iter().map(|c| c.max).sum();
    if (declared - draft.total_max_score).abs() > SUM_EPSILON {
        return Err(EngineError::InvalidScoringSchema(format!(
            "component maxima sum to {} but total is {}",
            declared, draft.total_max_score
        )));
    }

    match (draft.ca_weight, draft.exam_weight) {
        (None, None) => {}
        (Some(ca), Some(exam)) => {
            if ca < 0.0 || exam < 0.0 || (ca + exam - 100.0).abs() > SUM_EPSILON {
                return Err(EngineError::InvalidScoringSchema(format!(
                    "CA and exam weights must sum to 100 (got {} + {})",
                    ca, exam
                )));
            }
        }
        _ => {
            return Err(EngineError::InvalidScoringSchema(
                "CA and exam weights must be given together".into(),
            ))
        }
    }
    Ok(())
}

pub fn create(conn: &Connection, draft: &ScoringDraft) -> EngineResult<String> {
    validate(draft)?;
    let result_type = normalize_result_type(&draft.result_type)?;
    let components = serde_json::to_string(&draft.components)
        .map_err(|e| EngineError::InvalidScoringSchema(e.to_string()))?;
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO scoring_configurations(
            id, name, education_level, result_type, components, total_max_score,
            ca_weight, exam_weight, is_default, is_active, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
        rusqlite::params![
            id,
            draft.name.trim(),
            draft.education_level.as_str(),
            result_type,
            components,
            draft.total_max_score,
            draft.ca_weight,
            draft.exam_weight,
            draft.is_active as i64,
            now,
            now
        ],
    )?;
    if draft.is_default {
        flip_default(&tx, &id, draft.education_level)?;
    }
    tx.commit()?;
    tracing::debug!(config_id = %id, level = %draft.education_level, "scoring configuration created");
    Ok(id)
}

pub fn update(conn: &Connection, id: &str, draft: &ScoringDraft) -> EngineResult<()> {
    validate(draft)?;
    let result_type = normalize_result_type(&draft.result_type)?;
    let components = serde_json::to_string(&draft.components)
        .map_err(|e| EngineError::InvalidScoringSchema(e.to_string()))?;

    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE scoring_configurations SET
            name = ?, education_level = ?, result_type = ?, components = ?,
            total_max_score = ?, ca_weight = ?, exam_weight = ?, is_active = ?,
            is_default = CASE WHEN education_level = ? THEN is_default ELSE 0 END,
            updated_at = ?
         WHERE id = ?",
        rusqlite::params![
            draft.name.trim(),
            draft.education_level.as_str(),
            result_type,
            components,
            draft.total_max_score,
            draft.ca_weight,
            draft.exam_weight,
            draft.is_active as i64,
            draft.education_level.as_str(),
            now_rfc3339(),
            id
        ],
    )?;
    if changed == 0 {
        return Err(EngineError::not_found("scoring configuration", id));
    }
    if draft.is_default {
        flip_default(&tx, id, draft.education_level)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn set_default(conn: &Connection, id: &str) -> EngineResult<()> {
    let tx = conn.unchecked_transaction()?;
    let level: Option<String> = tx
        .query_row(
            "SELECT education_level FROM scoring_configurations WHERE id = ?",
            [id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(level) = level else {
        return Err(EngineError::not_found("scoring configuration", id));
    };
    flip_default(&tx, id, EducationLevel::parse_required(&level)?)?;
    tx.commit()?;
    Ok(())
}

// Clear-all then set-one. Callers own the transaction.
fn flip_default(conn: &Connection, id: &str, level: EducationLevel) -> EngineResult<()> {
    conn.execute(
        "UPDATE scoring_configurations SET is_default = 0
         WHERE education_level = ? AND is_default = 1",
        [level.as_str()],
    )?;
    conn.execute(
        "UPDATE scoring_configurations SET is_default = 1, updated_at = ? WHERE id = ?",
        (now_rfc3339(), id),
    )?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, name, education_level, result_type, components, total_max_score,
     ca_weight, exam_weight, is_default, is_active";

fn map_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(ScoringConfigurationRow, String)> {
    Ok((
        ScoringConfigurationRow {
            id: r.get(0)?,
            name: r.get(1)?,
            education_level: r.get(2)?,
            result_type: r.get(3)?,
            total_max_score: r.get(5)?,
            ca_weight: r.get(6)?,
            exam_weight: r.get(7)?,
            is_default: r.get::<_, i64>(8)? != 0,
            is_active: r.get::<_, i64>(9)? != 0,
        },
        r.get(4)?,
    ))
}

struct ScoringConfigurationRow {
    id: String,
    name: String,
    education_level: String,
    result_type: String,
    total_max_score: f64,
    ca_weight: Option<f64>,
    exam_weight: Option<f64>,
    is_default: bool,
    is_active: bool,
}

fn hydrate((row, components): (ScoringConfigurationRow, String)) -> EngineResult<ScoringConfiguration> {
    let components: Vec<ComponentMax> = serde_json::from_str(&components).map_err(|e| {
        EngineError::InvalidScoringSchema(format!("stored components for {}: {e}", row.id))
    })?;
    Ok(ScoringConfiguration {
        education_level: EducationLevel::parse_required(&row.education_level)?,
        id: row.id,
        name: row.name,
        result_type: row.result_type,
        components,
        total_max_score: row.total_max_score,
        ca_weight: row.ca_weight,
        exam_weight: row.exam_weight,
        is_default: row.is_default,
        is_active: row.is_active,
    })
}

pub fn get(conn: &Connection, id: &str) -> EngineResult<ScoringConfiguration> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM scoring_configurations WHERE id = ?");
    let row = conn.query_row(&sql, [id], map_row).optional()?;
    match row {
        Some(row) => hydrate(row),
        None => Err(EngineError::not_found("scoring configuration", id)),
    }
}

pub fn list(conn: &Connection, level: Option<EducationLevel>) -> EngineResult<Vec<ScoringConfiguration>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM scoring_configurations
         WHERE (?1 IS NULL OR education_level = ?1)
         ORDER BY education_level, result_type, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([level.map(|l| l.as_str())], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(hydrate).collect()
}

/// The configuration that applies to `(level, result_type)`.
///
/// An active default for the level that matches the result type wins;
/// otherwise the earliest-created active configuration in scope.
pub fn resolve(
    conn: &Connection,
    level: EducationLevel,
    result_type: &str,
) -> EngineResult<ScoringConfiguration> {
    let result_type = normalize_result_type(result_type)?;
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM scoring_configurations
         WHERE education_level = ? AND result_type = ? AND is_active = 1
         ORDER BY is_default DESC, rowid
         LIMIT 1"
    );
    let row = conn
        .query_row(&sql, (level.as_str(), &result_type), map_row)
        .optional()?;
    match row {
        Some(row) => hydrate(row),
        None => Err(EngineError::ConfigurationNotFound {
            education_level: level.as_str().to_string(),
            result_type,
        }),
    }
}
