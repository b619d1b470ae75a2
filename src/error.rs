use serde_json::json;
use thiserror::Error;

/// Every failure the engine can report to a caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("score for '{component}' is out of range: {value} (allowed 0..={max})")]
    ScoreOutOfRange {
        component: String,
        value: f64,
        max: f64,
    },
    #[error("invalid scoring schema: {0}")]
    InvalidScoringSchema(String),
    #[error("no scoring configuration for {education_level} / {result_type}")]
    ConfigurationNotFound {
        education_level: String,
        result_type: String,
    },
    #[error("a result already exists for this student, subject and exam session")]
    DuplicateResult {
        student_id: String,
        subject_id: String,
        exam_session_id: String,
    },
    #[error("cannot {action} a record in status {from}")]
    InvalidTransition { from: String, action: String },
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    BadParams(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::BadParams(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::ScoreOutOfRange { .. } => "score_out_of_range",
            Self::InvalidScoringSchema(_) => "invalid_scoring_schema",
            Self::ConfigurationNotFound { .. } => "configuration_not_found",
            Self::DuplicateResult { .. } => "duplicate_result",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotFound { .. } => "not_found",
            Self::BadParams(_) => "bad_params",
            Self::Db(_) => "db_error",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::ScoreOutOfRange {
                component,
                value,
                max,
            } => Some(json!({ "field": component, "value": value, "max": max })),
            Self::ConfigurationNotFound {
                education_level,
                result_type,
            } => Some(json!({
                "educationLevel": education_level,
                "resultType": result_type
            })),
            Self::DuplicateResult {
                student_id,
                subject_id,
                exam_session_id,
            } => Some(json!({
                "studentId": student_id,
                "subjectId": subject_id,
                "examSessionId": exam_session_id
            })),
            Self::InvalidTransition { from, action } => {
                Some(json!({ "status": from, "action": action }))
            }
            Self::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            Self::InvalidScoringSchema(_) | Self::BadParams(_) | Self::Db(_) => None,
        }
    }
}

pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
