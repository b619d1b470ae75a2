use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EducationLevel {
    Nursery,
    Primary,
    JuniorSecondary,
    SeniorSecondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Ca,
    Exam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingField {
    TotalScore,
    TotalPercentage,
    /// Nursery's mark-obtained over mark-obtainable. Stored in `total_percentage`.
    Percentage,
}

impl RankingField {
    pub fn column(self) -> &'static str {
        match self {
            Self::TotalScore => "total_score",
            Self::TotalPercentage | Self::Percentage => "total_percentage",
        }
    }
}

const NURSERY_COMPONENTS: &[(&str, ComponentKind)] = &[("mark_obtained", ComponentKind::Exam)];

const BASIC_COMPONENTS: &[(&str, ComponentKind)] = &[
    ("continuous_assessment", ComponentKind::Ca),
    ("take_home_test", ComponentKind::Ca),
    ("practical", ComponentKind::Ca),
    ("project", ComponentKind::Ca),
    ("note_copying", ComponentKind::Ca),
    ("exam", ComponentKind::Exam),
];

const SENIOR_COMPONENTS: &[(&str, ComponentKind)] = &[
    ("test1", ComponentKind::Ca),
    ("test2", ComponentKind::Ca),
    ("test3", ComponentKind::Ca),
    ("exam", ComponentKind::Exam),
];

impl EducationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nursery => "NURSERY",
            Self::Primary => "PRIMARY",
            Self::JuniorSecondary => "JUNIOR_SECONDARY",
            Self::SeniorSecondary => "SENIOR_SECONDARY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "NURSERY" => Some(Self::Nursery),
            "PRIMARY" => Some(Self::Primary),
            "JUNIOR_SECONDARY" | "JSS" => Some(Self::JuniorSecondary),
            "SENIOR_SECONDARY" | "SSS" => Some(Self::SeniorSecondary),
            _ => None,
        }
    }

    pub fn parse_required(s: &str) -> EngineResult<Self> {
        Self::parse(s).ok_or_else(|| {
            EngineError::bad_params(format!(
                "educationLevel must be one of NURSERY, PRIMARY, JUNIOR_SECONDARY, SENIOR_SECONDARY (got '{s}')"
            ))
        })
    }

    pub fn component_schema(self) -> &'static [(&'static str, ComponentKind)] {
        match self {
            Self::Nursery => NURSERY_COMPONENTS,
            Self::Primary | Self::JuniorSecondary => BASIC_COMPONENTS,
            Self::SeniorSecondary => SENIOR_COMPONENTS,
        }
    }

    pub fn component_kind(self, key: &str) -> Option<ComponentKind> {
        self.component_schema()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, kind)| *kind)
    }

    pub fn ranking_field(self) -> RankingField {
        match self {
            Self::Nursery => RankingField::Percentage,
            Self::Primary | Self::JuniorSecondary => RankingField::TotalScore,
            Self::SeniorSecondary => RankingField::TotalPercentage,
        }
    }

    /// Term reports rank on `overall_percentage` where results rank on a
    /// percentage, and on `average_score` where they rank on raw totals.
    pub fn report_ranking_column(self) -> &'static str {
        match self.ranking_field() {
            RankingField::TotalScore => "average_score",
            RankingField::TotalPercentage | RankingField::Percentage => "overall_percentage",
        }
    }
}

impl fmt::Display for EducationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Draft,
    Submitted,
    Approved,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Submit,
    Approve,
    Publish,
    Reject,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Publish => "publish",
            Self::Reject => "reject",
        }
    }
}

pub const ELIGIBLE_STATUSES: [Status; 2] = [Status::Approved, Status::Published];

pub const ELIGIBLE_STATUS_SQL: &str = "status IN ('APPROVED', 'PUBLISHED')";

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Published => "PUBLISHED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "SUBMITTED" => Some(Self::Submitted),
            "APPROVED" => Some(Self::Approved),
            "PUBLISHED" => Some(Self::Published),
            _ => None,
        }
    }

    pub fn is_eligible(self) -> bool {
        ELIGIBLE_STATUSES.contains(&self)
    }

    /// DRAFT -> SUBMITTED -> APPROVED -> PUBLISHED, with reject reopening a
    /// submitted or approved record to DRAFT.
    pub fn apply(self, transition: Transition) -> EngineResult<Status> {
        let next = match (self, transition) {
            (Self::Draft, Transition::Submit) => Some(Self::Submitted),
            (Self::Submitted, Transition::Approve) => Some(Self::Approved),
            (Self::Approved, Transition::Publish) => Some(Self::Published),
            (Self::Submitted | Self::Approved, Transition::Reject) => Some(Self::Draft),
            _ => None,
        };
        next.ok_or_else(|| EngineError::InvalidTransition {
            from: self.as_str().to_string(),
            action: transition.as_str().to_string(),
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter set for batch operations. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default)]
    pub education_level: Option<EducationLevel>,
    #[serde(default, alias = "examSession")]
    pub exam_session_id: Option<String>,
    #[serde(default, alias = "class")]
    pub class_id: Option<String>,
}

impl Scope {
    pub fn bind_values(&self) -> [Option<String>; 3] {
        [
            self.education_level.map(|l| l.as_str().to_string()),
            self.exam_session_id.clone(),
            self.class_id.clone(),
        ]
    }
}

/// `WHERE`-clause fragment matching a `Scope` on a table aliased `alias`.
/// Placeholders are `?1`..`?3`, bound with `Scope::bind_values`.
pub fn scope_sql(alias: &str) -> String {
    format!(
        "(?1 IS NULL OR {a}.education_level = ?1)
         AND (?2 IS NULL OR {a}.exam_session_id = ?2)
         AND (?3 IS NULL OR {a}.class_id = ?3)",
        a = alias
    )
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

pub fn percent_of(part: f64, max: f64) -> f64 {
    if max > 0.0 {
        100.0 * part / max
    } else {
        0.0
    }
}
