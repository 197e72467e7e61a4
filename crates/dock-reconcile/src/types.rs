use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of an inventory check. `InProgress -> Submitted` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    InProgress,
    Submitted,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::InProgress => "in_progress",
            CheckStatus::Submitted => "submitted",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownValue> {
        match s {
            "in_progress" => Ok(CheckStatus::InProgress),
            "submitted" => Ok(CheckStatus::Submitted),
            other => Err(UnknownValue::new("check status", other)),
        }
    }

    /// Lines can no longer change.
    pub fn is_frozen(&self) -> bool {
        matches!(self, CheckStatus::Submitted)
    }
}

/// Observed condition of an inventory item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCondition {
    #[default]
    Ok,
    Low,
    Damaged,
    Missing,
    Expired,
}

impl LineCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineCondition::Ok => "ok",
            LineCondition::Low => "low",
            LineCondition::Damaged => "damaged",
            LineCondition::Missing => "missing",
            LineCondition::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownValue> {
        match s {
            "ok" => Ok(LineCondition::Ok),
            "low" => Ok(LineCondition::Low),
            "damaged" => Ok(LineCondition::Damaged),
            "missing" => Ok(LineCondition::Missing),
            "expired" => Ok(LineCondition::Expired),
            other => Err(UnknownValue::new("line condition", other)),
        }
    }
}

impl fmt::Display for LineCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A stored line as loaded for reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExistingLine {
    pub line_id: i64,
    pub requirement_id: i64,
    pub actual_quantity: i64,
    pub condition: LineCondition,
    pub notes: Option<String>,
}

/// One submitted line (request payload shape).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub requirement_id: i64,
    #[serde(default)]
    pub actual_quantity: i64,
    #[serde(default)]
    pub condition: LineCondition,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LineInput {
    pub fn new(requirement_id: i64, actual_quantity: i64, condition: LineCondition) -> Self {
        Self {
            requirement_id,
            actual_quantity,
            condition,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// In-place update of an existing line. `changed` is false when the submitted
/// values equal the stored ones; such updates need no write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineUpdate {
    pub line_id: i64,
    pub requirement_id: i64,
    pub actual_quantity: i64,
    pub condition: LineCondition,
    pub notes: Option<String>,
    pub changed: bool,
}

/// Insert / update / delete sets for one check.
///
/// `to_insert` and `to_update` follow submission order; `to_delete` holds line
/// ids in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub check_id: i64,
    pub to_insert: Vec<LineInput>,
    pub to_update: Vec<LineUpdate>,
    pub to_delete: Vec<i64>,
}

impl ReconcilePlan {
    pub fn empty(check_id: i64) -> Self {
        Self {
            check_id,
            to_insert: Vec::new(),
            to_update: Vec::new(),
            to_delete: Vec::new(),
        }
    }

    pub fn changed_updates(&self) -> impl Iterator<Item = &LineUpdate> {
        self.to_update.iter().filter(|u| u.changed)
    }

    /// Number of row writes needed to apply the plan.
    pub fn write_count(&self) -> usize {
        self.to_insert.len() + self.changed_updates().count() + self.to_delete.len()
    }

    /// Applying the plan would not change any stored row.
    pub fn is_noop(&self) -> bool {
        self.write_count() == 0
    }
}

/// Reasons a line submission is refused. Nothing is applied on error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("inventory check {check_id} is submitted; lines are frozen")]
    CheckSubmitted { check_id: i64 },

    #[error("requirement {requirement_id} appears more than once in the submission")]
    DuplicateRequirement { requirement_id: i64 },

    #[error("actual_quantity must be >= 0 (requirement {requirement_id} got {actual_quantity})")]
    NegativeQuantity {
        requirement_id: i64,
        actual_quantity: i64,
    },

    #[error("requirements do not belong to this vessel: {requirement_ids:?}")]
    RequirementScopeMismatch { requirement_ids: Vec<i64> },
}

impl ReconcileError {
    /// Frozen-check refusals are state errors; everything else is bad input.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, ReconcileError::CheckSubmitted { .. })
    }
}
