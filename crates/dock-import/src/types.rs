use chrono::{DateTime, Utc};
use serde::Serialize;

/// Upload-level failures. Any of these rejects the whole file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("unsupported file type '{filename}': upload a .csv, .xlsx or .xls file")]
    UnsupportedFileType { filename: String },

    #[error("failed to parse CSV file: {0}")]
    Csv(String),

    #[error("failed to read Excel workbook: {0}")]
    Workbook(String),

    #[error("missing required column: '{0}'")]
    MissingColumn(String),
}

/// One rejected row. `row` counts the header as row 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub error: String,
}

/// Outcome of a partial-success import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport<T> {
    pub success: bool,
    pub created_count: usize,
    pub error_count: usize,
    pub created: Vec<T>,
    pub errors: Vec<RowError>,
}

impl<T> Default for ImportReport<T> {
    fn default() -> Self {
        Self {
            success: true,
            created_count: 0,
            error_count: 0,
            created: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> ImportReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_created(&mut self, item: T) {
        self.created.push(item);
        self.created_count = self.created.len();
    }

    pub fn push_error(&mut self, row: usize, error: impl Into<String>) {
        self.errors.push(RowError {
            row,
            error: error.into(),
        });
        self.error_count = self.errors.len();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VesselRow {
    pub row: usize,
    pub name: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementRow {
    pub row: usize,
    pub item_name: String,
    pub required_quantity: i32,
    pub category: Option<String>,
    pub critical: bool,
    pub notes: Option<String>,
}

/// Scheduling rule parsed from `cadence_type` plus its companion column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCadence {
    Interval { days: i32 },
    IntervalHours { hours: i32 },
    SpecificDate { due: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceTaskRow {
    pub row: usize,
    pub name: String,
    pub description: Option<String>,
    pub cadence: TaskCadence,
    pub critical: bool,
    pub is_active: bool,
}
