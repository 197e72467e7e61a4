//! Bulk CSV/Excel import helpers (dock-import boundary).
//!
//! Read side only: an uploaded file is decoded into a [`Table`] and each row is
//! coerced into a typed record ([`VesselRow`], [`RequirementRow`],
//! [`MaintenanceTaskRow`]). Nothing here touches the database; the caller
//! inserts rows one at a time and collects failures into an [`ImportReport`].
//!
//! ## Upload contract
//!
//! - `.csv`, `.xlsx` and `.xls` are accepted (extension checked case-insensitively)
//! - CSV text: UTF-8 is tried first (BOM stripped), then Latin-1
//! - workbooks: the first sheet is read, its first row is the header
//! - header names are trimmed and lower-cased; column order does not matter
//! - a missing required column fails the whole upload
//! - row numbers are 1-based with the header as row 1

mod rows;
mod table;
mod types;

pub use rows::{
    parse_maintenance_task_row, parse_requirement_row, parse_vessel_row,
    REQUIREMENT_REQUIRED_COLUMNS, TASK_REQUIRED_COLUMNS, VESSEL_REQUIRED_COLUMNS,
};
pub use table::{decode_text, parse_csv_str, parse_upload, parse_workbook, Row, Table};
pub use types::*;
