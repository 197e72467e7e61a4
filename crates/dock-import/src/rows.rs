use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::{MaintenanceTaskRow, RequirementRow, Row, RowError, TaskCadence, VesselRow};

const TRUTHY: &[&str] = &["true", "1", "yes", "y", "critical"];
const FALSY: &[&str] = &["false", "0", "no", "n", "inactive"];

/// Columns whose absence rejects a vessel upload.
pub const VESSEL_REQUIRED_COLUMNS: &[&str] = &["name"];
pub const REQUIREMENT_REQUIRED_COLUMNS: &[&str] = &["item_name"];
pub const TASK_REQUIRED_COLUMNS: &[&str] = &["name", "cadence_type"];

const VESSEL_NAME_MAX: usize = 255;
const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1900..=2100;

fn fail<T>(row: &Row, msg: impl Into<String>) -> Result<T, RowError> {
    Err(RowError {
        row: row.number,
        error: msg.into(),
    })
}

fn opt(row: &Row, column: &str) -> Option<String> {
    row.get(column).map(str::to_string)
}

/// Integer cell. Spreadsheet exports often write `3.0`; the fractional part is
/// truncated.
fn parse_int(raw: &str) -> Option<i64> {
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let f = raw.parse::<f64>().ok()?;
    if !f.is_finite() || f.abs() > i32::MAX as f64 {
        return None;
    }
    Some(f.trunc() as i64)
}

fn is_truthy(raw: Option<&str>) -> bool {
    raw.map(|v| TRUTHY.contains(&v.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Everything except an explicit "no" counts as active.
fn is_active(raw: Option<&str>) -> bool {
    raw.map(|v| !FALSY.contains(&v.to_lowercase().as_str()))
        .unwrap_or(true)
}

fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
        }
    }
    None
}

pub fn parse_vessel_row(row: &Row) -> Result<VesselRow, RowError> {
    let Some(name) = row.get("name") else {
        return fail(row, "Name is required");
    };
    if name.chars().count() > VESSEL_NAME_MAX {
        return fail(row, format!("Name must be at most {VESSEL_NAME_MAX} characters"));
    }

    let year = match row.get("year") {
        None => None,
        Some(raw) => match parse_int(raw) {
            Some(y) if YEAR_RANGE.contains(&y) => i32::try_from(y).ok(),
            Some(y) => return fail(row, format!("Invalid year: {y}")),
            None => return fail(row, format!("Invalid year: {raw}")),
        },
    };

    Ok(VesselRow {
        row: row.number,
        name: name.to_string(),
        make: opt(row, "make"),
        model: opt(row, "model"),
        year,
        description: opt(row, "description"),
        location: opt(row, "location"),
    })
}

pub fn parse_requirement_row(row: &Row) -> Result<RequirementRow, RowError> {
    let Some(item_name) = row.get("item_name") else {
        return fail(row, "Item name is required");
    };

    let required_quantity = match row.get("required_quantity") {
        None => 1,
        Some(raw) => match parse_int(raw) {
            Some(q) if q >= 0 => match i32::try_from(q) {
                Ok(q) => q,
                Err(_) => return fail(row, format!("Invalid required_quantity: {raw}")),
            },
            _ => return fail(row, format!("Invalid required_quantity: {raw}")),
        },
    };

    Ok(RequirementRow {
        row: row.number,
        item_name: item_name.to_string(),
        required_quantity,
        category: opt(row, "category"),
        critical: is_truthy(row.get("critical")),
        notes: opt(row, "notes"),
    })
}

fn positive_column(row: &Row, column: &str, cadence: &str) -> Result<i32, RowError> {
    let Some(raw) = row.get(column) else {
        return fail(row, format!("{column} is required for {cadence} cadence"));
    };
    match parse_int(raw).filter(|v| *v >= 1).map(i32::try_from) {
        Some(Ok(v)) => Ok(v),
        _ => fail(row, format!("Invalid {column}: {raw}")),
    }
}

pub fn parse_maintenance_task_row(row: &Row) -> Result<MaintenanceTaskRow, RowError> {
    let Some(name) = row.get("name") else {
        return fail(row, "Name is required");
    };

    let cadence_type = row.get("cadence_type").unwrap_or("").to_lowercase();
    let cadence = match cadence_type.as_str() {
        "interval" => TaskCadence::Interval {
            days: positive_column(row, "interval_days", "interval")?,
        },
        "interval_hours" => TaskCadence::IntervalHours {
            hours: positive_column(row, "interval_hours", "interval_hours")?,
        },
        "specific_date" => {
            let Some(raw) = row.get("due_date") else {
                return fail(row, "due_date is required for specific_date cadence");
            };
            match parse_due_date(raw) {
                Some(due) => TaskCadence::SpecificDate { due },
                None => {
                    return fail(
                        row,
                        format!("Invalid due_date format: {raw}. Use YYYY-MM-DD"),
                    )
                }
            }
        }
        other => {
            return fail(
                row,
                format!(
                    "Invalid cadence_type: {other}. Must be 'interval', 'interval_hours' or 'specific_date'"
                ),
            )
        }
    };

    Ok(MaintenanceTaskRow {
        row: row.number,
        name: name.to_string(),
        description: opt(row, "description"),
        cadence,
        critical: is_truthy(row.get("critical")),
        is_active: is_active(row.get("is_active")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> Row {
        Row::new(
            2,
            cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn parse_int_truncates_float_text() {
        assert_eq!(parse_int("4"), Some(4));
        assert_eq!(parse_int("4.9"), Some(4));
        assert_eq!(parse_int("-1.5"), Some(-1));
        assert_eq!(parse_int("four"), None);
        assert_eq!(parse_int("NaN"), None);
    }

    #[test]
    fn due_date_formats() {
        let midnight = Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_due_date("2027-03-01"), Some(midnight));
        assert_eq!(parse_due_date("03/01/2027"), Some(midnight));
        assert_eq!(parse_due_date("2027-03-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_due_date("2027-03-01 00:00:00"), Some(midnight));
        assert_eq!(parse_due_date("next tuesday"), None);
    }

    #[test]
    fn vessel_year_out_of_range_is_row_error() {
        let err = parse_vessel_row(&row(&[("name", "Aurora"), ("year", "1850")])).unwrap_err();
        assert_eq!(err.row, 2);
        assert_eq!(err.error, "Invalid year: 1850");
    }

    #[test]
    fn critical_and_active_flags() {
        assert!(is_truthy(Some("Yes")));
        assert!(is_truthy(Some("critical")));
        assert!(!is_truthy(Some("maybe")));
        assert!(!is_truthy(None));

        assert!(is_active(None));
        assert!(is_active(Some("maybe")));
        assert!(!is_active(Some("Inactive")));
        assert!(!is_active(Some("0")));
    }
}
