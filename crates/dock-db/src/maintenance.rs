use chrono::{DateTime, Duration, Utc};
use dock_import::{MaintenanceTaskRow, TaskCadence};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::vessels::fetch_vessel;
use crate::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceType {
    Interval,
    IntervalHours,
    SpecificDate,
}

impl CadenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CadenceType::Interval => "interval",
            CadenceType::IntervalHours => "interval_hours",
            CadenceType::SpecificDate => "specific_date",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "interval" => Some(CadenceType::Interval),
            "interval_hours" => Some(CadenceType::IntervalHours),
            "specific_date" => Some(CadenceType::SpecificDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceTask {
    pub id: i64,
    pub vessel_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub cadence_type: CadenceType,
    pub interval_days: Option<i32>,
    pub interval_hours: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub next_due_at: Option<DateTime<Utc>>,
    pub critical: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceTask {
    pub fn cadence(&self) -> DomainResult<TaskCadence> {
        cadence_from_parts(
            self.cadence_type,
            self.interval_days,
            self.interval_hours,
            self.due_date,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceLog {
    pub id: i64,
    pub maintenance_task_id: i64,
    pub performed_by_user_id: i64,
    pub performed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

const TASK_COLUMNS: &str = r#"
    t.id, t.vessel_id, t.name, t.description, t.cadence_type, t.interval_days,
    t.interval_hours, t.due_date, t.next_due_at, t.critical, t.is_active,
    t.created_at, t.updated_at
"#;

const RETURNING_TASK_COLUMNS: &str = r#"
    id, vessel_id, name, description, cadence_type, interval_days,
    interval_hours, due_date, next_due_at, critical, is_active,
    created_at, updated_at
"#;

fn task_from_row(row: &PgRow) -> DomainResult<MaintenanceTask> {
    let cadence: String = row.try_get("cadence_type")?;
    let cadence_type = CadenceType::parse(&cadence).ok_or_else(|| {
        DomainError::Internal(anyhow::anyhow!("unexpected stored cadence_type '{cadence}'"))
    })?;
    Ok(MaintenanceTask {
        id: row.try_get("id")?,
        vessel_id: row.try_get("vessel_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        cadence_type,
        interval_days: row.try_get("interval_days")?,
        interval_hours: row.try_get("interval_hours")?,
        due_date: row.try_get("due_date")?,
        next_due_at: row.try_get("next_due_at")?,
        critical: row.try_get("critical")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn cadence_from_parts(
    cadence_type: CadenceType,
    interval_days: Option<i32>,
    interval_hours: Option<i32>,
    due_date: Option<DateTime<Utc>>,
) -> DomainResult<TaskCadence> {
    match cadence_type {
        CadenceType::Interval => match interval_days {
            Some(days) if days >= 1 => Ok(TaskCadence::Interval { days }),
            Some(_) => Err(DomainError::validation("interval_days must be >= 1")),
            None => Err(DomainError::validation(
                "interval_days is required for interval cadence",
            )),
        },
        CadenceType::IntervalHours => match interval_hours {
            Some(hours) if hours >= 1 => Ok(TaskCadence::IntervalHours { hours }),
            Some(_) => Err(DomainError::validation("interval_hours must be >= 1")),
            None => Err(DomainError::validation(
                "interval_hours is required for interval_hours cadence",
            )),
        },
        CadenceType::SpecificDate => due_date
            .map(|due| TaskCadence::SpecificDate { due })
            .ok_or_else(|| {
                DomainError::validation("due_date is required for specific_date cadence")
            }),
    }
}

/// When the task is next due, counting from `from`. An interval that lands
/// past the representable calendar is a validation failure.
pub fn next_due(cadence: &TaskCadence, from: DateTime<Utc>) -> DomainResult<DateTime<Utc>> {
    let (step, column) = match cadence {
        TaskCadence::Interval { days } => (Duration::days(i64::from(*days)), "interval_days"),
        TaskCadence::IntervalHours { hours } => {
            (Duration::hours(i64::from(*hours)), "interval_hours")
        }
        TaskCadence::SpecificDate { due } => return Ok(*due),
    };
    from.checked_add_signed(step)
        .ok_or_else(|| DomainError::validation(format!("{column} puts the next due date out of range")))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMaintenanceTask {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub cadence_type: CadenceType,
    #[serde(default)]
    pub interval_days: Option<i32>,
    #[serde(default)]
    pub interval_hours: Option<i32>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewMaintenanceTask {
    /// Validate and return the cadence. Companion columns that do not belong
    /// to the cadence are ignored on insert.
    pub fn validate(&self) -> DomainResult<TaskCadence> {
        let n = self.name.trim().chars().count();
        if n == 0 || n > 255 {
            return Err(DomainError::validation("name must be 1..=255 characters"));
        }
        cadence_from_parts(
            self.cadence_type,
            self.interval_days,
            self.interval_hours,
            self.due_date,
        )
    }
}

impl From<MaintenanceTaskRow> for NewMaintenanceTask {
    fn from(r: MaintenanceTaskRow) -> Self {
        let (cadence_type, interval_days, interval_hours, due_date) = match r.cadence {
            TaskCadence::Interval { days } => (CadenceType::Interval, Some(days), None, None),
            TaskCadence::IntervalHours { hours } => {
                (CadenceType::IntervalHours, None, Some(hours), None)
            }
            TaskCadence::SpecificDate { due } => (CadenceType::SpecificDate, None, None, Some(due)),
        };
        NewMaintenanceTask {
            name: r.name,
            description: r.description,
            cadence_type,
            interval_days,
            interval_hours,
            due_date,
            critical: r.critical,
            is_active: r.is_active,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteTask {
    #[serde(default)]
    pub performed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub task: MaintenanceTask,
    pub log: MaintenanceLog,
}

/// Tasks of one vessel: soonest due first, undated last.
pub async fn list_tasks(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
) -> DomainResult<Vec<MaintenanceTask>> {
    fetch_vessel(conn, org_id, vessel_id).await?;
    let rows = sqlx::query(&format!(
        r#"
        select {TASK_COLUMNS}
        from maintenance_tasks t
        where t.vessel_id = $1
        order by t.next_due_at asc nulls last, t.id
        "#
    ))
    .bind(vessel_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(task_from_row).collect()
}

pub async fn fetch_task(
    conn: &mut PgConnection,
    org_id: i64,
    task_id: i64,
) -> DomainResult<MaintenanceTask> {
    let row = sqlx::query(&format!(
        r#"
        select {TASK_COLUMNS}
        from maintenance_tasks t
        join vessels v on v.id = t.vessel_id
        where t.id = $1 and v.org_id = $2
        "#
    ))
    .bind(task_id)
    .bind(org_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Maintenance task"))?;
    task_from_row(&row)
}

pub async fn create_task(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
    t: &NewMaintenanceTask,
    now: DateTime<Utc>,
) -> DomainResult<MaintenanceTask> {
    let cadence = t.validate()?;
    let next_due_at = next_due(&cadence, now)?;
    let vessel = fetch_vessel(conn, org_id, vessel_id).await?;

    let (interval_days, interval_hours, due_date) = match cadence {
        TaskCadence::Interval { days } => (Some(days), None, None),
        TaskCadence::IntervalHours { hours } => (None, Some(hours), None),
        TaskCadence::SpecificDate { due } => (None, None, Some(due)),
    };

    let row = sqlx::query(&format!(
        r#"
        insert into maintenance_tasks
            (vessel_id, name, description, cadence_type, interval_days, interval_hours,
             due_date, next_due_at, critical, is_active)
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        returning {RETURNING_TASK_COLUMNS}
        "#
    ))
    .bind(vessel.id)
    .bind(t.name.trim())
    .bind(&t.description)
    .bind(t.cadence_type.as_str())
    .bind(interval_days)
    .bind(interval_hours)
    .bind(due_date)
    .bind(next_due_at)
    .bind(t.critical)
    .bind(t.is_active)
    .fetch_one(&mut *conn)
    .await?;
    task_from_row(&row)
}

/// Log a completion and advance the schedule.
///
/// Recurring cadences restart from the completion time. A one-off
/// `specific_date` task is retired: `next_due_at` is cleared and the task
/// deactivated.
pub async fn complete_task(
    conn: &mut PgConnection,
    org_id: i64,
    task_id: i64,
    performed_by_user_id: i64,
    input: &CompleteTask,
    now: DateTime<Utc>,
) -> DomainResult<Completion> {
    let task = fetch_task(conn, org_id, task_id).await?;
    if !task.is_active {
        return Err(DomainError::invalid_state(format!(
            "maintenance task {} is inactive",
            task.id
        )));
    }
    let performed_at = input.performed_at.unwrap_or(now);
    let (next_due_at, is_active) = match task.cadence()? {
        TaskCadence::SpecificDate { .. } => (None, false),
        recurring => (Some(next_due(&recurring, performed_at)?), true),
    };

    let log_row = sqlx::query(
        r#"
        insert into maintenance_logs (maintenance_task_id, performed_by_user_id, performed_at, notes)
        values ($1, $2, $3, $4)
        returning id, maintenance_task_id, performed_by_user_id, performed_at, notes, created_at
        "#,
    )
    .bind(task.id)
    .bind(performed_by_user_id)
    .bind(performed_at)
    .bind(&input.notes)
    .fetch_one(&mut *conn)
    .await?;
    let log = MaintenanceLog {
        id: log_row.try_get("id")?,
        maintenance_task_id: log_row.try_get("maintenance_task_id")?,
        performed_by_user_id: log_row.try_get("performed_by_user_id")?,
        performed_at: log_row.try_get("performed_at")?,
        notes: log_row.try_get("notes")?,
        created_at: log_row.try_get("created_at")?,
    };

    let row = sqlx::query(&format!(
        r#"
        update maintenance_tasks
        set next_due_at = $2, is_active = $3, updated_at = now()
        where id = $1
        returning {RETURNING_TASK_COLUMNS}
        "#
    ))
    .bind(task.id)
    .bind(next_due_at)
    .bind(is_active)
    .fetch_one(&mut *conn)
    .await?;
    let task = task_from_row(&row)?;
    tracing::info!(org_id, task_id = task.id, log_id = log.id, "maintenance task completed");
    Ok(Completion { task, log })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn recurring_cadences_count_from_the_given_time() {
        assert_eq!(
            next_due(&TaskCadence::Interval { days: 30 }, t0()).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
        );
        assert_eq!(
            next_due(&TaskCadence::IntervalHours { hours: 250 }, t0()).unwrap(),
            t0() + Duration::hours(250)
        );
    }

    #[test]
    fn interval_past_the_calendar_is_a_validation_error() {
        let t: NewMaintenanceTask = serde_json::from_str(
            r#"{"name": "Hull survey", "cadence_type": "interval", "interval_days": 2147483647}"#,
        )
        .unwrap();
        let cadence = t.validate().unwrap();
        assert!(matches!(
            next_due(&cadence, t0()),
            Err(DomainError::Validation(msg)) if msg.contains("interval_days")
        ));

        // Hours stay within range from now but not from the far end of it.
        let hours = TaskCadence::IntervalHours { hours: i32::MAX };
        assert!(next_due(&hours, t0()).is_ok());
        assert!(matches!(
            next_due(&hours, DateTime::<Utc>::MAX_UTC),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn specific_date_is_due_on_its_date() {
        let due = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(next_due(&TaskCadence::SpecificDate { due }, t0()).unwrap(), due);
    }

    #[test]
    fn cadence_requires_its_companion_field() {
        let t: NewMaintenanceTask =
            serde_json::from_str(r#"{"name": "Oil change", "cadence_type": "interval"}"#).unwrap();
        assert!(matches!(t.validate(), Err(DomainError::Validation(_))));

        let t: NewMaintenanceTask = serde_json::from_str(
            r#"{"name": "Oil change", "cadence_type": "interval_hours", "interval_hours": 0}"#,
        )
        .unwrap();
        assert!(t.validate().is_err());

        let t: NewMaintenanceTask = serde_json::from_str(
            r#"{"name": "Survey", "cadence_type": "specific_date", "due_date": "2026-06-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(t.validate(), Ok(TaskCadence::SpecificDate { .. })));
        assert!(t.is_active);
    }

    #[test]
    fn unknown_cadence_is_rejected_at_parse() {
        assert!(serde_json::from_str::<NewMaintenanceTask>(
            r#"{"name": "x", "cadence_type": "weekly"}"#
        )
        .is_err());
    }
}
