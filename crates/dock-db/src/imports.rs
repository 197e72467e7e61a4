//! Row-by-row bulk import with partial success.
//!
//! Each importer runs inside the caller's transaction and gives every row its
//! own savepoint: a row that fails to parse or insert is reported and rolled
//! back alone, the rest commit with the outer transaction.

use chrono::{DateTime, Utc};
use dock_entitlement::{check_vessel_capacity, resolve, EntitlementDenied};
use dock_import::{
    parse_maintenance_task_row, parse_requirement_row, parse_vessel_row, ImportReport, Table,
    REQUIREMENT_REQUIRED_COLUMNS, TASK_REQUIRED_COLUMNS, VESSEL_REQUIRED_COLUMNS,
};
use serde::Serialize;
use sqlx::{Connection, PgConnection, Postgres, Transaction};

use crate::maintenance::{create_task, NewMaintenanceTask};
use crate::requirements::{create_requirement, NewRequirement};
use crate::vessels::{ensure_vessel_capacity, fetch_vessel, insert_vessel, NewVessel};
use crate::{orgs, DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedVessel {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedRequirement {
    pub id: i64,
    pub item_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedTask {
    pub id: i64,
    pub name: String,
}

/// Which failures stay local to one row. Infrastructure failures abort the
/// whole import.
fn row_error_message(err: &DomainError) -> Option<String> {
    match err {
        DomainError::Validation(m)
        | DomainError::InvalidState(m)
        | DomainError::PaymentRequired(m) => Some(m.clone()),
        DomainError::Db(sqlx::Error::Database(db)) => Some(db.message().to_string()),
        _ => None,
    }
}

/// Close a row's savepoint: commit and record the created item, or roll back
/// and record the row error.
async fn settle<T, U>(
    sp: Transaction<'_, Postgres>,
    outcome: DomainResult<T>,
    report: &mut ImportReport<U>,
    row: usize,
    created: impl FnOnce(T) -> U,
) -> DomainResult<()> {
    match outcome {
        Ok(item) => {
            sp.commit().await?;
            report.push_created(created(item));
            Ok(())
        }
        Err(e) => {
            sp.rollback().await?;
            let msg = row_error_message(&e).ok_or(e)?;
            report.push_error(row, msg);
            Ok(())
        }
    }
}

/// Import vessels into `org_id`.
///
/// Entitlement is checked up front: an inactive organization gets the whole
/// upload refused. Under a limit, rows past it are reported as row errors.
pub async fn import_vessels(
    conn: &mut PgConnection,
    org_id: i64,
    table: &Table,
    now: DateTime<Utc>,
) -> DomainResult<ImportReport<CreatedVessel>> {
    table.require_columns(VESSEL_REQUIRED_COLUMNS)?;

    orgs::lock_org(conn, org_id).await?;
    let org = orgs::fetch_org(conn, org_id).await?;
    check_vessel_capacity(&resolve(&org.billing(), now), 0).or_else(|e| match e {
        EntitlementDenied::Inactive => Err(e),
        EntitlementDenied::LimitReached { .. } => Ok(()),
    })?;

    let mut report = ImportReport::new();
    for row in &table.rows {
        let parsed = match parse_vessel_row(row) {
            Ok(p) => p,
            Err(e) => {
                report.push_error(e.row, e.error);
                continue;
            }
        };
        let new = NewVessel::from(parsed);
        let mut sp = conn.begin().await?;
        let outcome = match ensure_vessel_capacity(&mut sp, org_id, now).await {
            Ok(()) => insert_vessel(&mut sp, org_id, &new).await,
            Err(e) => Err(e),
        };
        settle(sp, outcome, &mut report, row.number, |v| CreatedVessel {
            id: v.id,
            name: v.name,
        })
        .await?;
    }

    tracing::info!(
        org_id,
        created = report.created_count,
        errors = report.error_count,
        "vessel import finished"
    );
    Ok(report)
}

pub async fn import_requirements(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
    table: &Table,
) -> DomainResult<ImportReport<CreatedRequirement>> {
    let vessel = fetch_vessel(conn, org_id, vessel_id).await?;
    table.require_columns(REQUIREMENT_REQUIRED_COLUMNS)?;

    let mut report = ImportReport::new();
    for row in &table.rows {
        let new = match parse_requirement_row(row) {
            Ok(p) => NewRequirement::from(p),
            Err(e) => {
                report.push_error(e.row, e.error);
                continue;
            }
        };
        let mut sp = conn.begin().await?;
        let outcome = create_requirement(&mut sp, org_id, vessel.id, &new).await;
        settle(sp, outcome, &mut report, row.number, |r| CreatedRequirement {
            id: r.id,
            item_name: r.item_name,
        })
        .await?;
    }

    tracing::info!(
        org_id,
        vessel_id,
        created = report.created_count,
        errors = report.error_count,
        "requirement import finished"
    );
    Ok(report)
}

pub async fn import_tasks(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
    table: &Table,
    now: DateTime<Utc>,
) -> DomainResult<ImportReport<CreatedTask>> {
    let vessel = fetch_vessel(conn, org_id, vessel_id).await?;
    table.require_columns(TASK_REQUIRED_COLUMNS)?;

    let mut report = ImportReport::new();
    for row in &table.rows {
        let new = match parse_maintenance_task_row(row) {
            Ok(p) => NewMaintenanceTask::from(p),
            Err(e) => {
                report.push_error(e.row, e.error);
                continue;
            }
        };
        let mut sp = conn.begin().await?;
        let outcome = create_task(&mut sp, org_id, vessel.id, &new, now).await;
        settle(sp, outcome, &mut report, row.number, |t| CreatedTask {
            id: t.id,
            name: t.name,
        })
        .await?;
    }

    tracing::info!(
        org_id,
        vessel_id,
        created = report.created_count,
        errors = report.error_count,
        "maintenance task import finished"
    );
    Ok(report)
}
