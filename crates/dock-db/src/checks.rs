//! Inventory checks and their lines.
//!
//! Line replacement is the transactional shell around the pure reconciler in
//! `dock-reconcile`: lock and load the check, validate, load the stored lines,
//! plan, then apply the plan. Callers pass a transaction so a failed step
//! leaves every line untouched.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use dock_reconcile::{
    check_requirement_scope, ensure_lines_mutable, reconcile, submitted_requirement_ids,
    validate_submission, CheckStatus, ExistingLine, LineCondition, LineInput, ReconcilePlan,
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::vessels::fetch_vessel;
use crate::{is_unique_violation, DomainError, DomainResult};

#[derive(Debug, Clone, Serialize)]
pub struct InventoryCheck {
    pub id: i64,
    pub vessel_id: i64,
    pub performed_by_user_id: i64,
    pub performed_at: DateTime<Utc>,
    pub status: CheckStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckLine {
    pub id: i64,
    pub inventory_check_id: i64,
    pub requirement_id: i64,
    pub actual_quantity: i64,
    pub condition: LineCondition,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckWithLines {
    #[serde(flatten)]
    pub check: InventoryCheck,
    pub lines: Vec<CheckLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCheck {
    #[serde(default)]
    pub notes: Option<String>,
}

/// Row writes issued by one line replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineWrites {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl LineWrites {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

const CHECK_COLUMNS: &str = r#"
    c.id, c.vessel_id, c.performed_by_user_id, c.performed_at, c.status, c.notes,
    c.created_at, c.updated_at
"#;

const RETURNING_CHECK_COLUMNS: &str = r#"
    id, vessel_id, performed_by_user_id, performed_at, status, notes, created_at, updated_at
"#;

const LINE_COLUMNS: &str =
    "id, inventory_check_id, requirement_id, actual_quantity, condition, notes";

fn check_from_row(row: &PgRow) -> DomainResult<InventoryCheck> {
    let status: String = row.try_get("status")?;
    Ok(InventoryCheck {
        id: row.try_get("id")?,
        vessel_id: row.try_get("vessel_id")?,
        performed_by_user_id: row.try_get("performed_by_user_id")?,
        performed_at: row.try_get("performed_at")?,
        status: CheckStatus::parse(&status)?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn line_from_row(row: &PgRow) -> DomainResult<CheckLine> {
    let condition: String = row.try_get("condition")?;
    Ok(CheckLine {
        id: row.try_get("id")?,
        inventory_check_id: row.try_get("inventory_check_id")?,
        requirement_id: row.try_get("requirement_id")?,
        actual_quantity: row.try_get("actual_quantity")?,
        condition: LineCondition::parse(&condition)?,
        notes: row.try_get("notes")?,
    })
}

pub async fn create_check(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
    performed_by_user_id: i64,
    new: &NewCheck,
) -> DomainResult<InventoryCheck> {
    let vessel = fetch_vessel(conn, org_id, vessel_id).await?;
    let row = sqlx::query(&format!(
        r#"
        insert into inventory_checks (vessel_id, performed_by_user_id, status, notes)
        values ($1, $2, $3, $4)
        returning {RETURNING_CHECK_COLUMNS}
        "#
    ))
    .bind(vessel.id)
    .bind(performed_by_user_id)
    .bind(CheckStatus::InProgress.as_str())
    .bind(&new.notes)
    .fetch_one(&mut *conn)
    .await?;
    let check = check_from_row(&row)?;
    tracing::info!(org_id, vessel_id, check_id = check.id, "inventory check started");
    Ok(check)
}

/// Checks of one vessel, newest first.
pub async fn list_checks(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
) -> DomainResult<Vec<InventoryCheck>> {
    fetch_vessel(conn, org_id, vessel_id).await?;
    let rows = sqlx::query(&format!(
        r#"
        select {CHECK_COLUMNS}
        from inventory_checks c
        where c.vessel_id = $1
        order by c.performed_at desc, c.id desc
        "#
    ))
    .bind(vessel_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(check_from_row).collect()
}

async fn load_check(
    conn: &mut PgConnection,
    org_id: i64,
    check_id: i64,
    for_update: bool,
) -> DomainResult<InventoryCheck> {
    let lock = if for_update { "for update of c" } else { "" };
    let row = sqlx::query(&format!(
        r#"
        select {CHECK_COLUMNS}
        from inventory_checks c
        join vessels v on v.id = c.vessel_id
        where c.id = $1 and v.org_id = $2
        {lock}
        "#
    ))
    .bind(check_id)
    .bind(org_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Check"))?;
    check_from_row(&row)
}

/// Lines ordered by line id.
pub async fn fetch_lines(conn: &mut PgConnection, check_id: i64) -> DomainResult<Vec<CheckLine>> {
    let rows = sqlx::query(&format!(
        "select {LINE_COLUMNS} from inventory_check_lines where inventory_check_id = $1 order by id"
    ))
    .bind(check_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(line_from_row).collect()
}

pub async fn get_check(
    conn: &mut PgConnection,
    org_id: i64,
    check_id: i64,
) -> DomainResult<CheckWithLines> {
    let check = load_check(conn, org_id, check_id, false).await?;
    let lines = fetch_lines(conn, check.id).await?;
    Ok(CheckWithLines { check, lines })
}

/// Which of `ids` are requirements of `vessel_id`.
async fn requirements_on_vessel(
    conn: &mut PgConnection,
    vessel_id: i64,
    ids: &BTreeSet<i64>,
) -> DomainResult<BTreeSet<i64>> {
    if ids.is_empty() {
        return Ok(BTreeSet::new());
    }
    let ids: Vec<i64> = ids.iter().copied().collect();
    let rows: Vec<(i64,)> = sqlx::query_as(
        "select id from vessel_inventory_requirements where vessel_id = $1 and id = any($2)",
    )
    .bind(vessel_id)
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

async fn existing_lines(conn: &mut PgConnection, check_id: i64) -> DomainResult<Vec<ExistingLine>> {
    Ok(fetch_lines(conn, check_id)
        .await?
        .into_iter()
        .map(|l| ExistingLine {
            line_id: l.id,
            requirement_id: l.requirement_id,
            actual_quantity: l.actual_quantity,
            condition: l.condition,
            notes: l.notes,
        })
        .collect())
}

async fn apply_plan(conn: &mut PgConnection, plan: &ReconcilePlan) -> DomainResult<LineWrites> {
    let mut writes = LineWrites::default();

    // Deletes first so a pruned key can never collide with an insert.
    if !plan.to_delete.is_empty() {
        writes.deleted = sqlx::query(
            "delete from inventory_check_lines where inventory_check_id = $1 and id = any($2)",
        )
        .bind(plan.check_id)
        .bind(&plan.to_delete)
        .execute(&mut *conn)
        .await?
        .rows_affected() as usize;
    }

    for u in plan.changed_updates() {
        sqlx::query(
            r#"
            update inventory_check_lines
            set actual_quantity = $2, condition = $3, notes = $4, updated_at = now()
            where id = $1
            "#,
        )
        .bind(u.line_id)
        .bind(u.actual_quantity)
        .bind(u.condition.as_str())
        .bind(&u.notes)
        .execute(&mut *conn)
        .await?;
        writes.updated += 1;
    }

    for line in &plan.to_insert {
        sqlx::query(
            r#"
            insert into inventory_check_lines
                (inventory_check_id, requirement_id, actual_quantity, condition, notes)
            values ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(plan.check_id)
        .bind(line.requirement_id)
        .bind(line.actual_quantity)
        .bind(line.condition.as_str())
        .bind(&line.notes)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "uq_check_lines_check_req") {
                DomainError::invalid_state(format!(
                    "line for requirement {} was written concurrently",
                    line.requirement_id
                ))
            } else {
                DomainError::Db(e)
            }
        })?;
        writes.inserted += 1;
    }

    Ok(writes)
}

/// Replace the full line set of an in-progress check.
///
/// Must run inside a transaction. The check row is locked `for update`, so
/// concurrent replacements and a concurrent submit serialize on it.
pub async fn replace_lines(
    conn: &mut PgConnection,
    org_id: i64,
    check_id: i64,
    submitted: &[LineInput],
) -> DomainResult<(CheckWithLines, LineWrites)> {
    let check = load_check(conn, org_id, check_id, true).await?;
    ensure_lines_mutable(check.id, check.status)?;
    validate_submission(submitted)?;

    let wanted = submitted_requirement_ids(submitted);
    let found = requirements_on_vessel(conn, check.vessel_id, &wanted).await?;
    check_requirement_scope(&wanted, &found)?;

    let existing = existing_lines(conn, check.id).await?;
    let plan = reconcile(check.id, &existing, submitted)?;
    let writes = if plan.is_noop() {
        LineWrites::default()
    } else {
        apply_plan(conn, &plan).await?
    };

    tracing::info!(
        org_id,
        check_id = check.id,
        inserted = writes.inserted,
        updated = writes.updated,
        deleted = writes.deleted,
        "check lines reconciled"
    );

    let lines = fetch_lines(conn, check.id).await?;
    Ok((CheckWithLines { check, lines }, writes))
}

/// `in_progress -> submitted`. Submitting twice is an invalid state.
pub async fn submit_check(
    conn: &mut PgConnection,
    org_id: i64,
    check_id: i64,
) -> DomainResult<InventoryCheck> {
    let check = load_check(conn, org_id, check_id, true).await?;
    if check.status == CheckStatus::Submitted {
        return Err(DomainError::invalid_state("Check is already submitted"));
    }
    let row = sqlx::query(&format!(
        r#"
        update inventory_checks
        set status = $2, updated_at = now()
        where id = $1
        returning {RETURNING_CHECK_COLUMNS}
        "#
    ))
    .bind(check.id)
    .bind(CheckStatus::Submitted.as_str())
    .fetch_one(&mut *conn)
    .await?;
    let check = check_from_row(&row)?;
    tracing::info!(org_id, check_id = check.id, "inventory check submitted");
    Ok(check)
}
