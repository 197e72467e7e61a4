use chrono::{DateTime, Utc};
use dock_entitlement::OrgBilling;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::{DomainError, DomainResult};

#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_plan: Option<String>,
    pub vessel_limit: Option<i64>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub billing_override_enabled: bool,
    pub billing_override_vessel_limit: Option<i64>,
    pub billing_override_expires_at: Option<DateTime<Utc>>,
    pub billing_override_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn billing(&self) -> OrgBilling {
        OrgBilling {
            billing_override_enabled: self.billing_override_enabled,
            billing_override_expires_at: self.billing_override_expires_at,
            billing_override_vessel_limit: self.billing_override_vessel_limit,
            subscription_status: self.subscription_status.clone(),
            vessel_limit: self.vessel_limit,
        }
    }
}

const ORG_COLUMNS: &str = r#"
    id, name, is_active,
    stripe_customer_id, stripe_subscription_id, subscription_status, subscription_plan,
    vessel_limit, current_period_end,
    billing_override_enabled, billing_override_vessel_limit, billing_override_expires_at,
    billing_override_reason, created_at, updated_at
"#;

fn org_from_row(row: &PgRow) -> Result<Organization, sqlx::Error> {
    Ok(Organization {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
        stripe_customer_id: row.try_get("stripe_customer_id")?,
        stripe_subscription_id: row.try_get("stripe_subscription_id")?,
        subscription_status: row.try_get("subscription_status")?,
        subscription_plan: row.try_get("subscription_plan")?,
        vessel_limit: row.try_get("vessel_limit")?,
        current_period_end: row.try_get("current_period_end")?,
        billing_override_enabled: row.try_get("billing_override_enabled")?,
        billing_override_vessel_limit: row.try_get("billing_override_vessel_limit")?,
        billing_override_expires_at: row.try_get("billing_override_expires_at")?,
        billing_override_reason: row.try_get("billing_override_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn create_org(conn: &mut PgConnection, name: &str) -> DomainResult<Organization> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("organization name is required"));
    }
    let row = sqlx::query(&format!(
        "insert into organizations (name) values ($1) returning {ORG_COLUMNS}"
    ))
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(org_from_row(&row)?)
}

pub async fn fetch_org(conn: &mut PgConnection, org_id: i64) -> DomainResult<Organization> {
    let row = sqlx::query(&format!(
        "select {ORG_COLUMNS} from organizations where id = $1"
    ))
    .bind(org_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Organization"))?;
    Ok(org_from_row(&row)?)
}

pub async fn find_org_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> DomainResult<Option<Organization>> {
    let row = sqlx::query(&format!(
        "select {ORG_COLUMNS} from organizations where name = $1 order by id limit 1"
    ))
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.as_ref().map(org_from_row).transpose()?)
}

/// Serialize capacity-sensitive writes for one organization until the
/// surrounding transaction ends. Must run inside a transaction; in autocommit
/// mode the lock is released immediately.
pub async fn lock_org(conn: &mut PgConnection, org_id: i64) -> DomainResult<()> {
    sqlx::query("select pg_advisory_xact_lock($1)")
        .bind(org_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct BillingOverride {
    /// `None` = unlimited.
    pub vessel_limit: Option<i64>,
    /// `None` = never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

pub async fn set_billing_override(
    conn: &mut PgConnection,
    org_id: i64,
    ov: &BillingOverride,
) -> DomainResult<Organization> {
    if matches!(ov.vessel_limit, Some(n) if n < 0) {
        return Err(DomainError::validation("override vessel_limit must be >= 0"));
    }
    let row = sqlx::query(&format!(
        r#"
        update organizations
        set billing_override_enabled = true,
            billing_override_vessel_limit = $2,
            billing_override_expires_at = $3,
            billing_override_reason = $4,
            updated_at = now()
        where id = $1
        returning {ORG_COLUMNS}
        "#
    ))
    .bind(org_id)
    .bind(ov.vessel_limit)
    .bind(ov.expires_at)
    .bind(&ov.reason)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Organization"))?;
    Ok(org_from_row(&row)?)
}

pub async fn clear_billing_override(
    conn: &mut PgConnection,
    org_id: i64,
) -> DomainResult<Organization> {
    let row = sqlx::query(&format!(
        r#"
        update organizations
        set billing_override_enabled = false,
            billing_override_vessel_limit = null,
            billing_override_expires_at = null,
            billing_override_reason = null,
            updated_at = now()
        where id = $1
        returning {ORG_COLUMNS}
        "#
    ))
    .bind(org_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Organization"))?;
    Ok(org_from_row(&row)?)
}

pub async fn set_stripe_customer(
    conn: &mut PgConnection,
    org_id: i64,
    customer_id: &str,
) -> DomainResult<()> {
    let res = sqlx::query(
        "update organizations set stripe_customer_id = $2, updated_at = now() where id = $1",
    )
    .bind(org_id)
    .bind(customer_id)
    .execute(&mut *conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(DomainError::NotFound("Organization"));
    }
    Ok(())
}

pub async fn set_org_active(
    conn: &mut PgConnection,
    org_id: i64,
    is_active: bool,
) -> DomainResult<()> {
    let res =
        sqlx::query("update organizations set is_active = $2, updated_at = now() where id = $1")
            .bind(org_id)
            .bind(is_active)
            .execute(&mut *conn)
            .await?;
    if res.rows_affected() == 0 {
        return Err(DomainError::NotFound("Organization"));
    }
    Ok(())
}
