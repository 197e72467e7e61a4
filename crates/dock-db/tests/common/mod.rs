//! Fixtures shared by the DB scenarios. Every scenario builds its own
//! organization so runs against a shared database do not interfere.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chrono::Utc;
use dock_db::orgs::{self, Organization};
use dock_db::requirements::{self, NewRequirement, Requirement};
use dock_db::users::{self, Identity, Role, User};
use dock_db::vessels::{self, NewVessel, Vessel};
use sqlx::PgPool;

static SEQ: AtomicU64 = AtomicU64::new(0);

pub fn unique(prefix: &str) -> String {
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    let ts = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{ts}-{n}")
}

/// `None` when DOCK_DATABASE_URL is unset; the caller skips.
pub async fn pool() -> Result<Option<PgPool>> {
    let url = match std::env::var(dock_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: DOCK_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = dock_db::connect(&url, 4).await?;
    dock_db::migrate(&pool).await?;
    Ok(Some(pool))
}

/// Organization with an unlimited, non-expiring override.
pub async fn org(pool: &PgPool) -> Result<Organization> {
    let mut conn = pool.acquire().await?;
    let org = orgs::create_org(&mut conn, &unique("org")).await?;
    let org = orgs::set_billing_override(
        &mut conn,
        org.id,
        &orgs::BillingOverride {
            vessel_limit: None,
            expires_at: None,
            reason: Some("scenario".into()),
        },
    )
    .await?;
    Ok(org)
}

pub async fn member(pool: &PgPool, org_id: i64, role: Role) -> Result<User> {
    let mut conn = pool.acquire().await?;
    let user = users::upsert_user(
        &mut conn,
        &Identity {
            provider: "clerk".into(),
            subject: unique("sub"),
            email: None,
            name: Some("Scenario User".into()),
        },
    )
    .await?;
    users::add_membership(&mut conn, org_id, user.id, role).await?;
    Ok(user)
}

pub async fn vessel(pool: &PgPool, org_id: i64, name: &str) -> Result<Vessel> {
    let mut tx = pool.begin().await?;
    let v = vessels::create_vessel(
        &mut tx,
        org_id,
        &NewVessel {
            name: name.into(),
            ..NewVessel::default()
        },
        Utc::now(),
    )
    .await?;
    tx.commit().await?;
    Ok(v)
}

pub async fn requirement(
    pool: &PgPool,
    org_id: i64,
    vessel_id: i64,
    item: &str,
) -> Result<Requirement> {
    let mut conn = pool.acquire().await?;
    let req = NewRequirement::named(item);
    Ok(requirements::create_requirement(&mut conn, org_id, vessel_id, &req).await?)
}
