//! Postgres persistence for DockOps.
//!
//! Repository functions take `&mut PgConnection` so callers decide the
//! transaction boundary: pass a pooled connection for reads and a
//! `Transaction` (deref'd) for anything that mutates. Every tenant-owned read
//! is filtered by `org_id`; rows of another organization surface as
//! [`DomainError::NotFound`].

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod error;
pub mod patch;

pub mod billing;
pub mod checks;
pub mod groups;
pub mod imports;
pub mod maintenance;
pub mod orgs;
pub mod requirements;
pub mod seed;
pub mod users;
pub mod vessels;

pub use error::{DomainError, DomainResult};

pub const ENV_DB_URL: &str = "DOCK_DATABASE_URL";

/// Connect to Postgres using DOCK_DATABASE_URL.
pub async fn connect_from_env(max_connections: u32) -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, max_connections).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_schema: bool,
    pub organizations: i64,
    pub vessels: i64,
}

/// Connectivity plus schema presence. Counts are zero before migration.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (has_schema,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'vessels'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    let (organizations, vessels) = if has_schema {
        sqlx::query_as::<_, (i64, i64)>(
            "select (select count(*) from organizations), (select count(*) from vessels)",
        )
        .fetch_one(pool)
        .await
        .context("status count query failed")?
    } else {
        (0, 0)
    };

    Ok(DbStatus {
        ok: one == 1,
        has_schema,
        organizations,
        vessels,
    })
}

/// Detect a Postgres unique constraint violation by name.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Detect a Postgres foreign key violation (any constraint).
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}
