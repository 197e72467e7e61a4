use chrono::{DateTime, Utc};
use dock_entitlement::{check_vessel_capacity, resolve};
use dock_import::VesselRow;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::patch::{merge, nullable};
use crate::{orgs, DomainError, DomainResult};

pub const NAME_MAX: usize = 255;
pub const YEAR_MIN: i32 = 1900;
pub const YEAR_MAX: i32 = 2100;

#[derive(Debug, Clone, Serialize)]
pub struct Vessel {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const VESSEL_COLUMNS: &str =
    "id, org_id, name, make, model, year, description, location, created_at, updated_at";

fn vessel_from_row(row: &PgRow) -> Result<Vessel, sqlx::Error> {
    Ok(Vessel {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        name: row.try_get("name")?,
        make: row.try_get("make")?,
        model: row.try_get("model")?,
        year: row.try_get("year")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewVessel {
    pub name: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

fn validate_name(name: &str) -> DomainResult<()> {
    let n = name.trim().chars().count();
    if n == 0 || n > NAME_MAX {
        return Err(DomainError::validation(format!(
            "name must be 1..={NAME_MAX} characters"
        )));
    }
    Ok(())
}

fn validate_year(year: Option<i32>) -> DomainResult<()> {
    match year {
        Some(y) if !(YEAR_MIN..=YEAR_MAX).contains(&y) => Err(DomainError::validation(format!(
            "year must be between {YEAR_MIN} and {YEAR_MAX}"
        ))),
        _ => Ok(()),
    }
}

impl NewVessel {
    pub fn validate(&self) -> DomainResult<()> {
        validate_name(&self.name)?;
        validate_year(self.year)
    }
}

impl From<VesselRow> for NewVessel {
    fn from(r: VesselRow) -> Self {
        NewVessel {
            name: r.name,
            make: r.make,
            model: r.model,
            year: r.year,
            description: r.description,
            location: r.location,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VesselPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub make: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub model: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub year: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
}

impl VesselPatch {
    pub fn apply(&self, v: &Vessel) -> DomainResult<NewVessel> {
        let next = NewVessel {
            name: self.name.clone().unwrap_or_else(|| v.name.clone()),
            make: merge(&v.make, &self.make),
            model: merge(&v.model, &self.model),
            year: merge(&v.year, &self.year),
            description: merge(&v.description, &self.description),
            location: merge(&v.location, &self.location),
        };
        next.validate()?;
        Ok(next)
    }
}

pub async fn list_vessels(conn: &mut PgConnection, org_id: i64) -> DomainResult<Vec<Vessel>> {
    let rows = sqlx::query(&format!(
        "select {VESSEL_COLUMNS} from vessels where org_id = $1 order by id"
    ))
    .bind(org_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(vessel_from_row).collect::<Result<_, _>>()?)
}

pub async fn fetch_vessel(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
) -> DomainResult<Vessel> {
    let row = sqlx::query(&format!(
        "select {VESSEL_COLUMNS} from vessels where id = $1 and org_id = $2"
    ))
    .bind(vessel_id)
    .bind(org_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Vessel"))?;
    Ok(vessel_from_row(&row)?)
}

pub async fn count_vessels(conn: &mut PgConnection, org_id: i64) -> DomainResult<i64> {
    let (n,): (i64,) = sqlx::query_as("select count(*) from vessels where org_id = $1")
        .bind(org_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(n)
}

/// Lock the organization and check that one more vessel fits its entitlement.
/// Must run inside the transaction that performs the insert.
pub async fn ensure_vessel_capacity(
    conn: &mut PgConnection,
    org_id: i64,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    orgs::lock_org(conn, org_id).await?;
    let org = orgs::fetch_org(conn, org_id).await?;
    let entitlement = resolve(&org.billing(), now);
    let current = if entitlement.is_active && entitlement.vessel_limit.is_some() {
        count_vessels(conn, org_id).await?
    } else {
        0
    };
    check_vessel_capacity(&entitlement, current)?;
    Ok(())
}

/// Insert without the entitlement gate. Callers run [`ensure_vessel_capacity`]
/// first in the same transaction.
pub(crate) async fn insert_vessel(
    conn: &mut PgConnection,
    org_id: i64,
    v: &NewVessel,
) -> DomainResult<Vessel> {
    v.validate()?;
    let row = sqlx::query(&format!(
        r#"
        insert into vessels (org_id, name, make, model, year, description, location)
        values ($1, $2, $3, $4, $5, $6, $7)
        returning {VESSEL_COLUMNS}
        "#
    ))
    .bind(org_id)
    .bind(v.name.trim())
    .bind(&v.make)
    .bind(&v.model)
    .bind(v.year)
    .bind(&v.description)
    .bind(&v.location)
    .fetch_one(&mut *conn)
    .await?;
    Ok(vessel_from_row(&row)?)
}

/// Create a vessel under the entitlement gate. Must run inside a transaction:
/// the organization lock held until commit is what makes count-then-insert safe
/// against concurrent creators.
pub async fn create_vessel(
    conn: &mut PgConnection,
    org_id: i64,
    v: &NewVessel,
    now: DateTime<Utc>,
) -> DomainResult<Vessel> {
    v.validate()?;
    ensure_vessel_capacity(conn, org_id, now).await?;
    let vessel = insert_vessel(conn, org_id, v).await?;
    tracing::info!(org_id, vessel_id = vessel.id, "vessel created");
    Ok(vessel)
}

pub async fn update_vessel(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
    patch: &VesselPatch,
) -> DomainResult<Vessel> {
    let current = fetch_vessel(conn, org_id, vessel_id).await?;
    let next = patch.apply(&current)?;
    let row = sqlx::query(&format!(
        r#"
        update vessels
        set name = $3, make = $4, model = $5, year = $6, description = $7, location = $8,
            updated_at = now()
        where id = $1 and org_id = $2
        returning {VESSEL_COLUMNS}
        "#
    ))
    .bind(vessel_id)
    .bind(org_id)
    .bind(next.name.trim())
    .bind(&next.make)
    .bind(&next.model)
    .bind(next.year)
    .bind(&next.description)
    .bind(&next.location)
    .fetch_one(&mut *conn)
    .await?;
    Ok(vessel_from_row(&row)?)
}

/// Delete a vessel and everything hanging off it (requirements, groups,
/// checks, maintenance tasks).
pub async fn delete_vessel(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
) -> DomainResult<()> {
    let res = sqlx::query("delete from vessels where id = $1 and org_id = $2")
        .bind(vessel_id)
        .bind(org_id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(DomainError::NotFound("Vessel"));
    }
    tracing::info!(org_id, vessel_id, "vessel deleted");
    Ok(())
}
