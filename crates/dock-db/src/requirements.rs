use chrono::{DateTime, Utc};
use dock_import::RequirementRow;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::patch::{merge, nullable};
use crate::vessels::fetch_vessel;
use crate::{is_foreign_key_violation, DomainError, DomainResult};

pub const ITEM_NAME_MAX: usize = 255;

#[derive(Debug, Clone, Serialize)]
pub struct Requirement {
    pub id: i64,
    pub vessel_id: i64,
    pub parent_group_id: Option<i64>,
    pub item_name: String,
    pub required_quantity: i32,
    pub category: Option<String>,
    pub critical: bool,
    pub notes: Option<String>,
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const REQUIREMENT_COLUMNS: &str = r#"
    r.id, r.vessel_id, r.parent_group_id, r.item_name, r.required_quantity,
    r.category, r.critical, r.notes, r.sort_order, r.created_at, r.updated_at
"#;

const RETURNING_COLUMNS: &str = r#"
    id, vessel_id, parent_group_id, item_name, required_quantity,
    category, critical, notes, sort_order, created_at, updated_at
"#;

fn requirement_from_row(row: &PgRow) -> Result<Requirement, sqlx::Error> {
    Ok(Requirement {
        id: row.try_get("id")?,
        vessel_id: row.try_get("vessel_id")?,
        parent_group_id: row.try_get("parent_group_id")?,
        item_name: row.try_get("item_name")?,
        required_quantity: row.try_get("required_quantity")?,
        category: row.try_get("category")?,
        critical: row.try_get("critical")?,
        notes: row.try_get("notes")?,
        sort_order: row.try_get("sort_order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewRequirement {
    pub item_name: String,
    #[serde(default = "default_quantity")]
    pub required_quantity: i32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub parent_group_id: Option<i64>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

impl NewRequirement {
    pub fn named(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            required_quantity: default_quantity(),
            category: None,
            critical: false,
            notes: None,
            parent_group_id: None,
            sort_order: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        let n = self.item_name.trim().chars().count();
        if n == 0 || n > ITEM_NAME_MAX {
            return Err(DomainError::validation(format!(
                "item_name must be 1..={ITEM_NAME_MAX} characters"
            )));
        }
        if self.required_quantity < 0 {
            return Err(DomainError::validation("required_quantity must be >= 0"));
        }
        Ok(())
    }
}

impl From<RequirementRow> for NewRequirement {
    fn from(r: RequirementRow) -> Self {
        NewRequirement {
            item_name: r.item_name,
            required_quantity: r.required_quantity,
            category: r.category,
            critical: r.critical,
            notes: r.notes,
            parent_group_id: None,
            sort_order: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementPatch {
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub required_quantity: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default)]
    pub critical: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_group_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub sort_order: Option<Option<i32>>,
}

impl RequirementPatch {
    pub fn apply(&self, r: &Requirement) -> DomainResult<NewRequirement> {
        let next = NewRequirement {
            item_name: self.item_name.clone().unwrap_or_else(|| r.item_name.clone()),
            required_quantity: self.required_quantity.unwrap_or(r.required_quantity),
            category: merge(&r.category, &self.category),
            critical: self.critical.unwrap_or(r.critical),
            notes: merge(&r.notes, &self.notes),
            parent_group_id: merge(&r.parent_group_id, &self.parent_group_id),
            sort_order: merge(&r.sort_order, &self.sort_order),
        };
        next.validate()?;
        Ok(next)
    }
}

/// Requirements of one vessel, ordered for display.
pub async fn list_requirements(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
) -> DomainResult<Vec<Requirement>> {
    fetch_vessel(conn, org_id, vessel_id).await?;
    let rows = sqlx::query(&format!(
        r#"
        select {REQUIREMENT_COLUMNS}
        from vessel_inventory_requirements r
        where r.vessel_id = $1
        order by r.sort_order asc nulls last, r.id
        "#
    ))
    .bind(vessel_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows
        .iter()
        .map(requirement_from_row)
        .collect::<Result<_, _>>()?)
}

pub async fn fetch_requirement(
    conn: &mut PgConnection,
    org_id: i64,
    requirement_id: i64,
) -> DomainResult<Requirement> {
    let row = sqlx::query(&format!(
        r#"
        select {REQUIREMENT_COLUMNS}
        from vessel_inventory_requirements r
        join vessels v on v.id = r.vessel_id
        where r.id = $1 and v.org_id = $2
        "#
    ))
    .bind(requirement_id)
    .bind(org_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Requirement"))?;
    Ok(requirement_from_row(&row)?)
}

async fn ensure_group_on_vessel(
    conn: &mut PgConnection,
    vessel_id: i64,
    group_id: Option<i64>,
) -> DomainResult<()> {
    let Some(group_id) = group_id else {
        return Ok(());
    };
    let found: Option<(i64,)> =
        sqlx::query_as("select id from inventory_groups where id = $1 and vessel_id = $2")
            .bind(group_id)
            .bind(vessel_id)
            .fetch_optional(&mut *conn)
            .await?;
    if found.is_none() {
        return Err(DomainError::validation(format!(
            "group {group_id} does not belong to this vessel"
        )));
    }
    Ok(())
}

/// Next free position among siblings sharing `(vessel_id, parent_group_id)`.
async fn next_sort_order(
    conn: &mut PgConnection,
    vessel_id: i64,
    group_id: Option<i64>,
) -> DomainResult<i32> {
    let (max,): (Option<i32>,) = sqlx::query_as(
        r#"
        select max(sort_order)
        from vessel_inventory_requirements
        where vessel_id = $1 and parent_group_id is not distinct from $2
        "#,
    )
    .bind(vessel_id)
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(max.map_or(0, |m| m + 1))
}

pub async fn create_requirement(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
    req: &NewRequirement,
) -> DomainResult<Requirement> {
    req.validate()?;
    let vessel = fetch_vessel(conn, org_id, vessel_id).await?;
    ensure_group_on_vessel(conn, vessel.id, req.parent_group_id).await?;
    let sort_order = match req.sort_order {
        Some(n) => n,
        None => next_sort_order(conn, vessel.id, req.parent_group_id).await?,
    };

    let row = sqlx::query(&format!(
        r#"
        insert into vessel_inventory_requirements
            (vessel_id, parent_group_id, item_name, required_quantity, category, critical,
             notes, sort_order)
        values ($1, $2, $3, $4, $5, $6, $7, $8)
        returning {RETURNING_COLUMNS}
        "#
    ))
    .bind(vessel.id)
    .bind(req.parent_group_id)
    .bind(req.item_name.trim())
    .bind(req.required_quantity)
    .bind(&req.category)
    .bind(req.critical)
    .bind(&req.notes)
    .bind(sort_order)
    .fetch_one(&mut *conn)
    .await?;
    Ok(requirement_from_row(&row)?)
}

pub async fn update_requirement(
    conn: &mut PgConnection,
    org_id: i64,
    requirement_id: i64,
    patch: &RequirementPatch,
) -> DomainResult<Requirement> {
    let current = fetch_requirement(conn, org_id, requirement_id).await?;
    let next = patch.apply(&current)?;
    if next.parent_group_id != current.parent_group_id {
        ensure_group_on_vessel(conn, current.vessel_id, next.parent_group_id).await?;
    }

    let row = sqlx::query(&format!(
        r#"
        update vessel_inventory_requirements
        set item_name = $2, required_quantity = $3, category = $4, critical = $5,
            notes = $6, parent_group_id = $7, sort_order = $8, updated_at = now()
        where id = $1
        returning {RETURNING_COLUMNS}
        "#
    ))
    .bind(current.id)
    .bind(next.item_name.trim())
    .bind(next.required_quantity)
    .bind(&next.category)
    .bind(next.critical)
    .bind(&next.notes)
    .bind(next.parent_group_id)
    .bind(next.sort_order)
    .fetch_one(&mut *conn)
    .await?;
    Ok(requirement_from_row(&row)?)
}

/// Delete a requirement.
///
/// Lines recorded on submitted checks are history and pin the requirement:
/// deletion is refused with `InvalidState`. Lines on in-progress checks are
/// removed with it. Run inside a transaction.
pub async fn delete_requirement(
    conn: &mut PgConnection,
    org_id: i64,
    requirement_id: i64,
) -> DomainResult<()> {
    let req = fetch_requirement(conn, org_id, requirement_id).await?;

    let (submitted_refs,): (i64,) = sqlx::query_as(
        r#"
        select count(*)
        from inventory_check_lines l
        join inventory_checks c on c.id = l.inventory_check_id
        where l.requirement_id = $1 and c.status = 'submitted'
        "#,
    )
    .bind(req.id)
    .fetch_one(&mut *conn)
    .await?;
    if submitted_refs > 0 {
        return Err(DomainError::invalid_state(format!(
            "requirement {} is recorded on {submitted_refs} submitted check line(s)",
            req.id
        )));
    }

    let pruned = sqlx::query("delete from inventory_check_lines where requirement_id = $1")
        .bind(req.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    sqlx::query("delete from vessel_inventory_requirements where id = $1")
        .bind(req.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DomainError::invalid_state("requirement is still referenced by check lines")
            } else {
                DomainError::Db(e)
            }
        })?;

    tracing::info!(
        org_id,
        requirement_id = req.id,
        pruned_lines = pruned,
        "requirement deleted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement() -> Requirement {
        Requirement {
            id: 7,
            vessel_id: 1,
            parent_group_id: Some(3),
            item_name: "Life jacket".into(),
            required_quantity: 6,
            category: Some("Safety".into()),
            critical: true,
            notes: None,
            sort_order: Some(2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_defaults_quantity_to_one() {
        let r: NewRequirement = serde_json::from_str(r#"{"item_name": "Flare"}"#).unwrap();
        assert_eq!(r.required_quantity, 1);
        assert!(!r.critical);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let r: NewRequirement =
            serde_json::from_str(r#"{"item_name": "Flare", "required_quantity": -1}"#).unwrap();
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn patch_can_ungroup() {
        let patch: RequirementPatch =
            serde_json::from_str(r#"{"parent_group_id": null, "required_quantity": 8}"#).unwrap();
        let next = patch.apply(&requirement()).unwrap();
        assert_eq!(next.parent_group_id, None);
        assert_eq!(next.required_quantity, 8);
        assert_eq!(next.category.as_deref(), Some("Safety"));
        assert_eq!(next.sort_order, Some(2));
    }

    #[test]
    fn unknown_patch_fields_are_rejected() {
        assert!(serde_json::from_str::<RequirementPatch>(r#"{"vessel_id": 2}"#).is_err());
    }
}
