use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::patch::{merge, nullable};
use crate::vessels::fetch_vessel;
use crate::{DomainError, DomainResult};

#[derive(Debug, Clone, Serialize)]
pub struct InventoryGroup {
    pub id: i64,
    pub vessel_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const GROUP_COLUMNS: &str =
    "g.id, g.vessel_id, g.name, g.description, g.sort_order, g.created_at, g.updated_at";

const RETURNING_COLUMNS: &str =
    "id, vessel_id, name, description, sort_order, created_at, updated_at";

fn group_from_row(row: &PgRow) -> Result<InventoryGroup, sqlx::Error> {
    Ok(InventoryGroup {
        id: row.try_get("id")?,
        vessel_id: row.try_get("vessel_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        sort_order: row.try_get("sort_order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn validate_group_name(name: &str) -> DomainResult<()> {
    let n = name.trim().chars().count();
    if n == 0 || n > 255 {
        return Err(DomainError::validation("group name must be 1..=255 characters"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub sort_order: Option<Option<i32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReorderGroups {
    pub group_ids: Vec<i64>,
}

pub async fn list_groups(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
) -> DomainResult<Vec<InventoryGroup>> {
    fetch_vessel(conn, org_id, vessel_id).await?;
    let rows = sqlx::query(&format!(
        r#"
        select {GROUP_COLUMNS}
        from inventory_groups g
        where g.vessel_id = $1
        order by g.sort_order asc nulls last, g.name
        "#
    ))
    .bind(vessel_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.iter().map(group_from_row).collect::<Result<_, _>>()?)
}

pub async fn fetch_group(
    conn: &mut PgConnection,
    org_id: i64,
    group_id: i64,
) -> DomainResult<InventoryGroup> {
    let row = sqlx::query(&format!(
        r#"
        select {GROUP_COLUMNS}
        from inventory_groups g
        join vessels v on v.id = g.vessel_id
        where g.id = $1 and v.org_id = $2
        "#
    ))
    .bind(group_id)
    .bind(org_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Group"))?;
    Ok(group_from_row(&row)?)
}

/// New groups go to the end of the vessel's ordering.
pub async fn create_group(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
    g: &NewGroup,
) -> DomainResult<InventoryGroup> {
    validate_group_name(&g.name)?;
    let vessel = fetch_vessel(conn, org_id, vessel_id).await?;

    let row = sqlx::query(&format!(
        r#"
        insert into inventory_groups (vessel_id, name, description, sort_order)
        select $1, $2, $3, coalesce(max(sort_order), -1) + 1
        from inventory_groups
        where vessel_id = $1
        returning {RETURNING_COLUMNS}
        "#
    ))
    .bind(vessel.id)
    .bind(g.name.trim())
    .bind(&g.description)
    .fetch_one(&mut *conn)
    .await?;
    Ok(group_from_row(&row)?)
}

/// Assign `sort_order = position` to each listed group. Every id must belong
/// to the vessel; an empty list is a no-op.
pub async fn reorder_groups(
    conn: &mut PgConnection,
    org_id: i64,
    vessel_id: i64,
    group_ids: &[i64],
) -> DomainResult<()> {
    let vessel = fetch_vessel(conn, org_id, vessel_id).await?;
    if group_ids.is_empty() {
        return Ok(());
    }

    let requested: BTreeSet<i64> = group_ids.iter().copied().collect();
    if requested.len() != group_ids.len() {
        return Err(DomainError::validation("group_ids must not repeat"));
    }

    let found: Vec<(i64,)> =
        sqlx::query_as("select id from inventory_groups where vessel_id = $1 and id = any($2)")
            .bind(vessel.id)
            .bind(group_ids)
            .fetch_all(&mut *conn)
            .await?;
    let found: BTreeSet<i64> = found.into_iter().map(|(id,)| id).collect();
    if found != requested {
        return Err(DomainError::validation(
            "All group_ids must belong to this vessel",
        ));
    }

    for (position, id) in group_ids.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| DomainError::validation("too many groups to reorder"))?;
        sqlx::query(
            "update inventory_groups set sort_order = $2, updated_at = now() where id = $1",
        )
        .bind(id)
        .bind(position)
        .execute(&mut *conn)
        .await?;
    }
    tracing::info!(org_id, vessel_id, groups = group_ids.len(), "groups reordered");
    Ok(())
}

pub async fn update_group(
    conn: &mut PgConnection,
    org_id: i64,
    group_id: i64,
    patch: &GroupPatch,
) -> DomainResult<InventoryGroup> {
    let current = fetch_group(conn, org_id, group_id).await?;
    let name = patch.name.clone().unwrap_or_else(|| current.name.clone());
    validate_group_name(&name)?;

    let row = sqlx::query(&format!(
        r#"
        update inventory_groups
        set name = $2, description = $3, sort_order = $4, updated_at = now()
        where id = $1
        returning {RETURNING_COLUMNS}
        "#
    ))
    .bind(current.id)
    .bind(name.trim())
    .bind(merge(&current.description, &patch.description))
    .bind(merge(&current.sort_order, &patch.sort_order))
    .fetch_one(&mut *conn)
    .await?;
    Ok(group_from_row(&row)?)
}

/// Delete a group; its requirements become ungrouped.
pub async fn delete_group(conn: &mut PgConnection, org_id: i64, group_id: i64) -> DomainResult<()> {
    let group = fetch_group(conn, org_id, group_id).await?;
    let ungrouped = sqlx::query(
        r#"
        update vessel_inventory_requirements
        set parent_group_id = null, updated_at = now()
        where parent_group_id = $1
        "#,
    )
    .bind(group.id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    sqlx::query("delete from inventory_groups where id = $1")
        .bind(group.id)
        .execute(&mut *conn)
        .await?;
    tracing::info!(org_id, group_id = group.id, ungrouped, "group deleted");
    Ok(())
}
