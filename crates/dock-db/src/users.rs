//! Users, identities and organization memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::{DomainError, DomainResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Tech,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Tech => "TECH",
        }
    }

    /// Case-insensitive; older rows may hold lower-case values.
    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            "TECH" => Ok(Role::Tech),
            other => Err(DomainError::validation(format!("invalid role: {other}"))),
        }
    }

    /// Vessels, requirements, groups and maintenance tasks.
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Active,
    Disabled,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Disabled => "DISABLED",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(MembershipStatus::Active),
            "DISABLED" => Ok(MembershipStatus::Disabled),
            other => Err(DomainError::validation(format!(
                "invalid membership status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub auth_provider: String,
    pub auth_subject: String,
    pub is_super_admin: bool,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str =
    "id, email, name, auth_provider, auth_subject, is_super_admin, created_at";

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        auth_provider: row.try_get("auth_provider")?,
        auth_subject: row.try_get("auth_subject")?,
        is_super_admin: row.try_get("is_super_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

/// A verified identity from the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub provider: String,
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Identity {
    /// Tokens without an email claim still need a stable address.
    pub fn email_or_placeholder(&self) -> String {
        match self.email.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() => e.to_string(),
            _ => format!("user_{}@{}.local", self.subject, self.provider),
        }
    }
}

/// Get-or-create by `(provider, subject)`, refreshing email and name when the
/// provider reports new values. A missing name never clears a stored one.
pub async fn upsert_user(conn: &mut PgConnection, identity: &Identity) -> DomainResult<User> {
    if identity.subject.trim().is_empty() {
        return Err(DomainError::validation("identity subject is empty"));
    }
    let row = sqlx::query(&format!(
        r#"
        insert into users (email, name, auth_provider, auth_subject)
        values ($1, $2, $3, $4)
        on conflict (auth_provider, auth_subject) do update
          set email = excluded.email,
              name = coalesce(excluded.name, users.name)
        returning {USER_COLUMNS}
        "#
    ))
    .bind(identity.email_or_placeholder())
    .bind(&identity.name)
    .bind(&identity.provider)
    .bind(&identity.subject)
    .fetch_one(&mut *conn)
    .await?;
    Ok(user_from_row(&row)?)
}

pub async fn fetch_user(conn: &mut PgConnection, user_id: i64) -> DomainResult<User> {
    let row = sqlx::query(&format!("select {USER_COLUMNS} from users where id = $1"))
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(DomainError::NotFound("User"))?;
    Ok(user_from_row(&row)?)
}

pub async fn set_super_admin(
    conn: &mut PgConnection,
    email: &str,
    is_super_admin: bool,
) -> DomainResult<User> {
    let row = sqlx::query(&format!(
        r#"
        update users set is_super_admin = $2
        where id = (select id from users where lower(email) = lower($1) order by id limit 1)
        returning {USER_COLUMNS}
        "#
    ))
    .bind(email.trim())
    .bind(is_super_admin)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("User"))?;
    Ok(user_from_row(&row)?)
}

/// A membership joined with its organization, as seen by the member.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipView {
    pub org_id: i64,
    pub org_name: String,
    pub org_is_active: bool,
    pub role: Role,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

fn membership_view_from_row(row: &PgRow) -> DomainResult<MembershipView> {
    Ok(MembershipView {
        org_id: row.try_get("org_id")?,
        org_name: row.try_get("org_name")?,
        org_is_active: row.try_get("org_is_active")?,
        role: Role::parse(&row.try_get::<String, _>("role")?)?,
        status: MembershipStatus::parse(&row.try_get::<String, _>("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

/// All memberships of a user, oldest first.
pub async fn list_memberships_for_user(
    conn: &mut PgConnection,
    user_id: i64,
) -> DomainResult<Vec<MembershipView>> {
    let rows = sqlx::query(
        r#"
        select m.org_id, o.name as org_name, o.is_active as org_is_active,
               m.role, m.status, m.created_at
        from org_memberships m
        join organizations o on o.id = m.org_id
        where m.user_id = $1
        order by m.created_at asc, m.id asc
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(membership_view_from_row).collect()
}

/// Pick the tenant for a request: the requested organization if the user has
/// an active membership there, otherwise the oldest active membership.
///
/// Organization activity is not checked here; callers decide how to treat an
/// inactive organization.
pub async fn resolve_membership(
    conn: &mut PgConnection,
    user_id: i64,
    requested_org: Option<i64>,
) -> DomainResult<Option<MembershipView>> {
    let memberships = list_memberships_for_user(conn, user_id).await?;
    let mut active = memberships
        .into_iter()
        .filter(|m| m.status == MembershipStatus::Active);
    Ok(match requested_org {
        Some(org_id) => active.find(|m| m.org_id == org_id),
        None => active.next(),
    })
}

pub async fn add_membership(
    conn: &mut PgConnection,
    org_id: i64,
    user_id: i64,
    role: Role,
) -> DomainResult<()> {
    sqlx::query(
        r#"
        insert into org_memberships (org_id, user_id, role)
        values ($1, $2, $3)
        on conflict (org_id, user_id) do nothing
        "#,
    )
    .bind(org_id)
    .bind(user_id)
    .bind(role.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if crate::is_foreign_key_violation(&e) {
            DomainError::NotFound("Organization or user")
        } else {
            DomainError::Db(e)
        }
    })?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub user_id: i64,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn member_from_row(row: &PgRow) -> DomainResult<Member> {
    Ok(Member {
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: Role::parse(&row.try_get::<String, _>("role")?)?,
        status: MembershipStatus::parse(&row.try_get::<String, _>("status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const MEMBER_SELECT: &str = r#"
    select m.user_id, u.email, u.name, m.role, m.status, m.created_at, m.updated_at
    from org_memberships m
    join users u on u.id = m.user_id
"#;

pub async fn list_members(conn: &mut PgConnection, org_id: i64) -> DomainResult<Vec<Member>> {
    let rows = sqlx::query(&format!(
        "{MEMBER_SELECT} where m.org_id = $1 order by m.created_at asc, m.id asc"
    ))
    .bind(org_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(member_from_row).collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberPatch {
    pub role: Option<Role>,
    pub status: Option<MembershipStatus>,
}

/// Change a member's role or status. The last active admin of an
/// organization can be neither demoted nor disabled.
pub async fn update_member(
    conn: &mut PgConnection,
    org_id: i64,
    user_id: i64,
    patch: &MemberPatch,
) -> DomainResult<Member> {
    let row = sqlx::query(&format!(
        "{MEMBER_SELECT} where m.org_id = $1 and m.user_id = $2 for update of m"
    ))
    .bind(org_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::NotFound("Member"))?;
    let current = member_from_row(&row)?;

    let role = patch.role.unwrap_or(current.role);
    let status = patch.status.unwrap_or(current.status);

    let loses_admin = current.role.is_admin()
        && current.status == MembershipStatus::Active
        && (!role.is_admin() || status != MembershipStatus::Active);
    if loses_admin {
        let (admins,): (i64,) = sqlx::query_as(
            r#"
            select count(*) from org_memberships
            where org_id = $1 and role = 'ADMIN' and status = 'ACTIVE'
            "#,
        )
        .bind(org_id)
        .fetch_one(&mut *conn)
        .await?;
        if admins <= 1 {
            return Err(DomainError::invalid_state(
                "organization must keep at least one active ADMIN",
            ));
        }
    }

    sqlx::query(
        r#"
        update org_memberships
        set role = $3, status = $4, updated_at = now()
        where org_id = $1 and user_id = $2
        "#,
    )
    .bind(org_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(status.as_str())
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(&format!(
        "{MEMBER_SELECT} where m.org_id = $1 and m.user_id = $2"
    ))
    .bind(org_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    member_from_row(&row)
}
