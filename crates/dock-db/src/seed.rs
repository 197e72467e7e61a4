use sqlx::PgConnection;

use crate::orgs::{create_org, find_org_by_name, set_billing_override, BillingOverride};
use crate::users::{add_membership, upsert_user, Identity, Role};
use crate::DomainResult;

pub const SEED_ORG_NAME: &str = "Test Organization";

/// Identity used by the seed and by the daemon's development auth bypass.
pub fn dev_identity() -> Identity {
    Identity {
        provider: "clerk".to_string(),
        subject: "dev_user_1".to_string(),
        email: Some("dev@example.com".to_string()),
        name: Some("Dev User".to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub org_id: i64,
    pub user_id: i64,
    pub created_org: bool,
}

/// Idempotent development seed: one organization with an unlimited billing
/// override, the dev user, and an ADMIN membership joining them.
pub async fn seed_dev(conn: &mut PgConnection) -> DomainResult<SeedReport> {
    let (org, created_org) = match find_org_by_name(conn, SEED_ORG_NAME).await? {
        Some(org) => (org, false),
        None => (create_org(conn, SEED_ORG_NAME).await?, true),
    };

    if !org.billing_override_enabled {
        set_billing_override(
            conn,
            org.id,
            &BillingOverride {
                vessel_limit: None,
                expires_at: None,
                reason: Some("development seed".to_string()),
            },
        )
        .await?;
    }

    let user = upsert_user(conn, &dev_identity()).await?;
    add_membership(conn, org.id, user.id, Role::Admin).await?;

    tracing::info!(org_id = org.id, user_id = user.id, created_org, "dev seed applied");
    Ok(SeedReport {
        org_id: org.id,
        user_id: user.id,
        created_org,
    })
}
