use chrono::{DateTime, Utc};
use dock_entitlement::{override_active, resolve, Entitlement};
use serde::Serialize;
use sqlx::PgConnection;

use crate::orgs::{fetch_org, Organization};
use crate::vessels::count_vessels;
use crate::DomainResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VesselUsage {
    pub current: i64,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideStatus {
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Billing report for one organization. `vessel_limit` and `vessel_usage.limit`
/// are the subscription's figures; `entitlement` is what the gate enforces.
#[derive(Debug, Clone, Serialize)]
pub struct BillingStatus {
    pub org_id: i64,
    pub org_name: String,
    pub plan: Option<String>,
    pub status: Option<String>,
    pub vessel_limit: Option<i64>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub vessel_usage: VesselUsage,
    pub billing_override: OverrideStatus,
    pub entitlement: Entitlement,
}

impl BillingStatus {
    pub fn from_org(org: &Organization, vessel_count: i64, now: DateTime<Utc>) -> Self {
        let billing = org.billing();
        BillingStatus {
            org_id: org.id,
            org_name: org.name.clone(),
            plan: org.subscription_plan.clone(),
            status: org.subscription_status.clone(),
            vessel_limit: org.vessel_limit,
            current_period_end: org.current_period_end,
            vessel_usage: VesselUsage {
                current: vessel_count,
                limit: org.vessel_limit,
            },
            billing_override: OverrideStatus {
                active: override_active(&billing, now),
                expires_at: org.billing_override_expires_at,
            },
            entitlement: resolve(&billing, now),
        }
    }
}

pub async fn billing_status(
    conn: &mut PgConnection,
    org_id: i64,
    now: DateTime<Utc>,
) -> DomainResult<BillingStatus> {
    let org = fetch_org(conn, org_id).await?;
    let count = count_vessels(conn, org_id).await?;
    Ok(BillingStatus::from_org(&org, count, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dock_entitlement::EntitlementSource;

    fn org() -> Organization {
        Organization {
            id: 4,
            name: "Harbor Co".into(),
            is_active: true,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            subscription_status: Some("active".into()),
            subscription_plan: Some("standard".into()),
            vessel_limit: Some(5),
            current_period_end: None,
            billing_override_enabled: true,
            billing_override_vessel_limit: Some(50),
            billing_override_expires_at: None,
            billing_override_reason: Some("pilot".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn usage_reports_subscription_limit_while_override_governs() {
        let s = BillingStatus::from_org(&org(), 7, Utc::now());
        assert_eq!(s.vessel_usage, VesselUsage { current: 7, limit: Some(5) });
        assert!(s.billing_override.active);
        assert_eq!(s.entitlement.vessel_limit, Some(50));
        assert_eq!(s.entitlement.source, EntitlementSource::Override);
    }

    #[test]
    fn expired_override_is_reported_inactive() {
        let now = Utc::now();
        let mut o = org();
        o.billing_override_expires_at = Some(now - Duration::days(1));
        let s = BillingStatus::from_org(&o, 1, now);
        assert!(!s.billing_override.active);
        assert_eq!(s.billing_override.expires_at, o.billing_override_expires_at);
        assert_eq!(s.entitlement.vessel_limit, Some(5));
    }
}
