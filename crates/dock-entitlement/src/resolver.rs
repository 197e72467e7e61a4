use chrono::{DateTime, Utc};

use crate::{Entitlement, EntitlementDenied, EntitlementSource, OrgBilling, ENTITLED_SUBSCRIPTION_STATUSES};

/// True when the billing override is enabled and has not expired at `now`.
///
/// Expiry is exclusive: an override expiring exactly at `now` is no longer active.
pub fn override_active(org: &OrgBilling, now: DateTime<Utc>) -> bool {
    org.billing_override_enabled
        && org
            .billing_override_expires_at
            .map_or(true, |expires_at| expires_at > now)
}

/// Resolve the effective entitlement of an organization at `now`.
///
/// An expired override only disables the override branch; the subscription
/// branch is still consulted.
pub fn resolve(org: &OrgBilling, now: DateTime<Utc>) -> Entitlement {
    if override_active(org, now) {
        return Entitlement {
            is_active: true,
            vessel_limit: org.billing_override_vessel_limit,
            source: EntitlementSource::Override,
        };
    }

    let subscribed = org
        .subscription_status
        .as_deref()
        .is_some_and(|s| ENTITLED_SUBSCRIPTION_STATUSES.contains(&s));

    if subscribed {
        return Entitlement {
            is_active: true,
            vessel_limit: org.vessel_limit,
            source: EntitlementSource::Subscription,
        };
    }

    Entitlement::inactive()
}

/// [`resolve`] against the wall clock.
pub fn resolve_now(org: &OrgBilling) -> Entitlement {
    resolve(org, Utc::now())
}

/// Gate for creating one more vessel when the organization already has
/// `current_count` vessels.
pub fn check_vessel_capacity(
    entitlement: &Entitlement,
    current_count: i64,
) -> Result<(), EntitlementDenied> {
    if !entitlement.is_active {
        return Err(EntitlementDenied::Inactive);
    }
    match entitlement.vessel_limit {
        Some(limit) if current_count >= limit => Err(EntitlementDenied::LimitReached {
            limit,
            current: current_count,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn override_expiring_exactly_now_is_inactive() {
        let org = OrgBilling::with_override(Some(2), Some(t0()));
        assert!(!override_active(&org, t0()));
        assert!(override_active(&org, t0() - Duration::seconds(1)));
    }

    #[test]
    fn unknown_subscription_status_is_inactive() {
        for status in ["past_due", "canceled", "incomplete", "ACTIVE", ""] {
            let org = OrgBilling::with_subscription(status, Some(5));
            assert_eq!(resolve(&org, t0()), Entitlement::inactive(), "status={status}");
        }
    }

    #[test]
    fn capacity_gate_blocks_at_limit() {
        let ent = Entitlement {
            is_active: true,
            vessel_limit: Some(3),
            source: EntitlementSource::Subscription,
        };
        assert!(check_vessel_capacity(&ent, 2).is_ok());
        assert_eq!(
            check_vessel_capacity(&ent, 3),
            Err(EntitlementDenied::LimitReached { limit: 3, current: 3 })
        );
    }

    #[test]
    fn capacity_gate_rejects_inactive_even_with_zero_vessels() {
        assert_eq!(
            check_vessel_capacity(&Entitlement::inactive(), 0),
            Err(EntitlementDenied::Inactive)
        );
    }
}
