//! Entitlement priority scenarios.
//!
//! GREEN when:
//! - an unexpired (or never-expiring) override wins over any subscription state
//! - an expired override falls through to the subscription branch
//! - no override and no entitled subscription resolves inactive
//! - a zero limit is preserved as `Some(0)`, never treated as unlimited

use chrono::{DateTime, Duration, TimeZone, Utc};
use dock_entitlement::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 9, 30, 0).unwrap()
}

#[test]
fn override_without_expiry_is_active_regardless_of_subscription() {
    for status in [None, Some("canceled"), Some("past_due"), Some("active")] {
        let org = OrgBilling {
            billing_override_enabled: true,
            billing_override_expires_at: None,
            billing_override_vessel_limit: Some(7),
            subscription_status: status.map(str::to_string),
            vessel_limit: Some(2),
        };

        let ent = resolve(&org, now());
        assert!(ent.is_active, "status={status:?}");
        assert_eq!(ent.vessel_limit, Some(7));
        assert_eq!(ent.source, EntitlementSource::Override);
    }
}

#[test]
fn override_with_no_limit_is_unlimited() {
    let org = OrgBilling::with_override(None, Some(now() + Duration::days(30)));
    let ent = resolve(&org, now());
    assert!(ent.is_unlimited());
}

#[test]
fn expired_override_falls_through_to_subscription() {
    let org = OrgBilling {
        billing_override_enabled: true,
        billing_override_expires_at: Some(now() - Duration::hours(1)),
        billing_override_vessel_limit: None,
        subscription_status: Some("active".to_string()),
        vessel_limit: Some(5),
    };

    let ent = resolve(&org, now());
    assert!(ent.is_active);
    assert_eq!(ent.vessel_limit, Some(5));
    assert_eq!(ent.source, EntitlementSource::Subscription);
}

#[test]
fn expired_override_without_subscription_is_inactive() {
    let org = OrgBilling::with_override(Some(10), Some(now() - Duration::days(1)));
    assert_eq!(resolve(&org, now()), Entitlement::inactive());
}

#[test]
fn trialing_subscription_is_active() {
    let org = OrgBilling::with_subscription("trialing", None);
    let ent = resolve(&org, now());
    assert!(ent.is_active);
    assert_eq!(ent.vessel_limit, None);
}

#[test]
fn disabled_override_and_inactive_subscription_is_inactive() {
    for status in [None, Some("canceled"), Some("unpaid"), Some("incomplete_expired")] {
        let org = OrgBilling {
            billing_override_enabled: false,
            billing_override_expires_at: None,
            billing_override_vessel_limit: Some(100),
            subscription_status: status.map(str::to_string),
            vessel_limit: Some(100),
        };
        let ent = resolve(&org, now());
        assert!(!ent.is_active, "status={status:?}");
        assert_eq!(ent.vessel_limit, None);
    }
}

#[test]
fn zero_limit_is_preserved_and_blocks_creation() {
    let org = OrgBilling::with_override(Some(0), None);
    let ent = resolve(&org, now());

    assert!(ent.is_active);
    assert_eq!(ent.vessel_limit, Some(0));
    assert_eq!(
        check_vessel_capacity(&ent, 0),
        Err(EntitlementDenied::LimitReached { limit: 0, current: 0 })
    );
}

#[test]
fn unlimited_entitlement_never_blocks() {
    let ent = resolve(&OrgBilling::with_subscription("active", None), now());
    assert!(check_vessel_capacity(&ent, 10_000).is_ok());
}

#[test]
fn entitlement_serializes_limit_null_for_unlimited() {
    let ent = resolve(&OrgBilling::with_subscription("active", None), now());
    let v = serde_json::to_value(&ent).unwrap();
    assert_eq!(v["is_active"], true);
    assert!(v["vessel_limit"].is_null());
    assert_eq!(v["source"], "subscription");
}
