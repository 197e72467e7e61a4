use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription statuses that grant entitlement.
pub const ENTITLED_SUBSCRIPTION_STATUSES: &[&str] = &["active", "trialing"];

/// Billing-relevant columns of an organization row.
///
/// `vessel_limit` fields use `None` for "unlimited". `Some(0)` is a real limit
/// (zero capacity) and must never be collapsed into `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgBilling {
    pub billing_override_enabled: bool,
    pub billing_override_expires_at: Option<DateTime<Utc>>,
    pub billing_override_vessel_limit: Option<i64>,
    pub subscription_status: Option<String>,
    pub vessel_limit: Option<i64>,
}

impl OrgBilling {
    /// An organization with no override and no subscription.
    pub fn unsubscribed() -> Self {
        Self::default()
    }

    pub fn with_subscription(status: impl Into<String>, vessel_limit: Option<i64>) -> Self {
        Self {
            subscription_status: Some(status.into()),
            vessel_limit,
            ..Self::default()
        }
    }

    pub fn with_override(
        vessel_limit: Option<i64>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            billing_override_enabled: true,
            billing_override_expires_at: expires_at,
            billing_override_vessel_limit: vessel_limit,
            ..Self::default()
        }
    }
}

/// Which branch of the priority order produced an entitlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementSource {
    Override,
    Subscription,
    None,
}

impl EntitlementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementSource::Override => "override",
            EntitlementSource::Subscription => "subscription",
            EntitlementSource::None => "none",
        }
    }
}

/// Effective entitlement. Never persisted; recomputed on every check.
///
/// `vessel_limit` is meaningless when `is_active` is false; callers must check
/// `is_active` first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub is_active: bool,
    pub vessel_limit: Option<i64>,
    pub source: EntitlementSource,
}

impl Entitlement {
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            vessel_limit: None,
            source: EntitlementSource::None,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.is_active && self.vessel_limit.is_none()
    }
}

/// Why a new vessel may not be created.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EntitlementDenied {
    #[error("no active subscription or billing override")]
    Inactive,

    #[error("vessel limit reached ({current}/{limit})")]
    LimitReached { limit: i64, current: i64 },
}
