use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Subscription plans sold through the payment provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Starter,
    Standard,
    Pro,
    Unlimited,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid plan '{0}'. must be one of: starter, standard, pro, unlimited")]
pub struct UnknownPlan(pub String);

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Starter, Plan::Standard, Plan::Pro, Plan::Unlimited];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Starter => "starter",
            Plan::Standard => "standard",
            Plan::Pro => "pro",
            Plan::Unlimited => "unlimited",
        }
    }

    /// Case-insensitive, whitespace-tolerant.
    pub fn parse(s: &str) -> Result<Self, UnknownPlan> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(Plan::Starter),
            "standard" => Ok(Plan::Standard),
            "pro" => Ok(Plan::Pro),
            "unlimited" => Ok(Plan::Unlimited),
            _ => Err(UnknownPlan(s.to_string())),
        }
    }

    /// Vessel limit granted by the plan. `None` = unlimited.
    pub fn vessel_limit(&self) -> Option<i64> {
        match self {
            Plan::Starter => Some(3),
            Plan::Standard => Some(5),
            Plan::Pro => Some(10),
            Plan::Unlimited => None,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plan ↔ payment-provider price id mapping.
///
/// Built from configuration; plans without a configured price are simply absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlanCatalog {
    prices: BTreeMap<Plan, String>,
}

impl PlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, plan: Plan, price_id: impl Into<String>) -> Self {
        self.insert(plan, price_id);
        self
    }

    /// Empty price ids are ignored.
    pub fn insert(&mut self, plan: Plan, price_id: impl Into<String>) {
        let price_id = price_id.into();
        if !price_id.trim().is_empty() {
            self.prices.insert(plan, price_id);
        }
    }

    pub fn price_id(&self, plan: Plan) -> Option<&str> {
        self.prices.get(&plan).map(String::as_str)
    }

    /// Reverse lookup used when syncing a subscription from the provider.
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        self.prices
            .iter()
            .find(|(_, p)| p.as_str() == price_id)
            .map(|(plan, _)| *plan)
    }

    pub fn configured_plans(&self) -> Vec<Plan> {
        self.prices.keys().copied().collect()
    }
}
