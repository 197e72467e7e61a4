//! dock-entitlement
//!
//! Billing entitlement resolution for organizations.
//!
//! Priority, first match wins:
//! - Billing override (enabled and not expired)
//! - Payment-provider subscription (`active` / `trialing`)
//! - Inactive
//!
//! Deterministic, pure logic. No IO. The evaluation instant is always passed in
//! so callers (and tests) control the clock.

mod plans;
mod resolver;
mod types;

pub use plans::{Plan, PlanCatalog, UnknownPlan};
pub use resolver::{check_vessel_capacity, override_active, resolve, resolve_now};
pub use types::*;
