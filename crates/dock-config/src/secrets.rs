//! Runtime secret resolution.
//!
//! Config stores only env var NAMES. Callers resolve once at startup and pass
//! the result into constructors; nothing else reads these variables. `Debug`
//! redacts every value and errors mention only the variable name.

use anyhow::{bail, Result};
use dock_entitlement::{Plan, PlanCatalog};

use crate::AppConfig;

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// `None` when the named variable is unset or blank; billing endpoints then
    /// report the provider as unconfigured.
    pub stripe_secret_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "stripe_secret_key",
                &self.stripe_secret_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl ResolvedSecrets {
    pub fn require_stripe_key(&self, cfg: &AppConfig) -> Result<&str> {
        match self.stripe_secret_key.as_deref() {
            Some(k) => Ok(k),
            None => bail!(
                "SECRETS_MISSING: env var '{}' (stripe secret key) is not set or empty",
                cfg.billing.stripe_secret_key_env
            ),
        }
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

pub fn resolve_secrets(cfg: &AppConfig) -> ResolvedSecrets {
    ResolvedSecrets {
        stripe_secret_key: resolve_env(&cfg.billing.stripe_secret_key_env),
    }
}

/// Price ids come from the environment as well; plans whose variable is unset
/// are absent from the catalog and cannot be checked out.
pub fn resolve_plan_catalog(cfg: &AppConfig) -> PlanCatalog {
    let names = &cfg.billing.price_env;
    let mut catalog = PlanCatalog::new();
    for plan in Plan::ALL {
        let var = match plan {
            Plan::Starter => &names.starter,
            Plan::Standard => &names.standard,
            Plan::Pro => &names.pro,
            Plan::Unlimited => &names.unlimited,
        };
        if let Some(price) = resolve_env(var) {
            catalog.insert(plan, price);
        }
    }
    catalog
}
