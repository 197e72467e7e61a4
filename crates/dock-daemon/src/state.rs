//! Shared runtime state for dock-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Everything here is
//! built once at startup; the JWKS cache is the only interior-mutable part.

use std::sync::Arc;

use dock_config::AppConfig;
use dock_entitlement::PlanCatalog;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::JwksCache;
use crate::payments::PaymentProvider;

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub pool: PgPool,
    pub config: AppConfig,
    /// Verification keys for bearer tokens.
    pub jwks: JwksCache,
    pub payments: Arc<dyn PaymentProvider>,
    /// Plan <-> price id mapping resolved from the environment.
    pub plans: PlanCatalog,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        payments: Arc<dyn PaymentProvider>,
        plans: PlanCatalog,
    ) -> Self {
        let jwks = JwksCache::new(config.auth.jwks_url.clone());
        Self {
            build: BuildInfo {
                service: "dock-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            pool,
            config,
            jwks,
            payments,
            plans,
        }
    }
}
