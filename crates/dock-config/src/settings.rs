//! Typed view over the merged config document.
//!
//! Every section and field has a default, so an empty document is a valid
//! local-development configuration. Unknown keys are rejected to catch typos.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::LoadedConfig;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Overridden at runtime by `DOCK_DAEMON_ADDR`.
    pub addr: String,
    /// Allowed browser origins. Empty means same-origin only.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_connections: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Provider tag stored on users alongside the token subject.
    pub provider: String,
    pub jwks_url: Option<String>,
    /// Expected `iss` claim. Unchecked when unset.
    pub issuer: Option<String>,
    /// Expected `aud` claim. Unchecked when unset.
    pub audience: Option<String>,
    /// Accept unauthenticated requests as a fixed dev identity. Ignored when
    /// `jwks_url` is set.
    pub dev_bypass: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: "clerk".to_string(),
            jwks_url: None,
            issuer: None,
            audience: None,
            dev_bypass: false,
        }
    }
}

impl AuthConfig {
    pub fn bypass_active(&self) -> bool {
        self.jwks_url.is_none() && self.dev_bypass
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BillingConfig {
    /// Frontend base for checkout success/cancel and portal return URLs.
    pub web_base_url: String,
    pub stripe_api_base: String,
    /// Name of the env var holding the Stripe secret key.
    pub stripe_secret_key_env: String,
    /// Plan name -> name of the env var holding that plan's price id.
    pub price_env: PriceEnvNames,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            web_base_url: "http://localhost:3000".to_string(),
            stripe_api_base: "https://api.stripe.com/v1".to_string(),
            stripe_secret_key_env: "STRIPE_SECRET_KEY".to_string(),
            price_env: PriceEnvNames::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceEnvNames {
    pub starter: String,
    pub standard: String,
    pub pro: String,
    pub unlimited: String,
}

impl Default for PriceEnvNames {
    fn default() -> Self {
        Self {
            starter: "STRIPE_PRICE_STARTER".to_string(),
            standard: "STRIPE_PRICE_STANDARD".to_string(),
            pro: "STRIPE_PRICE_PRO".to_string(),
            unlimited: "STRIPE_PRICE_UNLIMITED".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: AppConfig = serde_json::from_value(loaded.config_json.clone())
            .context("config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.server
            .addr
            .parse::<SocketAddr>()
            .with_context(|| format!("server.addr is not a socket address: {}", self.server.addr))?;

        let base = &self.billing.web_base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            bail!("billing.web_base_url must be an http(s) URL: {base}");
        }
        if let Some(url) = &self.auth.jwks_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                bail!("auth.jwks_url must be an http(s) URL: {url}");
            }
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be >= 1");
        }
        Ok(())
    }

    /// `web_base_url` without a trailing slash.
    pub fn web_base(&self) -> &str {
        self.billing.web_base_url.trim_end_matches('/')
    }
}
