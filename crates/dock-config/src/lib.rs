//! Layered YAML configuration for the DockOps services.
//!
//! YAML layers are deep-merged in order (later layers override), converted to
//! JSON, checked for secret-looking literals, and hashed over their canonical
//! form so a running process can report exactly which configuration it loaded.
//! Typed access lives in [`settings`]; env-resolved secrets in [`secrets`].

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub mod secrets;
pub mod settings;

pub use secrets::{resolve_plan_catalog, resolve_secrets, ResolvedSecrets};
pub use settings::{
    AppConfig, AuthConfig, BillingConfig, DatabaseConfig, PriceEnvNames, ServerConfig,
};

/// Comma-separated list of YAML paths, base first.
pub const ENV_CONFIG_PATHS: &str = "DOCK_CONFIG";

/// Leaf strings starting with any of these abort loading. Config stores env
/// var names for secrets, never values.
const SECRET_PREFIXES: &[&str] = &[
    "sk_live",    // Stripe live secret key
    "sk_test",    // Stripe test secret key
    "rk_live",    // Stripe restricted key
    "rk_test",    // Stripe restricted key
    "whsec_",     // Stripe webhook signing secret
    "sk-",        // generic API keys
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "postgres://",
    "postgresql://",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Load the layers named by `DOCK_CONFIG`. With the variable unset or blank the
/// result is an empty document, so every typed setting takes its default.
pub fn load_from_env() -> Result<LoadedConfig> {
    let raw = std::env::var(ENV_CONFIG_PATHS).unwrap_or_default();
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    load_layered_yaml(&paths)
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// serde_json's default map is ordered by key, so plain compact serialization
/// is already canonical.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    if let Some(ptr) = find_secret_leaf(v, "") {
        bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
    }
    Ok(())
}

fn find_secret_leaf(v: &Value, prefix: &str) -> Option<String> {
    match v {
        Value::Object(map) => map.iter().find_map(|(k, vv)| {
            let next = format!("{}/{}", prefix, k.replace('~', "~0").replace('/', "~1"));
            find_secret_leaf(vv, &next)
        }),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .find_map(|(i, vv)| find_secret_leaf(vv, &format!("{prefix}/{i}"))),
        Value::String(s) if looks_like_secret(s) => Some(if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }),
        _ => None,
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
