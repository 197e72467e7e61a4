//! Config hash stability.
//!
//! GREEN when:
//! - the same layers hash identically across calls
//! - key order inside a YAML document does not affect the hash
//! - a changed value changes the hash
//! - later layers override earlier ones

use dock_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
server:
  addr: "127.0.0.1:8080"
auth:
  provider: "clerk"
  dev_bypass: false
billing:
  web_base_url: "https://app.example.com"
  stripe_secret_key_env: "STRIPE_SECRET_KEY"
"#;

const BASE_YAML_REORDERED: &str = r#"
billing:
  stripe_secret_key_env: "STRIPE_SECRET_KEY"
  web_base_url: "https://app.example.com"
auth:
  dev_bypass: false
  provider: "clerk"
server:
  addr: "127.0.0.1:8080"
"#;

const OVERLAY_YAML: &str = r#"
server:
  addr: "0.0.0.0:8080"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base_and_keeps_siblings() {
    let cfg = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(
        cfg.config_json.pointer("/server/addr").and_then(|v| v.as_str()),
        Some("0.0.0.0:8080")
    );
    assert_eq!(
        cfg.config_json
            .pointer("/billing/web_base_url")
            .and_then(|v| v.as_str()),
        Some("https://app.example.com")
    );
}

#[test]
fn invalid_yaml_is_rejected() {
    assert!(load_layered_yaml_from_strings(&["server: [unterminated"]).is_err());
}
