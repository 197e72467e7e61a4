//! Typed settings.
//!
//! GREEN when:
//! - an empty document yields working defaults
//! - the shipped base config parses
//! - unknown keys and malformed values are rejected
//! - dev bypass only applies when no JWKS URL is configured

use dock_config::{load_layered_yaml, load_layered_yaml_from_strings, AppConfig};

#[test]
fn empty_document_uses_defaults() {
    let loaded = load_layered_yaml_from_strings(&[]).unwrap();
    let cfg = AppConfig::from_loaded(&loaded).unwrap();
    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.server.addr, "127.0.0.1:8080");
    assert_eq!(cfg.auth.provider, "clerk");
    assert!(!cfg.auth.bypass_active());
    assert_eq!(cfg.billing.stripe_secret_key_env, "STRIPE_SECRET_KEY");
}

#[test]
fn shipped_base_and_dev_layers_parse() {
    let base = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/base.yaml");
    let dev = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/dev.yaml");

    let cfg = AppConfig::from_loaded(&load_layered_yaml(&[base]).unwrap()).unwrap();
    assert!(!cfg.auth.bypass_active());

    let cfg = AppConfig::from_loaded(&load_layered_yaml(&[base, dev]).unwrap()).unwrap();
    assert!(cfg.auth.bypass_active());
}

#[test]
fn jwks_url_disables_dev_bypass() {
    let yaml = r#"
auth:
  jwks_url: "https://issuer.example.com/.well-known/jwks.json"
  dev_bypass: true
"#;
    let cfg = AppConfig::from_loaded(&load_layered_yaml_from_strings(&[yaml]).unwrap()).unwrap();
    assert!(!cfg.auth.bypass_active());
}

#[test]
fn unknown_key_is_rejected() {
    let yaml = "server:\n  adress: \"127.0.0.1:1\"\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    assert!(AppConfig::from_loaded(&loaded).is_err());
}

#[test]
fn malformed_values_fail_validation() {
    for yaml in [
        "server:\n  addr: \"not-an-addr\"\n",
        "billing:\n  web_base_url: \"app.example.com\"\n",
        "database:\n  max_connections: 0\n",
    ] {
        let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
        assert!(AppConfig::from_loaded(&loaded).is_err(), "accepted: {yaml}");
    }
}

#[test]
fn web_base_trims_trailing_slash() {
    let yaml = "billing:\n  web_base_url: \"https://app.example.com/\"\n";
    let cfg = AppConfig::from_loaded(&load_layered_yaml_from_strings(&[yaml]).unwrap()).unwrap();
    assert_eq!(cfg.web_base(), "https://app.example.com");
}
