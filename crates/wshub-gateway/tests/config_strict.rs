#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;

use wshub_gateway::config::{self, GatewayConfig};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
gateway:
  listen: "0.0.0.0:8080"
  heartbeat_intervall: 10 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn deny_unknown_top_level_section() {
    let bad = "version: 1\nrooms: {}\n";
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.gateway.heartbeat_interval, 30);
    assert_eq!(cfg.gateway.heartbeat_timeout, 60);
    assert_eq!(cfg.gateway.outbound_queue, 1024);
    assert_eq!(cfg.gateway.max_frame_bytes, 65536);
    assert_eq!(cfg.gateway.listen, "0.0.0.0:8080");
}

#[test]
fn timeout_must_exceed_interval() {
    let bad = r#"
version: 1
gateway:
  heartbeat_interval: 30
  heartbeat_timeout: 30
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn env_overrides_apply_and_revalidate() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("WSHUB_LISTEN", "127.0.0.1:9000"),
        ("WSHUB_HEARTBEAT_INTERVAL", "5"),
        ("WSHUB_HEARTBEAT_TIMEOUT", " 12 "),
    ]);
    let mut cfg = GatewayConfig::default();
    config::apply_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string())).unwrap();

    assert_eq!(cfg.gateway.listen, "127.0.0.1:9000");
    assert_eq!(cfg.gateway.heartbeat_interval, 5);
    assert_eq!(cfg.gateway.heartbeat_timeout, 12);
    cfg.validate().unwrap();

    let mut cfg = GatewayConfig::default();
    config::apply_overrides(&mut cfg, |k| (k == "WSHUB_HEARTBEAT_INTERVAL").then(|| "90".to_string()))
        .unwrap();
    assert!(cfg.validate().is_err(), "interval above the default timeout");
}

#[test]
fn env_override_must_be_numeric() {
    let mut cfg = GatewayConfig::default();
    let err = config::apply_overrides(&mut cfg, |k| {
        (k == "WSHUB_HEARTBEAT_TIMEOUT").then(|| "soon".to_string())
    })
    .expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}
