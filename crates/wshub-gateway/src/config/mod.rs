//! Gateway config loader (strict parsing + env overrides).

pub mod schema;

use std::{env, fs, path::Path};

use wshub_core::error::{HubError, Result};

pub use schema::{GatewayConfig, GatewaySection};

/// Env var naming the YAML config file.
pub const CONFIG_PATH_ENV: &str = "WSHUB_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "wshub.yaml";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| HubError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| HubError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve config for the binary.
///
/// An explicit `WSHUB_CONFIG` path must exist. Without it, `wshub.yaml` is
/// used when present and built-in defaults otherwise. Env overrides are
/// applied last and the result is validated again.
pub fn load_from_env() -> Result<GatewayConfig> {
    let mut cfg = match env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_from_file(&path)?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH)?,
        Err(_) => GatewayConfig::default(),
    };
    apply_overrides(&mut cfg, |k| env::var(k).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

/// Apply `WSHUB_LISTEN`, `WSHUB_HEARTBEAT_INTERVAL` and
/// `WSHUB_HEARTBEAT_TIMEOUT` from `lookup`.
pub fn apply_overrides(
    cfg: &mut GatewayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(listen) = lookup("WSHUB_LISTEN") {
        cfg.gateway.listen = listen;
    }
    if let Some(v) = lookup("WSHUB_HEARTBEAT_INTERVAL") {
        cfg.gateway.heartbeat_interval = parse_secs("WSHUB_HEARTBEAT_INTERVAL", &v)?;
    }
    if let Some(v) = lookup("WSHUB_HEARTBEAT_TIMEOUT") {
        cfg.gateway.heartbeat_timeout = parse_secs("WSHUB_HEARTBEAT_TIMEOUT", &v)?;
    }
    Ok(())
}

fn parse_secs(key: &str, v: &str) -> Result<u64> {
    v.trim()
        .parse()
        .map_err(|_| HubError::BadRequest(format!("{key} must be an integer number of seconds")))
}
