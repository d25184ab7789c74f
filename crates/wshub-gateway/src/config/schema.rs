use serde::Deserialize;
use wshub_core::error::{HubError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HubError::UnsupportedVersion);
        }
        self.gateway.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Liveness scan period, and the interval advertised to clients.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,

    /// A connection is stale once its last heartbeat is older than this.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout: u64,

    /// Backoff after a failed liveness scan. Clamped below the interval.
    #[serde(default = "default_scan_error_backoff_ms")]
    pub scan_error_backoff_ms: u64,

    /// Max time a fan-out waits to enqueue into one connection's queue.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            heartbeat_interval: default_heartbeat_interval(),
            heartbeat_timeout: default_heartbeat_timeout(),
            scan_error_backoff_ms: default_scan_error_backoff_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            outbound_queue: default_outbound_queue(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=3600).contains(&self.heartbeat_interval) {
            return Err(HubError::BadRequest(
                "gateway.heartbeat_interval must be between 1 and 3600 seconds".into(),
            ));
        }
        if self.heartbeat_timeout <= self.heartbeat_interval {
            return Err(HubError::BadRequest(
                "gateway.heartbeat_timeout must be greater than heartbeat_interval".into(),
            ));
        }
        if self.heartbeat_timeout > 86400 {
            return Err(HubError::BadRequest(
                "gateway.heartbeat_timeout must be at most 86400 seconds".into(),
            ));
        }
        if !(10..=60000).contains(&self.write_timeout_ms) {
            return Err(HubError::BadRequest(
                "gateway.write_timeout_ms must be between 10 and 60000".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(HubError::BadRequest("gateway.outbound_queue must be > 0".into()));
        }
        if self.max_frame_bytes < 64 {
            return Err(HubError::BadRequest("gateway.max_frame_bytes must be >= 64".into()));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_heartbeat_timeout() -> u64 {
    60
}
fn default_scan_error_backoff_ms() -> u64 {
    1000
}
fn default_write_timeout_ms() -> u64 {
    1500
}
fn default_outbound_queue() -> usize {
    1024
}
fn default_max_frame_bytes() -> usize {
    65536
}
