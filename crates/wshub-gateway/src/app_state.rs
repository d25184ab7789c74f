//! Shared application state for the wshub gateway.
//!
//! Built once at startup and passed to every handler. Owns the hub, the
//! message router (fixed after construction) and the liveness monitor, and
//! provides the shutdown routine that stops the monitor and clears the hub.

use std::sync::Arc;

use wshub_core::error::Result;

use crate::config::GatewayConfig;
use crate::dispatch::MessageRouter;
use crate::hub::{ConnectionHub, LivenessMonitor};
use crate::obs::HubMetrics;
use crate::services;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    metrics: Arc<HubMetrics>,
    hub: Arc<ConnectionHub>,
    router: MessageRouter,
    liveness: LivenessMonitor,
}

impl AppState {
    /// Build application state. Returns Result so main can report bad config.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(HubMetrics::default());
        let hub = Arc::new(ConnectionHub::new(Arc::clone(&metrics)));

        // All handlers are registered here, before the router is shared.
        let mut router = MessageRouter::with_builtins(Arc::clone(&hub));
        services::register(&mut router);
        tracing::info!(types = ?router.registered_types(), "message handlers registered");

        let liveness = LivenessMonitor::from_config(Arc::clone(&hub), &cfg.gateway);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                hub,
                router,
                liveness,
            }),
        })
    }

    /// Start background tasks.
    pub async fn start(&self) {
        self.inner.liveness.start().await;
    }

    /// Stop accepting, stop the liveness monitor, close every connection.
    pub async fn shutdown(&self) {
        self.inner.metrics.set_draining();
        self.inner.liveness.stop().await;
        self.inner.hub.clear();
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn hub(&self) -> Arc<ConnectionHub> {
        Arc::clone(&self.inner.hub)
    }

    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.inner.liveness
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.inner.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Point-in-time gauges rendered alongside the registered metrics.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("wshub_channels", self.inner.hub.channel_count() as u64),
            ("wshub_registry_connections", self.inner.hub.connection_count() as u64),
        ]
    }
}
