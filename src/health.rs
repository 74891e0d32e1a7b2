// src/health.rs
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::TransportError;
use crate::sidecar::SidecarClient;

/// Fixed-interval liveness ping to the sidecar. Fire-and-forget: a non-200
/// answer is ignored; teardown ends the loop quietly.
pub struct HealthLoop {
    sidecar: SidecarClient,
    interval: Duration,
    enabled: bool,
}

impl HealthLoop {
    pub fn new(sidecar: SidecarClient, config: &Config) -> Self {
        Self {
            sidecar,
            interval: config
                .health_interval
                .clamp(crate::config::MIN_HEALTH_INTERVAL, crate::config::MAX_HEALTH_INTERVAL),
            enabled: config.health_enabled,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        if !self.enabled {
            return;
        }
        let token = self.sidecar.token().clone();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = token.cancelled() => return,
            }
            match self.sidecar.health().await {
                // Non-200 is still a delivered signal; nothing to do.
                Ok(_) => {}
                Err(TransportError::Cancelled) => return,
                Err(err) => debug!("health ping failed: {}", err),
            }
        }
    }
}
