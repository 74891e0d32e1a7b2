// src/sdk.rs
use std::sync::Arc;

use crate::config::Config;
use crate::error::TransportError;
use crate::health::HealthLoop;
use crate::matchmaker::MatchClient;
use crate::shutdown::Shutdown;
use crate::sidecar::SidecarClient;
use crate::transport::Transport;
use crate::watcher::BackfillWatcher;

/// One SDK instance per managed game-server process. Owns the process-wide
/// shutdown signal and wires Transport → clients → watcher; no globals.
///
/// Must be constructed inside a Tokio runtime: when health pings are enabled
/// the liveness loop is spawned immediately.
pub struct Sdk {
    pub sidecar: SidecarClient,
    pub matchmaker: MatchClient,
    pub watcher: BackfillWatcher,
    shutdown: Shutdown,
}

impl Sdk {
    pub fn new(config: Config) -> Result<Self, TransportError> {
        let shutdown = Shutdown::new();
        let transport = Arc::new(Transport::new(
            &config.match_address,
            config.request_timeout,
            shutdown.token(),
        )?);
        let sidecar = SidecarClient::new(Arc::clone(&transport), &config);
        let matchmaker = MatchClient::new(Arc::clone(&transport), sidecar.clone(), &config);
        let watcher = BackfillWatcher::new(matchmaker.clone(), &config);

        if config.health_enabled {
            HealthLoop::new(sidecar.clone(), &config).spawn();
        }

        Ok(Self {
            sidecar,
            matchmaker,
            watcher,
            shutdown,
        })
    }

    /// Builds the SDK from the environment and waits for the sidecar,
    /// returning `None` when it never comes up.
    pub async fn connect_from_env() -> Result<Option<Self>, TransportError> {
        let sdk = Self::new(Config::from_env())?;
        if !sdk.sidecar.connect().await {
            return Ok(None);
        }
        Ok(Some(sdk))
    }

    /// Triggers the single process-wide cancellation: background loops exit
    /// at their next iteration boundary and in-flight calls abort.
    pub fn close(&self) {
        self.shutdown.trigger();
    }
}
