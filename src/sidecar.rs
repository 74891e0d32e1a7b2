// src/sidecar.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::TransportError;
use crate::models::gameserver::GameServer;
use crate::shutdown::ShutdownToken;
use crate::transport::{Method, Transport};

/// Label holding the epoch timestamp at which the orchestrator will shut the
/// game server down. Absent means no expiry.
const EXPIRE_AT_LABEL: &str = "ExpireAt";
/// Labels under this prefix are orchestrator-internal and hidden from
/// `labels()`.
const RESERVED_LABEL_PREFIX: &str = "agones";

#[derive(Serialize)]
struct KeyValue<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct ReserveRequest {
    seconds: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CpuBoostRequest<'a> {
    boost_factor: &'a str,
    duration: i64,
}

#[derive(Deserialize)]
struct WatchEnvelope {
    result: GameServer,
}

/// Typed wrapper over [`Transport`] for the local sidecar's lifecycle API.
/// Every operation except [`SidecarClient::connect`] is single-shot: a
/// non-200 answer is the sole failure signal, surfaced immediately.
#[derive(Clone)]
pub struct SidecarClient {
    transport: Arc<Transport>,
    address: String,
    connect_attempts: u32,
    retry_delay: Duration,
}

impl SidecarClient {
    pub fn new(transport: Arc<Transport>, config: &Config) -> Self {
        Self {
            transport,
            address: config.sidecar_address.trim_end_matches('/').to_string(),
            connect_attempts: config.connect_attempts,
            retry_delay: config.retry_delay,
        }
    }

    /// Waits for the sidecar to come up: fetches the game-server snapshot up
    /// to `connect_attempts` times with `retry_delay` between attempts and
    /// returns true on the first snapshot. This is the only bounded-retry
    /// operation in the SDK.
    pub async fn connect(&self) -> bool {
        for attempt in 0..self.connect_attempts {
            debug!("attempting to connect to sidecar... {}", attempt + 1);
            match self.game_server().await {
                Ok(Some(_)) => {
                    info!("connected to sidecar at {}", self.address);
                    return true;
                }
                Ok(None) => debug!("sidecar not ready yet, retrying"),
                Err(TransportError::Cancelled) => return false,
                Err(err) => debug!("sidecar connection attempt failed: {}", err),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {}
                _ = self.transport.token().cancelled() => return false,
            }
        }
        false
    }

    /// Marks the game server as ready to receive connections.
    pub async fn ready(&self) -> Result<bool, TransportError> {
        self.command("/ready").await
    }

    /// Marks the game server as ready to shut down.
    pub async fn shutdown(&self) -> Result<bool, TransportError> {
        self.command("/shutdown").await
    }

    /// Marks the game server as allocated.
    pub async fn allocate(&self) -> Result<bool, TransportError> {
        self.command("/allocate").await
    }

    /// Fire-and-forget liveness ping.
    pub async fn health(&self) -> Result<bool, TransportError> {
        self.command("/health").await
    }

    async fn command(&self, path: &str) -> Result<bool, TransportError> {
        let reply = self
            .transport
            .send(&self.address, path, "{}", None, Method::Post)
            .await?;
        Ok(reply.ok)
    }

    /// Sets a metadata label on the game server.
    pub async fn set_label(&self, key: &str, value: &str) -> Result<bool, TransportError> {
        self.put_metadata("/metadata/label", key, value).await
    }

    /// Sets a metadata annotation on the game server.
    pub async fn set_annotation(&self, key: &str, value: &str) -> Result<bool, TransportError> {
        self.put_metadata("/metadata/annotation", key, value).await
    }

    async fn put_metadata(
        &self,
        path: &str,
        key: &str,
        value: &str,
    ) -> Result<bool, TransportError> {
        let body = serde_json::to_string(&KeyValue { key, value })
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let reply = self
            .transport
            .send(&self.address, path, &body, None, Method::Put)
            .await?;
        Ok(reply.ok)
    }

    /// Moves the game server into the Reserved state for `seconds`.
    /// Zero means an indefinite reservation.
    pub async fn reserve(&self, seconds: i64) -> Result<bool, TransportError> {
        let body = serde_json::to_string(&ReserveRequest { seconds })
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let reply = self
            .transport
            .send(&self.address, "/reserve", &body, None, Method::Post)
            .await?;
        Ok(reply.ok)
    }

    /// Requests a temporary CPU boost for the game-server container.
    pub async fn acquire_cpu_boost(
        &self,
        boost_factor: &str,
        duration_seconds: i64,
    ) -> Result<bool, TransportError> {
        let body = serde_json::to_string(&CpuBoostRequest {
            boost_factor,
            duration: duration_seconds,
        })
        .map_err(|err| TransportError::Network(err.to_string()))?;
        let reply = self
            .transport
            .send(&self.address, "/acquire-cpu", &body, None, Method::Post)
            .await?;
        Ok(reply.ok)
    }

    /// Fetches the current game-server snapshot. `None` when the sidecar
    /// answered with a non-200 status or an undecodable body.
    pub async fn game_server(&self) -> Result<Option<GameServer>, TransportError> {
        let reply = self
            .transport
            .send(&self.address, "/gameserver", "{}", None, Method::Get)
            .await?;
        if !reply.ok {
            return Ok(None);
        }
        match serde_json::from_str(&reply.body) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!("game server snapshot did not decode: {}", err);
                Ok(None)
            }
        }
    }

    /// Game-server labels with orchestrator-internal entries filtered out.
    pub async fn labels(&self) -> Result<Option<HashMap<String, String>>, TransportError> {
        let Some(snapshot) = self.game_server().await? else {
            return Ok(None);
        };
        Ok(Some(filter_reserved(&snapshot.object_meta.labels)))
    }

    /// Labels and spec environment merged into one mapping; env wins on
    /// shared keys. `None` when no snapshot could be fetched.
    pub async fn label_envs(&self) -> Result<Option<HashMap<String, String>>, TransportError> {
        Ok(self.game_server().await?.map(|snapshot| snapshot.label_envs()))
    }

    /// Epoch timestamp at which the orchestrator will shut this game server
    /// down, from the `ExpireAt` label. Zero means the server lives until an
    /// explicit shutdown or deallocation.
    pub async fn expire_at(&self) -> Result<i64, TransportError> {
        let Some(snapshot) = self.game_server().await? else {
            return Ok(0);
        };
        Ok(snapshot
            .object_meta
            .labels
            .get(EXPIRE_AT_LABEL)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0))
    }

    /// Opens the server-push watch stream. The sequence is lazy, unbounded
    /// and non-restartable; when it ends, reconnecting is the caller's call.
    pub async fn watch_game_server(&self) -> Result<GameServerWatch, TransportError> {
        let response = self
            .transport
            .open_stream(&self.address, "/watch/gameserver")
            .await?;
        info!("game server watch started");
        Ok(GameServerWatch {
            response,
            token: self.transport.token().clone(),
        })
    }

    /// Callback form of [`SidecarClient::watch_game_server`]: drives the
    /// stream on its own task and hands every pushed snapshot to `callback`.
    pub async fn watch_game_server_with<F>(
        &self,
        mut callback: F,
    ) -> Result<JoinHandle<()>, TransportError>
    where
        F: FnMut(GameServer) + Send + 'static,
    {
        let mut watch = self.watch_game_server().await?;
        Ok(tokio::spawn(async move {
            while let Some(snapshot) = watch.next().await {
                callback(snapshot);
            }
            debug!("game server watch stream ended");
        }))
    }

    pub(crate) fn token(&self) -> &ShutdownToken {
        self.transport.token()
    }
}

fn filter_reserved(labels: &HashMap<String, String>) -> HashMap<String, String> {
    labels
        .iter()
        .filter(|(key, _)| !key.starts_with(RESERVED_LABEL_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Lazy sequence of game-server snapshots pushed by the sidecar over one
/// long-lived HTTP response. Each chunk is a `{"result": ...}` envelope.
pub struct GameServerWatch {
    response: reqwest::Response,
    token: ShutdownToken,
}

impl GameServerWatch {
    /// Next pushed snapshot; `None` once the stream ends, errors out, or
    /// teardown is signalled. Chunks that fail to decode are logged and
    /// skipped.
    pub async fn next(&mut self) -> Option<GameServer> {
        loop {
            let chunk = tokio::select! {
                result = self.response.chunk() => match result {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => return None,
                    Err(err) => {
                        warn!("watch stream error: {}", err);
                        return None;
                    }
                },
                _ = self.token.cancelled() => return None,
            };
            match serde_json::from_slice::<WatchEnvelope>(&chunk) {
                Ok(envelope) => return Some(envelope.result),
                Err(err) => warn!("watch chunk did not decode: {}", err),
            }
        }
    }
}
