// src/models/gameserver.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle phase the orchestrator reports for the managed game server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameServerState {
    Scheduled,
    RequestReady,
    Ready,
    Allocated,
    Reserved,
    Shutdown,
    Unhealthy,
    /// Any state this SDK version does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub resource_version: String,
    pub generation: i64,
    pub creation_timestamp: i64,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameServerSpec {
    /// Environment variables injected into the game-server container.
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameServerPort {
    pub name: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameServerStatus {
    pub state: GameServerState,
    pub address: String,
    pub ports: Vec<GameServerPort>,
}

/// Immutable snapshot of the managed game server. Replaced wholesale on each
/// fetch or watch push; never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameServer {
    pub object_meta: ObjectMeta,
    pub spec: GameServerSpec,
    pub status: GameServerStatus,
}

impl GameServer {
    /// Labels and spec environment merged into one mapping. Env entries are
    /// layered after labels, so a key present in both resolves to the env
    /// value. Callers rely on this override order.
    pub fn label_envs(&self) -> HashMap<String, String> {
        let mut merged = self.object_meta.labels.clone();
        for (key, value) in &self.spec.env {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}
