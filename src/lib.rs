//! SDK for dedicated game servers running next to an orchestration sidecar.
//!
//! The sidecar exposes the game-server lifecycle over a local HTTP API
//! ([`SidecarClient`]); a remote matchmaking service manages backfill —
//! open matchmaking slots for an already-running match ([`MatchClient`]).
//! [`BackfillWatcher`] polls the backfill record and fans out change
//! notifications exactly once per observed `updatedAt` watermark move, and
//! [`HealthLoop`] keeps the liveness signal flowing. [`Sdk`] wires it all
//! together with one cooperative shutdown signal.

mod config;
mod error;
mod health;
mod matchmaker;
mod models;
mod sdk;
mod shutdown;
mod sidecar;
mod transport;
mod watcher;

pub use config::{
    Config, DEFAULT_MATCH_ADDRESS, DEFAULT_SIDECAR_PORT, MAX_HEALTH_INTERVAL,
    MIN_HEALTH_INTERVAL,
};
pub use error::{BackfillError, TransportError};
pub use health::HealthLoop;
pub use matchmaker::{
    MatchClient, APP_ID_KEY, APP_SECRET_KEY, CONFIG_ID_KEY, MATCH_PROPERTIES_KEY, REGION_ID_KEY,
    ROOM_ID_KEY,
};
pub use models::backfill::{Backfill, ErrorDetail, Player, ServerError, Team, Ticket};
pub use models::gameserver::{
    GameServer, GameServerPort, GameServerSpec, GameServerState, GameServerStatus, ObjectMeta,
};
pub use sdk::Sdk;
pub use shutdown::{Shutdown, ShutdownToken};
pub use sidecar::{GameServerWatch, SidecarClient};
pub use transport::{Method, Reply, Transport};
pub use watcher::{BackfillWatcher, ObserverHandle, WatchState};
