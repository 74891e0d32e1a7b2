// src/matchmaker.rs
use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;

use crate::config::Config;
use crate::error::BackfillError;
use crate::models::backfill::{Backfill, Team};
use crate::models::gameserver::GameServer;
use crate::shutdown::ShutdownToken;
use crate::sidecar::SidecarClient;
use crate::transport::{Method, Transport};

// Label/env keys the matchmaking integration contract defines.
pub const MATCH_PROPERTIES_KEY: &str = "MATCH_PROPERTIES";
pub const ROOM_ID_KEY: &str = "ROOM_ID";
pub const APP_ID_KEY: &str = "UOS_APP_ID";
pub const APP_SECRET_KEY: &str = "UOS_APP_SECRET";
pub const CONFIG_ID_KEY: &str = "MATCH_CONFIG_ID";
pub const REGION_ID_KEY: &str = "REGION_ID";

/// Typed wrapper over [`Transport`] for the remote matchmaking service.
/// Credentials are Basic auth built from `UOS_APP_ID:UOS_APP_SECRET` in the
/// merged label/env mapping. Missing required keys short-circuit into a
/// domain error before any network call.
#[derive(Clone)]
pub struct MatchClient {
    transport: Arc<Transport>,
    sidecar: SidecarClient,
    address: String,
}

impl MatchClient {
    pub fn new(transport: Arc<Transport>, sidecar: SidecarClient, config: &Config) -> Self {
        Self {
            transport,
            sidecar,
            address: config.match_address.trim_end_matches('/').to_string(),
        }
    }

    /// Starts a backfill so matchmaking keeps seeking players for this
    /// already-running match.
    pub async fn start_backfill(&self, teams: &[Team]) -> Result<(), BackfillError> {
        let snapshot = self
            .sidecar
            .game_server()
            .await?
            .ok_or(BackfillError::NoGameServer)?;
        if snapshot.status.address.is_empty() {
            return Err(BackfillError::NoAddress);
        }

        let label_envs = snapshot.label_envs();
        let app_id = require(&label_envs, APP_ID_KEY)?;
        let config_id = require(&label_envs, CONFIG_ID_KEY)?;
        let room_id = require(&label_envs, ROOM_ID_KEY)?;
        let region_id = require(&label_envs, REGION_ID_KEY)?;

        let backfill = Backfill {
            app_id: app_id.to_string(),
            config_id: config_id.to_string(),
            room_id: room_id.to_string(),
            region_id: region_id.to_string(),
            ip: snapshot.status.address.clone(),
            game_ports: join_ports(&snapshot),
            match_properties: serde_json::to_string(teams)
                .map_err(|err| BackfillError::InvalidProperties(err.to_string()))?,
            ..Backfill::default()
        };
        let body = serde_json::to_string(&backfill)
            .map_err(|err| BackfillError::Decode(err.to_string()))?;

        debug!("starting backfill for room {}", backfill.room_id);
        let reply = self
            .transport
            .send(
                &self.address,
                "/v1/backfill/start",
                &body,
                Some(&auth_header(&label_envs)),
                Method::Post,
            )
            .await?;
        if !reply.ok {
            return Err(BackfillError::from_server_payload(&reply.body));
        }
        Ok(())
    }

    /// Fetches the current backfill record for this room.
    pub async fn get_backfill(&self) -> Result<Backfill, BackfillError> {
        let label_envs = self.label_envs().await?;
        require(&label_envs, CONFIG_ID_KEY)?;
        let room_id = require(&label_envs, ROOM_ID_KEY)?;

        let path = format!("/v1/backfill?roomId={}", room_id);
        let reply = self
            .transport
            .send(
                &self.address,
                &path,
                "",
                Some(&auth_header(&label_envs)),
                Method::Get,
            )
            .await?;
        if !reply.ok {
            return Err(BackfillError::from_server_payload(&reply.body));
        }
        serde_json::from_str(&reply.body).map_err(|err| BackfillError::Decode(err.to_string()))
    }

    /// Stops the backfill. The query carries the resolved room id, mirroring
    /// `get_backfill`.
    pub async fn stop_backfill(&self) -> Result<Backfill, BackfillError> {
        let label_envs = self.label_envs().await?;
        require(&label_envs, CONFIG_ID_KEY)?;
        let room_id = require(&label_envs, ROOM_ID_KEY)?;

        let path = format!("/v1/backfill/stop?roomId={}", room_id);
        let reply = self
            .transport
            .send(
                &self.address,
                &path,
                "",
                Some(&auth_header(&label_envs)),
                Method::Delete,
            )
            .await?;
        if !reply.ok {
            return Err(BackfillError::from_server_payload(&reply.body));
        }
        serde_json::from_str(&reply.body).map_err(|err| BackfillError::Decode(err.to_string()))
    }

    /// Team roster from the `MATCH_PROPERTIES` label/env. Usable before a
    /// backfill has been started.
    pub async fn match_properties(&self) -> Result<Vec<Team>, BackfillError> {
        let label_envs = self.label_envs().await?;
        decode_roster(&label_envs)
    }

    /// Same as [`MatchClient::match_properties`], from an already-fetched
    /// snapshot.
    pub fn match_properties_of(&self, snapshot: &GameServer) -> Result<Vec<Team>, BackfillError> {
        decode_roster(&snapshot.label_envs())
    }

    /// Team roster taken from the live backfill record.
    pub async fn match_properties_from_backfill(&self) -> Result<Vec<Team>, BackfillError> {
        let backfill = self.get_backfill().await?;
        backfill
            .teams()
            .map_err(|err| BackfillError::InvalidProperties(err.to_string()))
    }

    async fn label_envs(&self) -> Result<HashMap<String, String>, BackfillError> {
        self.sidecar
            .label_envs()
            .await?
            .ok_or(BackfillError::NoGameServer)
    }

    pub(crate) fn token(&self) -> &ShutdownToken {
        self.transport.token()
    }
}

fn require<'a>(
    label_envs: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, BackfillError> {
    label_envs
        .get(key)
        .map(String::as_str)
        .ok_or(BackfillError::MissingKey(key))
}

fn decode_roster(label_envs: &HashMap<String, String>) -> Result<Vec<Team>, BackfillError> {
    let raw = require(label_envs, MATCH_PROPERTIES_KEY)?;
    serde_json::from_str(raw).map_err(|err| BackfillError::InvalidProperties(err.to_string()))
}

fn auth_header(label_envs: &HashMap<String, String>) -> String {
    let app_id = label_envs.get(APP_ID_KEY).map(String::as_str).unwrap_or("");
    let secret = label_envs
        .get(APP_SECRET_KEY)
        .map(String::as_str)
        .unwrap_or("");
    let credentials = format!("{}:{}", app_id, secret);
    format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
}

fn join_ports(snapshot: &GameServer) -> String {
    snapshot
        .status
        .ports
        .iter()
        .map(|p| format!("{}/{}", p.name, p.port))
        .collect::<Vec<_>>()
        .join(",")
}
