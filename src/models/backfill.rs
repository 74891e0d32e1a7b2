// src/models/backfill.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// A matchmaking ticket-aggregation record. Created on backfill start,
/// mutated server-side, polled read-only by the watcher. `updated_at` is the
/// change watermark and is monotonically non-decreasing for a given room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Backfill {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub app_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub config_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip: String,
    /// Comma-joined `name/port` pairs, e.g. `game/7777,query/7778`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub game_ports: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub room_id: String,
    /// Opaque JSON blob holding the serialized [`Team`] roster.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub match_properties: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region_id: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub created_at: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub updated_at: i64,
}

impl Backfill {
    /// Decodes the opaque match-properties payload into the team roster.
    pub fn teams(&self) -> Result<Vec<Team>, serde_json::Error> {
        serde_json::from_str(&self.match_properties)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Team {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub team_definition_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub team_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ticket {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<Player>,
    #[serde(skip_serializing_if = "is_zero")]
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

/// Error envelope returned by the matchmaking service. Diagnostic only; the
/// watcher inspects `message` for the "backfill not found" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerError {
    #[serde(rename = "reservedHttpStatusCode")]
    pub http_status_code: i32,
    pub message: String,
    pub code: i32,
    pub details: Vec<ErrorDetail>,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpCode:{}, Message:{}", self.http_status_code, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    pub field: String,
    pub reason: String,
}
