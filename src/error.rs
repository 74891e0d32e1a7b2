// src/error.rs
use std::fmt;

use crate::models::backfill::ServerError;

/// Sentinel substring the matchmaking service puts in its error message when
/// no backfill exists for the room.
const NOT_FOUND_SENTINEL: &str = "backfill not found";

/// A request that never produced an HTTP response. Distinct from a server
/// that answered with a non-200 status; callers such as `connect` depend on
/// telling the two apart.
#[derive(Debug)]
pub enum TransportError {
    /// The owning context was torn down before or during the call.
    Cancelled,
    Timeout(String),
    Network(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "request cancelled by shutdown"),
            Self::Timeout(msg) => write!(f, "request timed out: {}", msg),
            Self::Network(msg) => write!(f, "network error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Domain-level failures of the backfill API. Returned as values, never
/// panicked; callers inspect these alongside the primary result.
#[derive(Debug)]
pub enum BackfillError {
    /// A required key is absent from the merged label/env mapping. Raised
    /// before any network call is made.
    MissingKey(&'static str),
    /// The sidecar had no game-server snapshot to report.
    NoGameServer,
    /// The game server has no public address yet, so a backfill cannot be
    /// started for it.
    NoAddress,
    /// The matchmaking service reports no backfill for this room. The watcher
    /// treats this as clean termination.
    NotFound,
    /// Structured error payload decoded from the matchmaking service.
    Server(ServerError),
    /// The service answered 200 but the body did not decode.
    Decode(String),
    /// The match-properties payload did not decode into a usable roster.
    InvalidProperties(String),
    Transport(TransportError),
}

impl BackfillError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Maps a non-200 matchmaking response body to a domain error, spotting
    /// the not-found sentinel in the decoded message.
    pub(crate) fn from_server_payload(body: &str) -> Self {
        match serde_json::from_str::<ServerError>(body) {
            Ok(err) if err.message.contains(NOT_FOUND_SENTINEL) => Self::NotFound,
            Ok(err) => Self::Server(err),
            Err(_) => Self::Server(ServerError {
                message: body.to_string(),
                ..ServerError::default()
            }),
        }
    }
}

impl fmt::Display for BackfillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey(key) => {
                write!(f, "missing matchmaking related label/env key: {}", key)
            }
            Self::NoGameServer => write!(f, "failed to get game server snapshot"),
            Self::NoAddress => write!(f, "game server has no address yet"),
            Self::NotFound => write!(f, "backfill not found"),
            Self::Server(err) => write!(f, "matchmaking service error: {}", err),
            Self::Decode(msg) => write!(f, "failed to decode backfill response: {}", msg),
            Self::InvalidProperties(msg) => {
                write!(f, "failed to convert match properties: {}", msg)
            }
            Self::Transport(err) => write!(f, "transport failure: {}", err),
        }
    }
}

impl std::error::Error for BackfillError {}

impl From<TransportError> for BackfillError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}
