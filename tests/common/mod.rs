//! Shared fixtures: in-process stand-ins for the sidecar and the matchmaking
//! service, served by actix-web on ephemeral ports.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use dashmap::DashMap;
use parking_lot::Mutex;

use gameserver_sdk::{
    Config, MatchClient, Shutdown, SidecarClient, Transport, APP_ID_KEY, APP_SECRET_KEY,
    CONFIG_ID_KEY, REGION_ID_KEY, ROOM_ID_KEY,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// mock sidecar

#[derive(Default)]
pub struct SidecarState {
    pub labels: DashMap<String, String>,
    pub envs: DashMap<String, String>,
    pub address: Mutex<String>,
    pub ports: Mutex<Vec<(String, u16)>>,
    /// `/gameserver` answers 503 while this is above zero, decrementing once
    /// per hit.
    pub fail_gameserver: AtomicUsize,
    pub gameserver_hits: AtomicUsize,
    pub health_hits: AtomicUsize,
    /// (path, body) of every accepted command POST.
    pub commands: Mutex<Vec<(String, String)>>,
    /// (path, key, value) of every metadata PUT.
    pub metadata: Mutex<Vec<(String, String, String)>>,
    /// Snapshots pushed, one chunk each, to a `/watch/gameserver` subscriber.
    pub watch_snapshots: Mutex<Vec<serde_json::Value>>,
    /// Authorization header values seen on `/gameserver`, raw. The SDK must
    /// never send credentials here.
    pub seen_auth: Mutex<Vec<String>>,
}

impl SidecarState {
    pub fn snapshot_json(&self) -> serde_json::Value {
        let labels: HashMap<String, String> = self
            .labels
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let envs: HashMap<String, String> = self
            .envs
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let ports: Vec<serde_json::Value> = self
            .ports
            .lock()
            .iter()
            .map(|(name, port)| serde_json::json!({"name": name, "port": port}))
            .collect();
        serde_json::json!({
            "object_meta": {"name": "gs-1", "labels": labels, "annotations": {}},
            "spec": {"env": envs},
            "status": {
                "state": "Ready",
                "address": *self.address.lock(),
                "ports": ports,
            },
        })
    }

    pub fn command_count(&self, path: &str) -> usize {
        self.commands.lock().iter().filter(|(p, _)| p == path).count()
    }
}

async fn get_gameserver(req: HttpRequest, state: web::Data<SidecarState>) -> HttpResponse {
    state.gameserver_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(auth) = req.headers().get("Authorization") {
        state
            .seen_auth
            .lock()
            .push(auth.to_str().unwrap_or("").to_string());
    }
    if state.fail_gameserver.load(Ordering::SeqCst) > 0 {
        state.fail_gameserver.fetch_sub(1, Ordering::SeqCst);
        return HttpResponse::ServiceUnavailable().body("sidecar not ready");
    }
    HttpResponse::Ok().json(state.snapshot_json())
}

async fn accept_command(
    req: HttpRequest,
    state: web::Data<SidecarState>,
    body: web::Bytes,
) -> HttpResponse {
    let path = req.path().to_string();
    if path == "/health" {
        state.health_hits.fetch_add(1, Ordering::SeqCst);
    }
    state
        .commands
        .lock()
        .push((path, String::from_utf8_lossy(&body).to_string()));
    HttpResponse::Ok().body("{}")
}

#[derive(serde::Deserialize)]
struct KeyValueBody {
    key: String,
    value: String,
}

async fn put_metadata(
    req: HttpRequest,
    state: web::Data<SidecarState>,
    body: web::Json<KeyValueBody>,
) -> HttpResponse {
    if req.path().ends_with("label") {
        state.labels.insert(body.key.clone(), body.value.clone());
    }
    state
        .metadata
        .lock()
        .push((req.path().to_string(), body.key.clone(), body.value.clone()));
    HttpResponse::Ok().body("{}")
}

async fn watch_gameserver(state: web::Data<SidecarState>) -> HttpResponse {
    let snapshots = state.watch_snapshots.lock().clone();
    let stream = futures_util::stream::unfold(snapshots.into_iter(), |mut iter| async move {
        let snapshot = iter.next()?;
        // Small gap so every envelope lands in its own chunk.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let chunk = serde_json::to_vec(&serde_json::json!({"result": snapshot})).unwrap();
        Some((Ok::<_, std::io::Error>(web::Bytes::from(chunk)), iter))
    });
    HttpResponse::Ok().streaming(stream)
}

/// Starts the mock sidecar; returns its base address.
pub fn spawn_sidecar(state: Arc<SidecarState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    let data = web::Data::from(state);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/gameserver", web::get().to(get_gameserver))
            .route("/watch/gameserver", web::get().to(watch_gameserver))
            .route("/metadata/label", web::put().to(put_metadata))
            .route("/metadata/annotation", web::put().to(put_metadata))
            .route("/ready", web::post().to(accept_command))
            .route("/shutdown", web::post().to(accept_command))
            .route("/allocate", web::post().to(accept_command))
            .route("/health", web::post().to(accept_command))
            .route("/reserve", web::post().to(accept_command))
            .route("/acquire-cpu", web::post().to(accept_command))
    })
    .workers(1)
    .disable_signals()
    .listen(listener)
    .unwrap()
    .run();
    tokio::spawn(server);
    address
}

// ---------------------------------------------------------------------------
// mock matchmaker

#[derive(Clone)]
pub enum MatchReply {
    Record {
        updated_at: i64,
        match_properties: String,
    },
    Error {
        status: u16,
        message: String,
    },
}

#[derive(Default)]
pub struct MatchState {
    /// Scripted answers for GET `/v1/backfill`. The last entry repeats
    /// forever once the queue is down to one.
    pub replies: Mutex<VecDeque<MatchReply>>,
    pub get_hits: AtomicUsize,
    pub start_hits: AtomicUsize,
    pub stop_hits: AtomicUsize,
    pub start_bodies: Mutex<Vec<serde_json::Value>>,
    pub auth_headers: Mutex<Vec<String>>,
    pub stop_queries: Mutex<Vec<String>>,
}

impl MatchState {
    pub fn script(replies: Vec<MatchReply>) -> Arc<Self> {
        let state = Self::default();
        *state.replies.lock() = replies.into();
        Arc::new(state)
    }
}

fn record_auth(req: &HttpRequest, state: &MatchState) {
    let auth = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    state.auth_headers.lock().push(auth);
}

fn error_json(status: u16, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "reservedHttpStatusCode": status,
        "message": message,
        "code": 1000 + i64::from(status),
        "details": [],
    });
    HttpResponse::build(StatusCode::from_u16(status).unwrap()).json(body)
}

fn backfill_json(updated_at: i64, match_properties: &str) -> serde_json::Value {
    serde_json::json!({
        "appId": "app-1",
        "configId": "cfg-1",
        "roomId": "room-1",
        "regionId": "cn-north",
        "matchProperties": match_properties,
        "createdAt": 1,
        "updatedAt": updated_at,
    })
}

async fn get_backfill(req: HttpRequest, state: web::Data<MatchState>) -> HttpResponse {
    state.get_hits.fetch_add(1, Ordering::SeqCst);
    record_auth(&req, &state);
    let reply = {
        let mut replies = state.replies.lock();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    };
    match reply {
        Some(MatchReply::Record {
            updated_at,
            match_properties,
        }) => HttpResponse::Ok().json(backfill_json(updated_at, &match_properties)),
        Some(MatchReply::Error { status, message }) => error_json(status, &message),
        None => error_json(404, "backfill not found"),
    }
}

async fn start_backfill(
    req: HttpRequest,
    state: web::Data<MatchState>,
    body: web::Bytes,
) -> HttpResponse {
    state.start_hits.fetch_add(1, Ordering::SeqCst);
    record_auth(&req, &state);
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => {
            state.start_bodies.lock().push(value);
            HttpResponse::Ok().body("{}")
        }
        Err(_) => error_json(400, "malformed backfill"),
    }
}

async fn stop_backfill(req: HttpRequest, state: web::Data<MatchState>) -> HttpResponse {
    state.stop_hits.fetch_add(1, Ordering::SeqCst);
    record_auth(&req, &state);
    state.stop_queries.lock().push(req.query_string().to_string());
    HttpResponse::Ok().json(backfill_json(99, "[]"))
}

/// Starts the mock matchmaker; returns its base address.
pub fn spawn_matchmaker(state: Arc<MatchState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    let data = web::Data::from(state);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/v1/backfill", web::get().to(get_backfill))
            .route("/v1/backfill/start", web::post().to(start_backfill))
            .route("/v1/backfill/stop", web::delete().to(stop_backfill))
    })
    .workers(1)
    .disable_signals()
    .listen(listener)
    .unwrap()
    .run();
    tokio::spawn(server);
    address
}

// ---------------------------------------------------------------------------
// client stack under test

pub struct TestStack {
    pub shutdown: Shutdown,
    pub sidecar: SidecarClient,
    pub matchmaker: MatchClient,
}

/// Test config with cadences shortened so no test sleeps for wall-clock
/// seconds; production defaults keep the 1s timings.
pub fn test_config(sidecar_address: &str, match_address: &str) -> Config {
    Config {
        sidecar_address: sidecar_address.to_string(),
        match_address: match_address.to_string(),
        health_enabled: false,
        retry_delay: Duration::from_millis(10),
        poll_interval: Duration::from_millis(20),
        request_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

pub fn build_stack(config: &Config) -> TestStack {
    let shutdown = Shutdown::new();
    let transport = Arc::new(
        Transport::new(&config.match_address, config.request_timeout, shutdown.token()).unwrap(),
    );
    let sidecar = SidecarClient::new(Arc::clone(&transport), config);
    let matchmaker = MatchClient::new(transport, sidecar.clone(), config);
    TestStack {
        shutdown,
        sidecar,
        matchmaker,
    }
}

/// Seeds the label/env keys the matchmaking operations require.
pub fn seed_match_keys(state: &SidecarState) {
    state.labels.insert(APP_ID_KEY.to_string(), "app-1".to_string());
    state
        .envs
        .insert(APP_SECRET_KEY.to_string(), "s3cret".to_string());
    state
        .envs
        .insert(CONFIG_ID_KEY.to_string(), "cfg-1".to_string());
    state.envs.insert(ROOM_ID_KEY.to_string(), "room-1".to_string());
    state
        .envs
        .insert(REGION_ID_KEY.to_string(), "cn-north".to_string());
}
