use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::Uri;
use serde::{Deserialize, Serialize};

use blockfront_core::net::protocol::PROTOCOL_VERSION;
use blockfront_core::time::now_millis;

use crate::error::AppError;
use crate::state::AppState;

/// Name reported by `/health` and `/status`; the startup probe matches on it.
pub const SERVICE_NAME: &str = "blockfront";

/// Occupancy of the well-known room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomLoad {
    Empty,
    Active,
    Full,
}

impl RoomLoad {
    pub fn classify(players: usize, capacity: usize) -> Self {
        if players == 0 {
            Self::Empty
        } else if players >= capacity {
            Self::Full
        } else {
            Self::Active
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub rooms: usize,
    pub online: usize,
    pub global_players: usize,
    pub global_capacity: usize,
    pub global_state: RoomLoad,
    pub now: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub protocol_version: u8,
    pub uptime_secs: u64,
}

/// Liveness plus occupancy of the well-known room.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let rooms = state.rooms.read().await;
    let code = rooms.default_room_code();
    let players = rooms.room_player_count(code);
    let capacity = rooms.capacity();

    Json(HealthResponse {
        ok: true,
        service: SERVICE_NAME,
        rooms: rooms.room_count(),
        online: rooms.online(),
        global_players: players,
        global_capacity: capacity,
        global_state: RoomLoad::classify(players, capacity),
        now: now_millis(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        ok: true,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: PROTOCOL_VERSION,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

/// How long the startup probe waits for an existing instance to answer.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Deserialize)]
struct HealthProbe {
    service: String,
}

/// Ask whatever is serving `base_url` whether it is a Blockfront server.
pub async fn probe_compatible_instance(base_url: &str) -> bool {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build probe client");
            return false;
        },
    };
    let resp = match client.get(format!("{base_url}/health")).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::debug!(status = %r.status(), "Health probe got an error status");
            return false;
        },
        Err(e) => {
            tracing::debug!(error = %e, "Health probe failed");
            return false;
        },
    };
    resp.json::<HealthProbe>()
        .await
        .is_ok_and(|probe| probe.service == SERVICE_NAME)
}
