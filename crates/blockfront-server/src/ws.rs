use axum::extract::ws::{Message, WebSocket};
use axum::extract::{FromRequest, State, WebSocketUpgrade};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use blockfront_core::net::messages::{AckMsg, AckPayload, ClientMessage};
use blockfront_core::net::protocol::{
    MAX_MESSAGE_SIZE, decode_client_message, decode_message_type, decode_payload,
};
use blockfront_core::objective::ResetReason;
use blockfront_core::player::PlayerId;
use blockfront_core::time::now_millis;

use crate::broadcast;
use crate::error::RoomError;
use crate::room_manager::RoomRegistry;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !state.config.origin_allowed(origin) {
            tracing::warn!(origin, "Rejected WS upgrade from disallowed origin");
            return Err(StatusCode::FORBIDDEN);
        }
    }

    let max_ws = state.config.limits.max_ws_connections;
    let Some(guard) = ConnectionGuard::try_acquire(&state.ws_connection_count, max_ws) else {
        tracing::warn!(max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    // Perform WebSocket upgrade manually
    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, guard))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);

    let conn_id = state.rooms.write().await.register_connection(tx);
    tracing::info!(conn_id, "Connection opened");

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, conn_id).await;

    // Disconnected: same cleanup as an explicit leave, at most once.
    let now = now_millis();
    let mut rooms = state.rooms.write().await;
    if let Some(departure) = rooms.drop_connection(conn_id, now) {
        broadcast::departure(&mut rooms, departure, now);
    }
    drop(rooms);

    tracing::info!(conn_id, "Connection closed");
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Just enough of an acknowledged request to answer it when the rest of the
/// payload does not decode.
#[derive(Deserialize)]
struct RequestId {
    request_id: u32,
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    conn_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(conn_id, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let Ok(msg_type) = decode_message_type(&data) else {
            continue;
        };

        let msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(conn_id, ?msg_type, error = %e, "Dropped malformed message");
                if msg_type.is_acknowledged()
                    && let Ok(req) = decode_payload::<RequestId>(&data)
                {
                    let rooms = state.rooms.read().await;
                    let ack = AckMsg::err(req.request_id, "Malformed request");
                    broadcast::ack(&rooms, conn_id, ack);
                }
                continue;
            },
        };

        let mut rooms = state.rooms.write().await;
        dispatch(&mut rooms, conn_id, msg, now_millis());
    }
}

/// Answer a failed acknowledged request with its error text.
fn reject(rooms: &RoomRegistry, conn_id: PlayerId, request_id: u32, err: &RoomError) {
    tracing::debug!(conn_id, request_id, error = %err, "Request rejected");
    broadcast::ack(rooms, conn_id, AckMsg::err(request_id, err.to_string()));
}

/// Apply one client event and fan out its consequences.
fn dispatch(rooms: &mut RoomRegistry, conn_id: PlayerId, msg: ClientMessage, now: u64) {
    match msg {
        ClientMessage::Join(join) => {
            let result = rooms.join(conn_id, join.name.as_deref(), now);
            broadcast::pruned(rooms);
            match result {
                Ok(outcome) => {
                    let payload = AckPayload::Room(Box::new(outcome.view.clone()));
                    broadcast::ack(rooms, conn_id, AckMsg::ok(join.request_id, Some(payload)));
                    broadcast::joined(rooms, outcome, now);
                },
                Err(e) => reject(rooms, conn_id, join.request_id, &e),
            }
        },
        ClientMessage::Leave(leave) => match rooms.leave(conn_id, ResetReason::Leave, now) {
            Ok(departure) => {
                let payload = AckPayload::Left {
                    room_code: departure.room_code.clone(),
                };
                broadcast::ack(rooms, conn_id, AckMsg::ok(leave.request_id, Some(payload)));
                broadcast::departure(rooms, departure, now);
            },
            Err(e) => reject(rooms, conn_id, leave.request_id, &e),
        },
        ClientMessage::SetTeam(req) => match rooms.set_team(conn_id, req.team.as_deref(), now) {
            Ok(change) => {
                broadcast::ack(rooms, conn_id, AckMsg::ok(req.request_id, None));
                broadcast::team_change(rooms, change);
            },
            Err(e) => reject(rooms, conn_id, req.request_id, &e),
        },
        ClientMessage::StartMatch(req) => {
            let result = rooms.start_match(conn_id, now);
            broadcast::pruned(rooms);
            match result {
                Ok(started) => {
                    broadcast::ack(rooms, conn_id, AckMsg::ok(req.request_id, None));
                    broadcast::match_start(rooms, &started);
                },
                Err(e) => reject(rooms, conn_id, req.request_id, &e),
            }
        },
        ClientMessage::RequestSnapshot(req) => match rooms.snapshot(conn_id) {
            Ok(snapshot) => {
                let payload = AckPayload::Snapshot(Box::new(snapshot));
                broadcast::ack(rooms, conn_id, AckMsg::ok(req.request_id, Some(payload)));
            },
            Err(e) => reject(rooms, conn_id, req.request_id, &e),
        },
        ClientMessage::RequestRoomList(_) => broadcast::room_list_to(rooms, conn_id, now),
        ClientMessage::PositionSync(raw) => {
            if let Some((code, sync)) = rooms.sync_position(conn_id, &raw, now) {
                broadcast::player_sync(rooms, &code, sync);
            }
        },
        ClientMessage::BlockEdit(raw) => {
            if let Some((code, edit)) = rooms.block_edit(conn_id, &raw, now) {
                broadcast::block_update(rooms, &code, conn_id, edit);
            }
        },
        ClientMessage::Shoot(raw) => {
            if let Some((code, outcome)) = rooms.shoot(conn_id, &raw, now) {
                broadcast::pvp_damage(rooms, &code, outcome);
            }
        },
        ClientMessage::Chat(raw) => {
            if let Some((code, msg)) = rooms.chat(conn_id, &raw, now) {
                broadcast::chat(rooms, &code, msg);
            }
        },
    }
}
