use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use blockfront_core::net::messages::{AckMsg, AckPayload, ClientMessage, JoinMsg, ServerMessage};
use blockfront_core::net::protocol::{decode_server_message, encode_client_message};
use blockfront_core::player::PlayerId;
use blockfront_ctf::CtfConfig;

use blockfront_server::config::ServerConfig;
use blockfront_server::router;
use blockfront_server::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default config.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server whose rooms hold at most `capacity` players.
    pub async fn with_capacity(capacity: usize) -> Self {
        let mut config = ServerConfig::default();
        config.rooms.capacity = capacity;
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = AppState::with_ctf_config(config, CtfConfig::default());
        let app = router(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Send pre-encoded bytes as one binary frame.
pub async fn ws_send_raw(stream: &mut WsStream, data: Vec<u8>) {
    stream.send(Message::Binary(data.into())).await.unwrap();
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Skip messages until one satisfies `pred` (5s timeout per message).
pub async fn ws_read_until(
    stream: &mut WsStream,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let msg = ws_read_server_msg(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
}

/// Read everything that arrives within `quiet_ms` of the previous message.
pub async fn ws_drain(stream: &mut WsStream, quiet_ms: u64) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Some(data) = ws_try_read_raw(stream, quiet_ms).await {
        out.push(decode_server_message(&data).unwrap());
    }
    out
}

/// Wait for the `Ack` answering `request_id`.
pub async fn ws_read_ack(stream: &mut WsStream, request_id: u32) -> AckMsg {
    match ws_read_until(
        stream,
        |m| matches!(m, ServerMessage::Ack(a) if a.request_id == request_id),
    )
    .await
    {
        ServerMessage::Ack(ack) => ack,
        other => panic!("Expected Ack, got: {other:?}"),
    }
}

/// Join the well-known room and return the ack.
pub async fn ws_join(stream: &mut WsStream, request_id: u32, name: &str) -> AckMsg {
    let msg = ClientMessage::Join(JoinMsg {
        request_id,
        name: Some(name.to_string()),
    });
    ws_send_client_msg(stream, &msg).await;
    ws_read_ack(stream, request_id).await
}

/// Connect and join; returns the stream and the assigned player id.
pub async fn ws_connect_joined(server: &TestServer, name: &str) -> (WsStream, PlayerId) {
    let mut stream = ws_connect(&server.ws_url()).await;
    let ack = ws_join(&mut stream, 1, name).await;
    assert!(ack.ok, "Expected successful join: {ack:?}");
    let view = match ack.payload {
        Some(AckPayload::Room(view)) => view,
        other => panic!("Expected room payload, got: {other:?}"),
    };
    let id = view
        .players
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.id)
        .unwrap();
    (stream, id)
}
