#[allow(dead_code)]
mod common;

use blockfront_core::block::BlockAction;
use blockfront_core::net::messages::{
    AckPayload, BlockEditMsg, ChatMsg, ClientMessage, LeaveMsg, MessageType, RequestSnapshotMsg,
    ServerMessage, SetTeamMsg, ShootMsg, StartMatchMsg,
};
use blockfront_core::net::protocol::encode_message;
use blockfront_core::objective::{CtfEvent, ResetReason};
use blockfront_core::player::PlayerId;
use blockfront_core::validation::Loose;
use common::{
    TestServer, WsStream, ws_connect, ws_connect_joined, ws_drain, ws_join, ws_read_ack,
    ws_read_until, ws_send_client_msg, ws_send_raw, ws_try_read_raw,
};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

async fn set_team(stream: &mut WsStream, request_id: u32, team: &str) {
    let msg = ClientMessage::SetTeam(SetTeamMsg {
        request_id,
        team: Some(team.to_string()),
    });
    ws_send_client_msg(stream, &msg).await;
    let ack = ws_read_ack(stream, request_id).await;
    assert!(ack.ok, "Expected team change to succeed: {ack:?}");
}

fn shoot(target: PlayerId) -> ClientMessage {
    ClientMessage::Shoot(ShootMsg {
        target_id: Some(Loose::Int(target as i64)),
    })
}

fn place(x: i64, y: i64, z: i64, type_id: i64) -> ClientMessage {
    ClientMessage::BlockEdit(BlockEditMsg {
        action: Some("place".into()),
        x: Some(Loose::Int(x)),
        y: Some(Loose::Int(y)),
        z: Some(Loose::Int(z)),
        type_id: Some(Loose::Int(type_id)),
    })
}

#[tokio::test]
async fn join_acks_with_room_view() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    let ack = ws_join(&mut stream, 7, "  Alice ").await;
    assert!(ack.ok);
    assert_eq!(ack.request_id, 7);
    match ack.payload {
        Some(AckPayload::Room(view)) => {
            assert_eq!(view.code, "arena");
            assert_eq!(view.capacity, 50);
            assert_eq!(view.players.len(), 1);
            assert_eq!(view.players[0].name, "Alice");
            assert_eq!(view.host_id, Some(view.players[0].id));
            assert_eq!(view.players[0].hp, 100);
        },
        other => panic!("Expected room payload, got: {other:?}"),
    }

    // Followed by the roster push and the room list
    let update = ws_read_until(&mut stream, |m| {
        matches!(m, ServerMessage::RoomUpdate(_))
    })
    .await;
    assert!(matches!(update, ServerMessage::RoomUpdate(u) if u.room.players.len() == 1));
}

#[tokio::test]
async fn second_join_updates_first_member() {
    let server = TestServer::new().await;
    let (mut alice, _) = ws_connect_joined(&server, "Alice").await;
    ws_drain(&mut alice, 100).await;

    let (_bob, bob_id) = ws_connect_joined(&server, "Bob").await;

    let msg = ws_read_until(&mut alice, |m| matches!(m, ServerMessage::RoomUpdate(_))).await;
    match msg {
        ServerMessage::RoomUpdate(update) => {
            assert_eq!(update.room.players.len(), 2);
            assert!(update.room.players.iter().any(|p| p.id == bob_id));
        },
        other => panic!("Expected RoomUpdate, got: {other:?}"),
    }
}

#[tokio::test]
async fn repeated_join_resyncs_without_duplicate() {
    let server = TestServer::new().await;
    let (mut alice, _) = ws_connect_joined(&server, "Alice").await;

    let ack = ws_join(&mut alice, 2, "Alice").await;
    assert!(ack.ok);
    match ack.payload {
        Some(AckPayload::Room(view)) => assert_eq!(view.players.len(), 1),
        other => panic!("Expected room payload, got: {other:?}"),
    }
    assert_eq!(server.state.rooms.read().await.room_player_count("arena"), 1);
}

#[tokio::test]
async fn join_rejected_when_room_full() {
    let server = TestServer::with_capacity(2).await;
    let (_a, _) = ws_connect_joined(&server, "A").await;
    let (_b, _) = ws_connect_joined(&server, "B").await;

    let mut late = ws_connect(&server.ws_url()).await;
    let ack = ws_join(&mut late, 9, "Late").await;
    assert!(!ack.ok);
    assert!(ack.error.unwrap().contains("full"));
    assert_eq!(server.state.rooms.read().await.room_player_count("arena"), 2);
}

#[tokio::test]
async fn block_edit_reaches_others_but_not_sender() {
    let server = TestServer::new().await;
    let (mut alice, alice_id) = ws_connect_joined(&server, "Alice").await;
    let (mut bob, _) = ws_connect_joined(&server, "Bob").await;
    ws_drain(&mut alice, 100).await;
    ws_drain(&mut bob, 100).await;

    ws_send_client_msg(&mut alice, &place(10, 2, -3, 4)).await;

    let msg = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::BlockUpdate(_))).await;
    match msg {
        ServerMessage::BlockUpdate(update) => {
            assert_eq!(update.by_player_id, alice_id);
            assert_eq!(update.mutation.action, BlockAction::Place);
            assert_eq!(update.mutation.type_id, Some(4));
            assert_eq!(update.revision, 3);
        },
        other => panic!("Expected BlockUpdate, got: {other:?}"),
    }

    let echoed = ws_drain(&mut alice, 200).await;
    assert!(
        echoed
            .iter()
            .all(|m| m.message_type() != MessageType::BlockUpdate)
    );

    // The edit is in the next snapshot
    let req = ClientMessage::RequestSnapshot(RequestSnapshotMsg { request_id: 5 });
    ws_send_client_msg(&mut alice, &req).await;
    let ack = ws_read_ack(&mut alice, 5).await;
    match ack.payload {
        Some(AckPayload::Snapshot(snapshot)) => {
            assert_eq!(snapshot.revision, 3);
            assert_eq!(snapshot.blocks.len(), 1);
        },
        other => panic!("Expected snapshot payload, got: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_block_edit_is_dropped_silently() {
    let server = TestServer::new().await;
    let (mut alice, _) = ws_connect_joined(&server, "Alice").await;
    let (mut bob, _) = ws_connect_joined(&server, "Bob").await;
    ws_drain(&mut alice, 100).await;
    ws_drain(&mut bob, 100).await;

    ws_send_client_msg(&mut alice, &place(0, 0, 0, 999)).await;

    assert!(ws_try_read_raw(&mut bob, 200).await.is_none());
    assert!(ws_try_read_raw(&mut alice, 50).await.is_none());
    let rooms = server.state.rooms.read().await;
    assert_eq!(rooms.arena("arena").unwrap().blocks().len(), 0);
}

#[tokio::test]
async fn set_team_rejects_unknown_team() {
    let server = TestServer::new().await;
    let (mut alice, _) = ws_connect_joined(&server, "Alice").await;

    let msg = ClientMessage::SetTeam(SetTeamMsg {
        request_id: 3,
        team: Some("green".into()),
    });
    ws_send_client_msg(&mut alice, &msg).await;
    let ack = ws_read_ack(&mut alice, 3).await;
    assert!(!ack.ok);
    assert!(ack.error.is_some());
}

#[tokio::test]
async fn start_match_requires_both_teams() {
    let server = TestServer::new().await;
    let (mut alice, _) = ws_connect_joined(&server, "Alice").await;
    let (mut bob, _) = ws_connect_joined(&server, "Bob").await;

    let start = ClientMessage::StartMatch(StartMatchMsg { request_id: 10 });
    ws_send_client_msg(&mut alice, &start).await;
    let ack = ws_read_ack(&mut alice, 10).await;
    assert!(!ack.ok, "Teamless player must not start the match");

    set_team(&mut alice, 11, "alpha").await;
    ws_send_client_msg(&mut alice, &ClientMessage::StartMatch(StartMatchMsg { request_id: 12 }))
        .await;
    let ack = ws_read_ack(&mut alice, 12).await;
    assert!(!ack.ok, "One-sided match must not start");

    set_team(&mut bob, 13, "bravo").await;
    ws_send_client_msg(&mut alice, &ClientMessage::StartMatch(StartMatchMsg { request_id: 14 }))
        .await;
    let ack = ws_read_ack(&mut alice, 14).await;
    assert!(ack.ok);

    let msg = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::MatchStart(_))).await;
    match msg {
        ServerMessage::MatchStart(start) => {
            assert_eq!(start.players.len(), 2);
            assert_eq!(start.snapshot.score.alpha, 0);
            assert!(start.snapshot.flags.alpha.is_home());
        },
        other => panic!("Expected MatchStart, got: {other:?}"),
    }
}

#[tokio::test]
async fn three_shots_eliminate_and_score() {
    let server = TestServer::new().await;
    let (mut alice, alice_id) = ws_connect_joined(&server, "Alice").await;
    let (mut bob, bob_id) = ws_connect_joined(&server, "Bob").await;
    set_team(&mut alice, 2, "alpha").await;
    set_team(&mut bob, 2, "bravo").await;
    ws_drain(&mut bob, 100).await;

    let mut hits = Vec::new();
    for _ in 0..3 {
        ws_send_client_msg(&mut alice, &shoot(bob_id)).await;
        match ws_read_until(&mut bob, |m| matches!(m, ServerMessage::PvpDamage(_))).await {
            ServerMessage::PvpDamage(hit) => hits.push(hit),
            other => panic!("Expected PvpDamage, got: {other:?}"),
        }
    }

    assert_eq!(hits[0].hp, 66);
    assert!(!hits[0].killed);
    assert_eq!(hits[1].hp, 32);
    assert!(hits[2].killed);
    assert_eq!(hits[2].hp, 100);
    assert_eq!(hits[2].attacker_id, alice_id);
    assert_eq!(hits[2].score.alpha, 1);
    assert!(hits[0].revision < hits[1].revision && hits[1].revision < hits[2].revision);

    let rooms = server.state.rooms.read().await;
    let arena = rooms.arena("arena").unwrap();
    assert_eq!(arena.player(alice_id).unwrap().kills, 1);
    assert_eq!(arena.player(bob_id).unwrap().deaths, 1);
}

#[tokio::test]
async fn friendly_fire_is_ignored() {
    let server = TestServer::new().await;
    let (mut alice, _) = ws_connect_joined(&server, "Alice").await;
    let (mut bob, bob_id) = ws_connect_joined(&server, "Bob").await;
    set_team(&mut alice, 2, "alpha").await;
    set_team(&mut bob, 2, "alpha").await;
    ws_drain(&mut bob, 100).await;

    ws_send_client_msg(&mut alice, &shoot(bob_id)).await;
    assert!(ws_try_read_raw(&mut bob, 200).await.is_none());
}

#[tokio::test]
async fn carrier_disconnect_returns_flag() {
    let server = TestServer::new().await;
    let (mut alice, alice_id) = ws_connect_joined(&server, "Alice").await;
    let (mut bob, _) = ws_connect_joined(&server, "Bob").await;
    set_team(&mut alice, 2, "alpha").await;

    let home = server.state.rooms.read().await.arena("arena").unwrap().flags().bravo.home;
    let sync = ClientMessage::PositionSync(blockfront_core::net::messages::PositionSyncMsg {
        x: Some(Loose::Float(home.x)),
        y: Some(Loose::Float(home.y + 5.0)),
        z: Some(Loose::Float(home.z)),
        yaw: Some(Loose::Float(0.0)),
        pitch: Some(Loose::Float(0.0)),
    });
    ws_send_client_msg(&mut alice, &sync).await;

    let pickup = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::CtfUpdate(_))).await;
    match pickup {
        ServerMessage::CtfUpdate(update) => {
            assert_eq!(update.flags.bravo.carrier_id, Some(alice_id));
            assert!(matches!(update.events[0], CtfEvent::Pickup { .. }));
        },
        other => panic!("Expected CtfUpdate, got: {other:?}"),
    }

    drop(alice);

    let left = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::PlayerLeft(_))).await;
    assert!(matches!(left, ServerMessage::PlayerLeft(l) if l.player_id == alice_id));
    let reset = ws_read_until(&mut bob, |m| matches!(m, ServerMessage::CtfUpdate(_))).await;
    match reset {
        ServerMessage::CtfUpdate(update) => {
            assert!(update.flags.bravo.is_home());
            assert!(matches!(
                update.events[0],
                CtfEvent::Reset {
                    reason: ResetReason::Disconnect,
                    ..
                }
            ));
        },
        other => panic!("Expected CtfUpdate, got: {other:?}"),
    }
}

#[tokio::test]
async fn leave_then_close_is_processed_once() {
    let server = TestServer::new().await;
    let (mut alice, alice_id) = ws_connect_joined(&server, "Alice").await;
    let (mut bob, _) = ws_connect_joined(&server, "Bob").await;
    ws_drain(&mut bob, 100).await;

    ws_send_client_msg(&mut alice, &ClientMessage::Leave(LeaveMsg { request_id: 4 })).await;
    let ack = ws_read_ack(&mut alice, 4).await;
    assert!(ack.ok);
    assert!(matches!(ack.payload, Some(AckPayload::Left { ref room_code }) if room_code == "arena"));
    drop(alice);

    let msgs = ws_drain(&mut bob, 300).await;
    let lefts = msgs
        .iter()
        .filter(|m| matches!(m, ServerMessage::PlayerLeft(l) if l.player_id == alice_id))
        .count();
    assert_eq!(lefts, 1);
    assert_eq!(server.state.rooms.read().await.room_player_count("arena"), 1);
}

#[tokio::test]
async fn chat_is_relayed_with_roster_name() {
    let server = TestServer::new().await;
    let (mut alice, _) = ws_connect_joined(&server, "Alice").await;
    let (mut bob, _) = ws_connect_joined(&server, "Bob").await;

    let chat = ClientMessage::Chat(ChatMsg {
        name: Some("Impostor".into()),
        text: Some("  hello  ".into()),
    });
    ws_send_client_msg(&mut alice, &chat).await;

    for stream in [&mut alice, &mut bob] {
        match ws_read_until(stream, |m| matches!(m, ServerMessage::ChatBroadcast(_))).await {
            ServerMessage::ChatBroadcast(msg) => {
                assert_eq!(msg.name, "Alice");
                assert_eq!(msg.text, "hello");
            },
            other => panic!("Expected ChatBroadcast, got: {other:?}"),
        }
    }
}

#[tokio::test]
async fn snapshot_outside_room_is_an_error() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;
    let req = ClientMessage::RequestSnapshot(RequestSnapshotMsg { request_id: 21 });
    ws_send_client_msg(&mut stream, &req).await;
    let ack = ws_read_ack(&mut stream, 21).await;
    assert!(!ack.ok);
    assert!(ack.payload.is_none());
}

#[tokio::test]
async fn malformed_request_gets_error_ack() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    // `name` must be a string
    let payload = serde_json::json!({ "request_id": 33, "name": 5 });
    let data = encode_message(MessageType::Join, &payload).unwrap();
    ws_send_raw(&mut stream, data).await;

    let ack = ws_read_ack(&mut stream, 33).await;
    assert!(!ack.ok);
    assert_eq!(server.state.rooms.read().await.room_player_count("arena"), 0);
}

#[tokio::test]
async fn garbage_frames_are_ignored() {
    let server = TestServer::new().await;
    let (mut alice, _) = ws_connect_joined(&server, "Alice").await;
    ws_drain(&mut alice, 100).await;

    ws_send_raw(&mut alice, vec![0xEE, 1, 2, 3]).await;
    ws_send_raw(&mut alice, vec![MessageType::Shoot as u8, 0xC1]).await;
    assert!(ws_try_read_raw(&mut alice, 200).await.is_none());

    // Still usable afterwards
    let ack = ws_join(&mut alice, 40, "Alice").await;
    assert!(ack.ok);
}

#[tokio::test]
async fn disallowed_origin_is_refused() {
    let mut config = blockfront_server::config::ServerConfig::default();
    config.allowed_origins = vec!["https://play.example.com".to_string()];
    let server = TestServer::from_config(config).await;

    let mut request = server.ws_url().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "https://evil.example.com".parse().unwrap());
    match tokio_tungstenite::connect_async(request).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), 403),
        Err(e) => panic!("Expected HTTP 403, got: {e}"),
        Ok(_) => panic!("Expected the upgrade to be refused"),
    }

    let mut request = server.ws_url().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "https://play.example.com".parse().unwrap());
    assert!(tokio_tungstenite::connect_async(request).await.is_ok());
}

#[tokio::test]
async fn connection_cap_returns_503() {
    let mut config = blockfront_server::config::ServerConfig::default();
    config.limits.max_ws_connections = 1;
    let server = TestServer::from_config(config).await;

    let _first = ws_connect(&server.ws_url()).await;
    match tokio_tungstenite::connect_async(server.ws_url()).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), 503),
        Err(e) => panic!("Expected HTTP 503, got: {e}"),
        Ok(_) => panic!("Expected the upgrade to be refused"),
    }
}
