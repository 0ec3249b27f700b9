//! Outbound fan-out.
//!
//! Callers hold the registry write lock across the mutation and the
//! broadcast, so members of a room receive updates in revision order.

use bytes::Bytes;

use blockfront_core::net::messages::{
    AckMsg, BlockUpdateMsg, ChatBroadcastMsg, CtfUpdateMsg, MatchStartMsg, PlayerLeftMsg,
    PlayerSyncMsg, PvpDamageMsg, RoomListMsg, RoomUpdateMsg, ServerMessage,
};
use blockfront_core::net::protocol::encode_server_message;
use blockfront_core::objective::CtfEvent;
use blockfront_core::player::PlayerId;
use blockfront_ctf::blocks::BlockEdit;
use blockfront_ctf::combat::ShotOutcome;
use blockfront_ctf::flags::PoseSync;

use crate::room_manager::{Departure, JoinOutcome, MatchStarted, RoomRegistry, TeamChange};

fn encode(msg: &ServerMessage) -> Option<Bytes> {
    match encode_server_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(error = %e, msg_type = ?msg.message_type(), "Failed to encode message");
            None
        },
    }
}

/// Answer one acknowledged request.
pub fn ack(reg: &RoomRegistry, to: PlayerId, ack: AckMsg) {
    if let Some(data) = encode(&ServerMessage::Ack(ack)) {
        reg.send_to(to, data);
    }
}

/// Push the full roster and state to every member of `code`.
pub fn room_update(reg: &RoomRegistry, code: &str) {
    let Some(room) = reg.room_view(code) else {
        return;
    };
    let msg = ServerMessage::RoomUpdate(Box::new(RoomUpdateMsg { room }));
    if let Some(data) = encode(&msg) {
        reg.broadcast_to_room(code, &data);
    }
}

fn room_list_msg(reg: &mut RoomRegistry, now: u64) -> Option<Bytes> {
    let rooms = reg.summarize(now);
    pruned(reg);
    encode(&ServerMessage::RoomList(RoomListMsg { rooms }))
}

/// Send the room list to every connection.
pub fn room_list(reg: &mut RoomRegistry, now: u64) {
    if let Some(data) = room_list_msg(reg, now) {
        reg.broadcast_to_all(&data);
    }
}

/// Answer a single room list request.
pub fn room_list_to(reg: &mut RoomRegistry, to: PlayerId, now: u64) {
    if let Some(data) = room_list_msg(reg, now) {
        reg.send_to(to, data);
    }
}

/// Broadcast the objective state of `code` as of `revision`.
pub fn ctf_update(
    reg: &RoomRegistry,
    code: &str,
    revision: u64,
    events: impl IntoIterator<Item = CtfEvent>,
) {
    let Some(arena) = reg.arena(code) else {
        return;
    };
    let msg = ServerMessage::CtfUpdate(CtfUpdateMsg {
        revision,
        flags: *arena.flags(),
        score: arena.score(),
        captures: arena.captures(),
        events: events.into_iter().collect(),
    });
    if let Some(data) = encode(&msg) {
        reg.broadcast_to_room(code, &data);
    }
}

/// Relay a pose to the other members, then any objective change to everyone.
pub fn player_sync(reg: &RoomRegistry, code: &str, sync: PoseSync) {
    let msg = ServerMessage::PlayerSync(PlayerSyncMsg {
        player_id: sync.player_id,
        pose: sync.pose,
    });
    if let Some(data) = encode(&msg) {
        reg.broadcast_to_room_except(code, sync.player_id, &data);
    }
    if let Some(change) = sync.ctf {
        ctf_update(reg, code, change.revision, change.events);
    }
}

/// Deliver an accepted edit to everyone except the editor.
pub fn block_update(reg: &RoomRegistry, code: &str, by: PlayerId, edit: BlockEdit) {
    let msg = ServerMessage::BlockUpdate(BlockUpdateMsg {
        by_player_id: by,
        mutation: edit.mutation,
        revision: edit.revision,
    });
    if let Some(data) = encode(&msg) {
        reg.broadcast_to_room_except(code, by, &data);
    }
}

/// Report a hit, and a kill if it was one, to the whole room.
pub fn pvp_damage(reg: &RoomRegistry, code: &str, outcome: ShotOutcome) {
    let Some(arena) = reg.arena(code) else {
        return;
    };
    let msg = ServerMessage::PvpDamage(PvpDamageMsg {
        attacker_id: outcome.attacker_id,
        victim_id: outcome.victim_id,
        damage: outcome.damage,
        hp: outcome.hp,
        killed: outcome.killed,
        score: arena.score(),
        captures: arena.captures(),
        flags: *arena.flags(),
        flag_resets: outcome.flag_resets.into_vec(),
        revision: outcome.revision,
    });
    if let Some(data) = encode(&msg) {
        reg.broadcast_to_room(code, &data);
    }
}

/// Send the reset world and roster to every member.
pub fn match_start(reg: &RoomRegistry, started: &MatchStarted) {
    let Some(arena) = reg.arena(&started.room_code) else {
        return;
    };
    let msg = ServerMessage::MatchStart(Box::new(MatchStartMsg {
        started_by: started.started_by,
        players: arena.players().cloned().collect(),
        snapshot: arena.snapshot(),
    }));
    if let Some(data) = encode(&msg) {
        reg.broadcast_to_room(&started.room_code, &data);
    }
}

/// Relay a chat line to the room, sender included.
pub fn chat(reg: &RoomRegistry, code: &str, msg: ChatBroadcastMsg) {
    if let Some(data) = encode(&ServerMessage::ChatBroadcast(msg)) {
        reg.broadcast_to_room(code, &data);
    }
}

/// Refresh the roster, plus the objective if a carried flag went home.
pub fn team_change(reg: &RoomRegistry, change: TeamChange) {
    room_update(reg, &change.room_code);
    if !change.assignment.flag_resets.is_empty() {
        ctf_update(
            reg,
            &change.room_code,
            change.assignment.revision,
            change.assignment.flag_resets,
        );
    }
}

/// Tell the remaining members who left, then refresh the room list.
pub fn departure(reg: &mut RoomRegistry, departure: Departure, now: u64) {
    announce_departure(reg, departure);
    room_list(reg, now);
}

/// Announce players dropped by pruning. The room list is left to the caller.
pub fn pruned(reg: &mut RoomRegistry) {
    for departure in reg.take_pruned() {
        announce_departure(reg, departure);
    }
}

fn announce_departure(reg: &RoomRegistry, departure: Departure) {
    if !departure.room_closed
        && let Some(removal) = departure.removal
    {
        let msg = ServerMessage::PlayerLeft(PlayerLeftMsg {
            player_id: departure.player_id,
            revision: removal.revision,
        });
        if let Some(data) = encode(&msg) {
            reg.broadcast_to_room(&departure.room_code, &data);
        }
        room_update(reg, &departure.room_code);
        if !removal.flag_resets.is_empty() {
            ctf_update(
                reg,
                &departure.room_code,
                removal.revision,
                removal.flag_resets,
            );
        }
    }
}

/// Announce a new member. Resyncs announce nothing; the ack carries the state.
pub fn joined(reg: &mut RoomRegistry, outcome: JoinOutcome, now: u64) {
    if outcome.resync {
        return;
    }
    if let Some(left) = outcome.left {
        announce_departure(reg, left);
    }
    room_update(reg, &outcome.room_code);
    room_list(reg, now);
}
