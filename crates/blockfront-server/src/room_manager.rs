use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;

use blockfront_core::net::messages::{
    BlockEditMsg, ChatBroadcastMsg, ChatMsg, PositionSyncMsg, ShootMsg,
};
use blockfront_core::objective::ResetReason;
use blockfront_core::player::{Player, PlayerId};
use blockfront_core::room::{RoomSummary, RoomView, Snapshot};
use blockfront_core::validation::{parse_team, sanitize_chat, sanitize_name};
use blockfront_ctf::blocks::BlockEdit;
use blockfront_ctf::combat::ShotOutcome;
use blockfront_ctf::flags::PoseSync;
use blockfront_ctf::{ArenaState, CtfConfig, PlayerRemoval, TeamAssignment};

use crate::config::RoomsConfig;
use crate::error::RoomError;

/// Per-connection sender for outbound WebSocket binary messages.
/// Uses `Bytes` for zero-copy cloning when broadcasting to many players.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// A live socket and the room it currently belongs to.
struct Connection {
    sender: PlayerSender,
    room: Option<String>,
}

struct RoomEntry {
    host_id: Option<PlayerId>,
    persistent: bool,
    arena: ArenaState,
}

impl RoomEntry {
    fn new(persistent: bool, ctf: CtfConfig) -> Self {
        Self {
            host_id: None,
            persistent,
            arena: ArenaState::with_config(ctf),
        }
    }

    /// Hand the host role to the lowest remaining player id if the current
    /// host is gone.
    fn reassign_host(&mut self) {
        if self.host_id.is_some_and(|id| self.arena.contains(id)) {
            return;
        }
        self.host_id = self.arena.player_ids().next();
    }
}

/// Result of a successful join.
#[derive(Debug)]
pub struct JoinOutcome {
    pub room_code: String,
    pub player_id: PlayerId,
    pub view: RoomView,
    /// The caller was already a member; nothing changed.
    pub resync: bool,
    /// Membership in another room given up to join this one.
    pub left: Option<Departure>,
}

/// A player leaving a room, explicitly or by disconnecting.
#[derive(Debug)]
pub struct Departure {
    pub room_code: String,
    pub player_id: PlayerId,
    /// `None` when the player had already been pruned from the roster.
    pub removal: Option<PlayerRemoval>,
    pub room_closed: bool,
}

#[derive(Debug)]
pub struct TeamChange {
    pub room_code: String,
    pub player_id: PlayerId,
    pub assignment: TeamAssignment,
}

#[derive(Debug)]
pub struct MatchStarted {
    pub room_code: String,
    pub started_by: PlayerId,
    pub revision: u64,
}

/// Owns every room and every live connection.
///
/// Room membership is recorded on both sides: the arena roster and the
/// connection's `room`. [`RoomRegistry::prune`] drops roster entries whose
/// connection no longer points at the room and queues a [`Departure`] for
/// each; the caller announces them via [`RoomRegistry::take_pruned`].
pub struct RoomRegistry {
    rooms: HashMap<String, RoomEntry>,
    connections: HashMap<PlayerId, Connection>,
    next_connection_id: PlayerId,
    capacity: usize,
    default_room: String,
    ctf: CtfConfig,
    pruned: Vec<Departure>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(&RoomsConfig::default(), CtfConfig::default())
    }
}

impl RoomRegistry {
    pub fn new(rooms: &RoomsConfig, ctf: CtfConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            connections: HashMap::new(),
            next_connection_id: 1,
            capacity: rooms.capacity,
            default_room: rooms.default_room_code.clone(),
            ctf,
            pruned: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_room_code(&self) -> &str {
        &self.default_room
    }

    /// Track a new socket and hand out its id (also its player id).
    pub fn register_connection(&mut self, sender: PlayerSender) -> PlayerId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        self.connections.insert(id, Connection { sender, room: None });
        id
    }

    /// Forget a socket, leaving its room. Safe to call more than once and
    /// after an explicit leave.
    pub fn drop_connection(&mut self, id: PlayerId, now: u64) -> Option<Departure> {
        let conn = self.connections.remove(&id)?;
        let code = conn.room?;
        Some(self.remove_from_room(&code, id, ResetReason::Disconnect, now))
    }

    /// Number of live sockets.
    pub fn online(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_player_count(&self, code: &str) -> usize {
        self.rooms
            .get(code)
            .map_or(0, |r| r.arena.player_count())
    }

    pub fn room_of(&self, id: PlayerId) -> Option<&str> {
        self.connections.get(&id)?.room.as_deref()
    }

    pub fn arena(&self, code: &str) -> Option<&ArenaState> {
        self.rooms.get(code).map(|r| &r.arena)
    }

    pub fn host_id(&self, code: &str) -> Option<PlayerId> {
        self.rooms.get(code)?.host_id
    }

    fn room_entry(&mut self, code: &str) -> &mut RoomEntry {
        let persistent = code == self.default_room;
        let ctf = &self.ctf;
        self.rooms.entry(code.to_string()).or_insert_with(|| {
            tracing::info!(room = code, persistent, "Room created");
            RoomEntry::new(persistent, ctf.clone())
        })
    }

    /// Join the well-known room.
    pub fn join(
        &mut self,
        id: PlayerId,
        name: Option<&str>,
        now: u64,
    ) -> Result<JoinOutcome, RoomError> {
        let code = self.default_room.clone();
        self.join_room(id, &code, name, now)
    }

    /// Join `code`, creating the room on first use.
    ///
    /// Joining a room the caller is already in only re-sends its state.
    pub fn join_room(
        &mut self,
        id: PlayerId,
        code: &str,
        name: Option<&str>,
        now: u64,
    ) -> Result<JoinOutcome, RoomError> {
        let current = self
            .connections
            .get(&id)
            .ok_or(RoomError::NotConnected)?
            .room
            .clone();
        self.prune(code, now);

        if current.as_deref() == Some(code) {
            let view = self
                .room_view(code)
                .ok_or_else(|| RoomError::UnknownRoom(code.to_string()))?;
            return Ok(JoinOutcome {
                room_code: code.to_string(),
                player_id: id,
                view,
                resync: true,
                left: None,
            });
        }

        let capacity = self.capacity;
        if self
            .rooms
            .get(code)
            .is_some_and(|r| r.arena.player_count() >= capacity)
        {
            return Err(RoomError::RoomFull { capacity });
        }

        let left = current.map(|old| {
            if let Some(conn) = self.connections.get_mut(&id) {
                conn.room = None;
            }
            self.remove_from_room(&old, id, ResetReason::Leave, now)
        });

        let player = Player::new(id, sanitize_name(name), now);
        let name = player.name.clone();
        let entry = self.room_entry(code);
        let revision = entry.arena.add_player(player, now);
        if entry.host_id.is_none() {
            entry.host_id = Some(id);
        }
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.room = Some(code.to_string());
        }
        tracing::info!(player_id = id, room = code, name = %name, ?revision, "Player joined");

        let view = self
            .room_view(code)
            .ok_or_else(|| RoomError::UnknownRoom(code.to_string()))?;
        Ok(JoinOutcome {
            room_code: code.to_string(),
            player_id: id,
            view,
            resync: false,
            left,
        })
    }

    /// Leave the current room.
    pub fn leave(
        &mut self,
        id: PlayerId,
        reason: ResetReason,
        now: u64,
    ) -> Result<Departure, RoomError> {
        let code = self
            .connections
            .get_mut(&id)
            .and_then(|c| c.room.take())
            .ok_or(RoomError::NotInRoom)?;
        Ok(self.remove_from_room(&code, id, reason, now))
    }

    fn remove_from_room(
        &mut self,
        code: &str,
        id: PlayerId,
        reason: ResetReason,
        now: u64,
    ) -> Departure {
        let Some(entry) = self.rooms.get_mut(code) else {
            return Departure {
                room_code: code.to_string(),
                player_id: id,
                removal: None,
                room_closed: true,
            };
        };
        let removal = entry.arena.remove_player(id, reason, now);
        entry.reassign_host();
        let room_closed = !entry.persistent && entry.arena.player_count() == 0;
        if room_closed {
            self.rooms.remove(code);
            tracing::info!(room = code, "Room closed");
        }
        tracing::info!(player_id = id, room = code, ?reason, "Player left");
        Departure {
            room_code: code.to_string(),
            player_id: id,
            removal,
            room_closed,
        }
    }

    /// Drop roster entries whose connection is gone or has moved elsewhere.
    ///
    /// Each removal goes through the same path as a leave (flag release,
    /// host handoff, closing an emptied side room) and is queued until
    /// [`RoomRegistry::take_pruned`]. Returns how many players were removed.
    pub fn prune(&mut self, code: &str, now: u64) -> usize {
        let Some(entry) = self.rooms.get(code) else {
            return 0;
        };
        let stale: Vec<PlayerId> = entry
            .arena
            .player_ids()
            .filter(|id| {
                !self
                    .connections
                    .get(id)
                    .is_some_and(|c| c.room.as_deref() == Some(code))
            })
            .collect();
        for &id in &stale {
            tracing::debug!(player_id = id, room = code, "Pruning stale player");
            let departure = self.remove_from_room(code, id, ResetReason::Disconnect, now);
            self.pruned.push(departure);
        }
        stale.len()
    }

    /// Departures produced by pruning since the last call.
    pub fn take_pruned(&mut self) -> Vec<Departure> {
        std::mem::take(&mut self.pruned)
    }

    /// Put the caller on a team.
    pub fn set_team(
        &mut self,
        id: PlayerId,
        team: Option<&str>,
        now: u64,
    ) -> Result<TeamChange, RoomError> {
        let team = parse_team(team).map_err(|_| RoomError::InvalidTeam)?;
        let code = self.room_of(id).ok_or(RoomError::NotInRoom)?.to_string();
        let entry = self
            .rooms
            .get_mut(&code)
            .ok_or_else(|| RoomError::UnknownRoom(code.clone()))?;
        let assignment = entry
            .arena
            .set_team(id, team, now)
            .ok_or(RoomError::NotInRoom)?;
        tracing::info!(player_id = id, room = %code, %team, "Team selected");
        Ok(TeamChange {
            room_code: code,
            player_id: id,
            assignment,
        })
    }

    /// Start a new round in the caller's room.
    pub fn start_match(&mut self, id: PlayerId, now: u64) -> Result<MatchStarted, RoomError> {
        let code = self.room_of(id).ok_or(RoomError::NotInRoom)?.to_string();
        self.prune(&code, now);
        let entry = self
            .rooms
            .get_mut(&code)
            .ok_or_else(|| RoomError::UnknownRoom(code.clone()))?;
        let player = entry.arena.player(id).ok_or(RoomError::NotInRoom)?;
        if player.team.is_none() {
            return Err(RoomError::NoTeam);
        }
        if !entry.arena.teams_ready() {
            return Err(RoomError::TeamsIncomplete);
        }
        let revision = entry.arena.reset_match(now);
        tracing::info!(player_id = id, room = %code, revision, "Match started");
        Ok(MatchStarted {
            room_code: code,
            started_by: id,
            revision,
        })
    }

    /// Full resync payload for the caller's room.
    pub fn snapshot(&self, id: PlayerId) -> Result<Snapshot, RoomError> {
        let code = self.room_of(id).ok_or(RoomError::NotInRoom)?;
        self.arena(code)
            .map(ArenaState::snapshot)
            .ok_or_else(|| RoomError::UnknownRoom(code.to_string()))
    }

    pub fn room_view(&self, code: &str) -> Option<RoomView> {
        let entry = self.rooms.get(code)?;
        Some(RoomView {
            code: code.to_string(),
            host_id: entry.host_id,
            capacity: self.capacity,
            players: entry.arena.players().cloned().collect(),
            snapshot: entry.arena.snapshot(),
        })
    }

    /// Discovery entries for every room, ordered by code. Prunes first.
    pub fn summarize(&mut self, now: u64) -> Vec<RoomSummary> {
        let mut codes: Vec<String> = self.rooms.keys().cloned().collect();
        codes.sort();
        for code in &codes {
            self.prune(code, now);
        }
        codes
            .into_iter()
            .filter_map(|code| {
                let entry = self.rooms.get(&code)?;
                let host_name = entry
                    .host_id
                    .and_then(|id| entry.arena.player(id))
                    .map(|p| p.name.clone());
                Some(RoomSummary {
                    players: entry.arena.player_count(),
                    capacity: self.capacity,
                    host_name,
                    code,
                })
            })
            .collect()
    }

    fn member_arena(&mut self, id: PlayerId) -> Option<(String, &mut ArenaState)> {
        let code = self.connections.get(&id)?.room.clone()?;
        let entry = self.rooms.get_mut(&code)?;
        Some((code, &mut entry.arena))
    }

    pub fn sync_position(
        &mut self,
        id: PlayerId,
        raw: &PositionSyncMsg,
        now: u64,
    ) -> Option<(String, PoseSync)> {
        let (code, arena) = self.member_arena(id)?;
        let sync = arena.sync_position(id, raw, now)?;
        Some((code, sync))
    }

    pub fn block_edit(
        &mut self,
        id: PlayerId,
        raw: &BlockEditMsg,
        now: u64,
    ) -> Option<(String, BlockEdit)> {
        let (code, arena) = self.member_arena(id)?;
        let edit = arena.apply_block_edit(raw, now)?;
        tracing::debug!(player_id = id, room = %code, revision = edit.revision, "Block edit");
        Some((code, edit))
    }

    pub fn shoot(&mut self, id: PlayerId, raw: &ShootMsg, now: u64) -> Option<(String, ShotOutcome)> {
        let (code, arena) = self.member_arena(id)?;
        let outcome = arena.apply_shot(id, raw, now)?;
        if outcome.killed {
            tracing::info!(
                attacker = outcome.attacker_id,
                victim = outcome.victim_id,
                room = %code,
                "Player eliminated"
            );
        }
        Some((code, outcome))
    }

    /// Sanitize a chat line and attribute it to the sender's roster name.
    pub fn chat(&mut self, id: PlayerId, raw: &ChatMsg, now: u64) -> Option<(String, ChatBroadcastMsg)> {
        let (code, arena) = self.member_arena(id)?;
        let text = sanitize_chat(raw.text.as_deref()).ok()?;
        let name = arena.player(id)?.name.clone();
        Some((
            code,
            ChatBroadcastMsg {
                player_id: id,
                name,
                text,
                sent_at: now,
            },
        ))
    }

    fn try_send(&self, id: PlayerId, data: Bytes) {
        if let Some(conn) = self.connections.get(&id)
            && let Err(e) = conn.sender.try_send(data)
        {
            tracing::debug!(
                player_id = id, error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }

    /// Send a message to one connection.
    pub fn send_to(&self, id: PlayerId, data: Bytes) {
        self.try_send(id, data);
    }

    /// Send a message to every member of a room.
    pub fn broadcast_to_room(&self, code: &str, data: &Bytes) {
        if let Some(entry) = self.rooms.get(code) {
            for id in entry.arena.player_ids() {
                self.try_send(id, data.clone());
            }
        }
    }

    /// Send a message to every member of a room except one.
    pub fn broadcast_to_room_except(&self, code: &str, exclude: PlayerId, data: &Bytes) {
        if let Some(entry) = self.rooms.get(code) {
            for id in entry.arena.player_ids().filter(|&id| id != exclude) {
                self.try_send(id, data.clone());
            }
        }
    }

    /// Send a message to every live connection, in a room or not.
    pub fn broadcast_to_all(&self, data: &Bytes) {
        for &id in self.connections.keys() {
            self.try_send(id, data.clone());
        }
    }

    #[cfg(test)]
    pub(crate) fn forget_connection(&mut self, id: PlayerId) {
        self.connections.remove(&id);
    }
}
