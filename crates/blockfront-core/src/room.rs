use serde::{Deserialize, Serialize};

use crate::block::BlockMutation;
use crate::objective::{FlagTable, TeamTally};
use crate::player::{Player, PlayerId};

/// Maximum number of players in one room.
pub const ROOM_CAPACITY: usize = 50;

/// Code of the persistent room every join lands in.
pub const DEFAULT_ROOM_CODE: &str = "arena";

/// Full resynchronization payload: every stored cell edit plus objective state.
///
/// Applying `blocks` in order on top of blank terrain rebuilds the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub revision: u64,
    pub blocks: Vec<BlockMutation>,
    pub flags: FlagTable,
    pub score: TeamTally,
    pub captures: TeamTally,
    pub updated_at: u64,
}

/// Everything a member needs to render a room: roster plus state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomView {
    pub code: String,
    pub host_id: Option<PlayerId>,
    pub capacity: usize,
    pub players: Vec<Player>,
    pub snapshot: Snapshot,
}

/// Discovery entry shown in the room browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub code: String,
    pub players: usize,
    pub capacity: usize,
    pub host_name: Option<String>,
}
