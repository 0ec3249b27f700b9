use serde::{Deserialize, Serialize};

use crate::block::BlockMutation;
use crate::objective::{CtfEvent, FlagTable, TeamTally};
use crate::player::{Player, PlayerId, PlayerPose};
use crate::room::{RoomSummary, RoomView, Snapshot};
use crate::validation::Loose;

/// Network message type discriminator (first byte of every frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Join = 0x01,
    Leave = 0x02,
    SetTeam = 0x03,
    StartMatch = 0x04,
    PositionSync = 0x05,
    BlockEdit = 0x06,
    Shoot = 0x07,
    RequestSnapshot = 0x08,
    RequestRoomList = 0x09,
    Chat = 0x0A,

    // Server -> Client
    Ack = 0x10,
    RoomUpdate = 0x11,
    RoomList = 0x12,
    ChatBroadcast = 0x13,
    PlayerSync = 0x14,
    BlockUpdate = 0x15,
    CtfUpdate = 0x16,
    PvpDamage = 0x17,
    MatchStart = 0x18,
    PlayerLeft = 0x19,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::Leave),
            0x03 => Some(Self::SetTeam),
            0x04 => Some(Self::StartMatch),
            0x05 => Some(Self::PositionSync),
            0x06 => Some(Self::BlockEdit),
            0x07 => Some(Self::Shoot),
            0x08 => Some(Self::RequestSnapshot),
            0x09 => Some(Self::RequestRoomList),
            0x0A => Some(Self::Chat),
            0x10 => Some(Self::Ack),
            0x11 => Some(Self::RoomUpdate),
            0x12 => Some(Self::RoomList),
            0x13 => Some(Self::ChatBroadcast),
            0x14 => Some(Self::PlayerSync),
            0x15 => Some(Self::BlockUpdate),
            0x16 => Some(Self::CtfUpdate),
            0x17 => Some(Self::PvpDamage),
            0x18 => Some(Self::MatchStart),
            0x19 => Some(Self::PlayerLeft),
            _ => None,
        }
    }

    /// Whether a message of this type expects an `Ack` reply.
    pub fn is_acknowledged(self) -> bool {
        matches!(
            self,
            Self::Join | Self::Leave | Self::SetTeam | Self::StartMatch | Self::RequestSnapshot
        )
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Join (or quick-join) the well-known room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub request_id: u32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveMsg {
    pub request_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTeamMsg {
    pub request_id: u32,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartMatchMsg {
    pub request_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionSyncMsg {
    #[serde(default)]
    pub x: Option<Loose>,
    #[serde(default)]
    pub y: Option<Loose>,
    #[serde(default)]
    pub z: Option<Loose>,
    #[serde(default)]
    pub yaw: Option<Loose>,
    #[serde(default)]
    pub pitch: Option<Loose>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockEditMsg {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub x: Option<Loose>,
    #[serde(default)]
    pub y: Option<Loose>,
    #[serde(default)]
    pub z: Option<Loose>,
    #[serde(default)]
    pub type_id: Option<Loose>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShootMsg {
    #[serde(default)]
    pub target_id: Option<Loose>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshotMsg {
    pub request_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestRoomListMsg {}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatMsg {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinMsg),
    Leave(LeaveMsg),
    SetTeam(SetTeamMsg),
    StartMatch(StartMatchMsg),
    PositionSync(PositionSyncMsg),
    BlockEdit(BlockEditMsg),
    Shoot(ShootMsg),
    RequestSnapshot(RequestSnapshotMsg),
    RequestRoomList(RequestRoomListMsg),
    Chat(ChatMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Join(_) => MessageType::Join,
            Self::Leave(_) => MessageType::Leave,
            Self::SetTeam(_) => MessageType::SetTeam,
            Self::StartMatch(_) => MessageType::StartMatch,
            Self::PositionSync(_) => MessageType::PositionSync,
            Self::BlockEdit(_) => MessageType::BlockEdit,
            Self::Shoot(_) => MessageType::Shoot,
            Self::RequestSnapshot(_) => MessageType::RequestSnapshot,
            Self::RequestRoomList(_) => MessageType::RequestRoomList,
            Self::Chat(_) => MessageType::Chat,
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Body of a successful acknowledged operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AckPayload {
    Room(Box<RoomView>),
    Left { room_code: String },
    Snapshot(Box<Snapshot>),
}

/// Reply to an acknowledged request, matched by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckMsg {
    pub request_id: u32,
    pub ok: bool,
    pub error: Option<String>,
    pub payload: Option<AckPayload>,
}

impl AckMsg {
    pub fn ok(request_id: u32, payload: Option<AckPayload>) -> Self {
        Self {
            request_id,
            ok: true,
            error: None,
            payload,
        }
    }

    pub fn err(request_id: u32, error: impl Into<String>) -> Self {
        Self {
            request_id,
            ok: false,
            error: Some(error.into()),
            payload: None,
        }
    }
}

/// Full roster and state, pushed to every member of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomUpdateMsg {
    pub room: RoomView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomListMsg {
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBroadcastMsg {
    pub player_id: PlayerId,
    pub name: String,
    pub text: String,
    pub sent_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSyncMsg {
    pub player_id: PlayerId,
    pub pose: PlayerPose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockUpdateMsg {
    pub by_player_id: PlayerId,
    pub mutation: BlockMutation,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtfUpdateMsg {
    pub revision: u64,
    pub flags: FlagTable,
    pub score: TeamTally,
    pub captures: TeamTally,
    /// Discrete transitions folded into this revision; empty for carry-updates.
    pub events: Vec<CtfEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvpDamageMsg {
    pub attacker_id: PlayerId,
    pub victim_id: PlayerId,
    pub damage: i32,
    pub hp: i32,
    pub killed: bool,
    pub score: TeamTally,
    pub captures: TeamTally,
    pub flags: FlagTable,
    /// Flags released because the victim was carrying them.
    pub flag_resets: Vec<CtfEvent>,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStartMsg {
    pub started_by: PlayerId,
    pub players: Vec<Player>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    pub player_id: PlayerId,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Ack(AckMsg),
    RoomUpdate(Box<RoomUpdateMsg>),
    RoomList(RoomListMsg),
    ChatBroadcast(ChatBroadcastMsg),
    PlayerSync(PlayerSyncMsg),
    BlockUpdate(BlockUpdateMsg),
    CtfUpdate(CtfUpdateMsg),
    PvpDamage(PvpDamageMsg),
    MatchStart(Box<MatchStartMsg>),
    PlayerLeft(PlayerLeftMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Ack(_) => MessageType::Ack,
            Self::RoomUpdate(_) => MessageType::RoomUpdate,
            Self::RoomList(_) => MessageType::RoomList,
            Self::ChatBroadcast(_) => MessageType::ChatBroadcast,
            Self::PlayerSync(_) => MessageType::PlayerSync,
            Self::BlockUpdate(_) => MessageType::BlockUpdate,
            Self::CtfUpdate(_) => MessageType::CtfUpdate,
            Self::PvpDamage(_) => MessageType::PvpDamage,
            Self::MatchStart(_) => MessageType::MatchStart,
            Self::PlayerLeft(_) => MessageType::PlayerLeft,
        }
    }
}
