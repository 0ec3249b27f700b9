use serde::{Deserialize, Serialize};

use super::messages::{
    AckMsg, BlockEditMsg, BlockUpdateMsg, ChatBroadcastMsg, ChatMsg, ClientMessage, CtfUpdateMsg,
    JoinMsg, LeaveMsg, MatchStartMsg, MessageType, PlayerLeftMsg, PlayerSyncMsg, PositionSyncMsg,
    PvpDamageMsg, RequestRoomListMsg, RequestSnapshotMsg, RoomListMsg, RoomUpdateMsg,
    ServerMessage, SetTeamMsg, ShootMsg, StartMatchMsg,
};

/// Current protocol version, reported by the status endpoint.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
///
/// Structs are written as MessagePack maps keyed by field name so browser
/// clients can build payloads as plain objects.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes = rmp_serde::to_vec_named(payload)
        .map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    let ty = msg.message_type();
    match msg {
        ClientMessage::Join(m) => encode_message(ty, m),
        ClientMessage::Leave(m) => encode_message(ty, m),
        ClientMessage::SetTeam(m) => encode_message(ty, m),
        ClientMessage::StartMatch(m) => encode_message(ty, m),
        ClientMessage::PositionSync(m) => encode_message(ty, m),
        ClientMessage::BlockEdit(m) => encode_message(ty, m),
        ClientMessage::Shoot(m) => encode_message(ty, m),
        ClientMessage::RequestSnapshot(m) => encode_message(ty, m),
        ClientMessage::RequestRoomList(m) => encode_message(ty, m),
        ClientMessage::Chat(m) => encode_message(ty, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let ty = msg.message_type();
    match msg {
        ServerMessage::Ack(m) => encode_message(ty, m),
        ServerMessage::RoomUpdate(m) => encode_message(ty, m),
        ServerMessage::RoomList(m) => encode_message(ty, m),
        ServerMessage::ChatBroadcast(m) => encode_message(ty, m),
        ServerMessage::PlayerSync(m) => encode_message(ty, m),
        ServerMessage::BlockUpdate(m) => encode_message(ty, m),
        ServerMessage::CtfUpdate(m) => encode_message(ty, m),
        ServerMessage::PvpDamage(m) => encode_message(ty, m),
        ServerMessage::MatchStart(m) => encode_message(ty, m),
        ServerMessage::PlayerLeft(m) => encode_message(ty, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Join => Ok(ClientMessage::Join(decode_payload::<JoinMsg>(data)?)),
        MessageType::Leave => Ok(ClientMessage::Leave(decode_payload::<LeaveMsg>(data)?)),
        MessageType::SetTeam => Ok(ClientMessage::SetTeam(decode_payload::<SetTeamMsg>(data)?)),
        MessageType::StartMatch => Ok(ClientMessage::StartMatch(
            decode_payload::<StartMatchMsg>(data)?,
        )),
        MessageType::PositionSync => Ok(ClientMessage::PositionSync(decode_payload::<
            PositionSyncMsg,
        >(data)?)),
        MessageType::BlockEdit => Ok(ClientMessage::BlockEdit(decode_payload::<BlockEditMsg>(
            data,
        )?)),
        MessageType::Shoot => Ok(ClientMessage::Shoot(decode_payload::<ShootMsg>(data)?)),
        MessageType::RequestSnapshot => Ok(ClientMessage::RequestSnapshot(decode_payload::<
            RequestSnapshotMsg,
        >(data)?)),
        // The room list request carries nothing, so a bare type byte is accepted.
        MessageType::RequestRoomList if data.len() == 1 => {
            Ok(ClientMessage::RequestRoomList(RequestRoomListMsg {}))
        },
        MessageType::RequestRoomList => Ok(ClientMessage::RequestRoomList(decode_payload::<
            RequestRoomListMsg,
        >(data)?)),
        MessageType::Chat => Ok(ClientMessage::Chat(decode_payload::<ChatMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Ack => Ok(ServerMessage::Ack(decode_payload::<AckMsg>(data)?)),
        MessageType::RoomUpdate => Ok(ServerMessage::RoomUpdate(Box::new(decode_payload::<
            RoomUpdateMsg,
        >(data)?))),
        MessageType::RoomList => Ok(ServerMessage::RoomList(decode_payload::<RoomListMsg>(
            data,
        )?)),
        MessageType::ChatBroadcast => Ok(ServerMessage::ChatBroadcast(decode_payload::<
            ChatBroadcastMsg,
        >(data)?)),
        MessageType::PlayerSync => Ok(ServerMessage::PlayerSync(
            decode_payload::<PlayerSyncMsg>(data)?,
        )),
        MessageType::BlockUpdate => Ok(ServerMessage::BlockUpdate(decode_payload::<
            BlockUpdateMsg,
        >(data)?)),
        MessageType::CtfUpdate => Ok(ServerMessage::CtfUpdate(decode_payload::<CtfUpdateMsg>(
            data,
        )?)),
        MessageType::PvpDamage => Ok(ServerMessage::PvpDamage(decode_payload::<PvpDamageMsg>(
            data,
        )?)),
        MessageType::MatchStart => Ok(ServerMessage::MatchStart(Box::new(decode_payload::<
            MatchStartMsg,
        >(data)?))),
        MessageType::PlayerLeft => Ok(ServerMessage::PlayerLeft(
            decode_payload::<PlayerLeftMsg>(data)?,
        )),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
