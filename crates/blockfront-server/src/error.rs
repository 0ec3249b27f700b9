use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Why an acknowledged room operation failed. The `Display` text is what the
/// client sees in its `Ack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    RoomFull { capacity: usize },
    NotInRoom,
    NotConnected,
    InvalidTeam,
    NoTeam,
    TeamsIncomplete,
    UnknownRoom(String),
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomFull { capacity } => write!(f, "Room is full ({capacity} players)"),
            Self::NotInRoom => write!(f, "Not currently in a room"),
            Self::NotConnected => write!(f, "Connection is not registered"),
            Self::InvalidTeam => write!(f, "Team must be \"alpha\" or \"bravo\""),
            Self::NoTeam => write!(f, "Pick a team before starting the match"),
            Self::TeamsIncomplete => write!(f, "Both teams need at least one player to start"),
            Self::UnknownRoom(code) => write!(f, "Room not found: {code}"),
        }
    }
}

impl std::error::Error for RoomError {}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(m) => write!(f, "{m}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
