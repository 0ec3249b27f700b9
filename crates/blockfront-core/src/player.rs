use serde::{Deserialize, Serialize};

/// Connection-scoped player identifier. A player's id is the id of the
/// socket that joined, so a reconnect is always a new player.
pub type PlayerId = u64;

/// Health every player spawns and respawns with.
pub const MAX_HP: i32 = 100;

/// Longest display name kept after sanitizing.
pub const MAX_NAME_CHARS: usize = 16;

/// One of the two sides in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Alpha,
    Bravo,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Alpha, Team::Bravo];

    /// The team whose flag this team tries to steal.
    pub fn opponent(self) -> Team {
        match self {
            Team::Alpha => Team::Bravo,
            Team::Bravo => Team::Alpha,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Team::Alpha => "alpha",
            Team::Bravo => "bravo",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last reported transform of a player, in world units and radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    /// Unix epoch milliseconds of the sync that produced this pose.
    pub updated_at: u64,
}

/// A participant in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team: Option<Team>,
    pub pose: PlayerPose,
    pub hp: i32,
    pub kills: u32,
    pub deaths: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String, now: u64) -> Self {
        Self {
            id,
            name,
            team: None,
            pose: PlayerPose {
                updated_at: now,
                ..PlayerPose::default()
            },
            hp: MAX_HP,
            kills: 0,
            deaths: 0,
        }
    }
}
