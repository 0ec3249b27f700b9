//! Capture-the-flag data model shared between the server and clients.
//!
//! The transitions live in the `blockfront-ctf` crate; this module only
//! defines what goes over the wire.

use serde::{Deserialize, Serialize};

use crate::player::{PlayerId, Team};

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn xz_distance(&self, other: &Vec3) -> f64 {
        (self.x - other.x).hypot(self.z - other.z)
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// One team's flag. `carrier_id == None` means the flag is at home.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagState {
    pub home: Vec3,
    pub at: Vec3,
    pub carrier_id: Option<PlayerId>,
}

impl FlagState {
    pub fn at_home(home: Vec3) -> Self {
        Self {
            home,
            at: home,
            carrier_id: None,
        }
    }

    pub fn is_home(&self) -> bool {
        self.carrier_id.is_none()
    }

    /// Send the flag back to its spawn point and clear the carrier.
    pub fn return_home(&mut self) {
        self.carrier_id = None;
        self.at = self.home;
    }
}

/// Both teams' flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagTable {
    pub alpha: FlagState,
    pub bravo: FlagState,
}

impl FlagTable {
    pub fn new(alpha_home: Vec3, bravo_home: Vec3) -> Self {
        Self {
            alpha: FlagState::at_home(alpha_home),
            bravo: FlagState::at_home(bravo_home),
        }
    }

    pub fn get(&self, team: Team) -> &FlagState {
        match team {
            Team::Alpha => &self.alpha,
            Team::Bravo => &self.bravo,
        }
    }

    pub fn get_mut(&mut self, team: Team) -> &mut FlagState {
        match team {
            Team::Alpha => &mut self.alpha,
            Team::Bravo => &mut self.bravo,
        }
    }

    /// Teams whose flag is currently carried by `player_id`.
    pub fn carried_by(&self, player_id: PlayerId) -> impl Iterator<Item = Team> + '_ {
        Team::ALL
            .into_iter()
            .filter(move |&t| self.get(t).carrier_id == Some(player_id))
    }
}

/// A non-negative counter per team (score, captures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamTally {
    pub alpha: u32,
    pub bravo: u32,
}

impl TeamTally {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Alpha => self.alpha,
            Team::Bravo => self.bravo,
        }
    }

    pub fn add(&mut self, team: Team, amount: u32) {
        let slot = match team {
            Team::Alpha => &mut self.alpha,
            Team::Bravo => &mut self.bravo,
        };
        *slot = slot.saturating_add(amount);
    }
}

/// Why a carried flag went back to its home point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    Disconnect,
    Leave,
    CarrierEliminated,
    /// The carrier switched to the team that owns the flag.
    TeamChange,
}

/// A discrete objective transition, attached to `CtfUpdate` and `PvpDamage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CtfEvent {
    Pickup {
        by_player_id: PlayerId,
        by_team: Team,
        flag_team: Team,
    },
    Capture {
        by_player_id: PlayerId,
        by_team: Team,
        flag_team: Team,
        captures: TeamTally,
        score: TeamTally,
    },
    Reset {
        flag_team: Team,
        carrier_id: PlayerId,
        reason: ResetReason,
    },
}
