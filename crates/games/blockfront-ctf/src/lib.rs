//! Authoritative state of one capture-the-flag arena.
//!
//! [`ArenaState`] owns the roster, the voxel diff store, both flags and the
//! team counters. Every accepted mutation goes through [`ArenaState::commit`],
//! which bumps the revision exactly once; rejected input returns `None` and
//! leaves the revision untouched. The type does no I/O and holds no locks:
//! callers serialize access (the server keeps it behind a write lock).

pub mod blocks;
pub mod combat;
pub mod config;
pub mod flags;

use std::collections::BTreeMap;

use smallvec::SmallVec;

use blockfront_core::objective::{CtfEvent, FlagTable, ResetReason, TeamTally};
use blockfront_core::player::{Player, PlayerId, Team};
use blockfront_core::room::Snapshot;

use blocks::VoxelStore;
pub use config::CtfConfig;

/// Flag resets produced by a single mutation. At most one per team.
pub type FlagResets = SmallVec<[CtfEvent; 2]>;

/// Result of removing a player from the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRemoval {
    pub player: Player,
    pub flag_resets: FlagResets,
    pub revision: u64,
}

/// Result of an accepted team selection.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamAssignment {
    pub team: Team,
    pub flag_resets: FlagResets,
    pub revision: u64,
}

pub struct ArenaState {
    config: CtfConfig,
    players: BTreeMap<PlayerId, Player>,
    blocks: VoxelStore,
    flags: FlagTable,
    score: TeamTally,
    captures: TeamTally,
    revision: u64,
    updated_at: u64,
}

impl ArenaState {
    pub fn new() -> Self {
        Self::with_config(CtfConfig::load())
    }

    /// Create an arena with explicit configuration.
    pub fn with_config(config: CtfConfig) -> Self {
        let flags = FlagTable::new(config.alpha_home, config.bravo_home);
        Self {
            config,
            players: BTreeMap::new(),
            blocks: VoxelStore::default(),
            flags,
            score: TeamTally::default(),
            captures: TeamTally::default(),
            revision: 0,
            updated_at: 0,
        }
    }

    pub fn config(&self) -> &CtfConfig {
        &self.config
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    pub fn flags(&self) -> &FlagTable {
        &self.flags
    }

    pub fn score(&self) -> TeamTally {
        self.score
    }

    pub fn captures(&self) -> TeamTally {
        self.captures
    }

    pub fn blocks(&self) -> &VoxelStore {
        &self.blocks
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Players ordered by id.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.keys().copied()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn team_size(&self, team: Team) -> usize {
        self.players
            .values()
            .filter(|p| p.team == Some(team))
            .count()
    }

    /// Both teams have at least one member.
    pub fn teams_ready(&self) -> bool {
        Team::ALL.into_iter().all(|t| self.team_size(t) > 0)
    }

    /// Record an accepted mutation. Returns the new revision.
    pub(crate) fn commit(&mut self, now: u64) -> u64 {
        self.revision += 1;
        self.updated_at = self.updated_at.max(now);
        self.revision
    }

    /// Insert a player with full health. `None` if the id is already present.
    pub fn add_player(&mut self, mut player: Player, now: u64) -> Option<u64> {
        if self.players.contains_key(&player.id) {
            return None;
        }
        player.hp = self.config.max_hp;
        self.players.insert(player.id, player);
        Some(self.commit(now))
    }

    /// Remove a player, returning any flag they carried to its home point.
    ///
    /// Removing an absent player is a no-op, so a disconnect racing an
    /// explicit leave only takes effect once.
    pub fn remove_player(
        &mut self,
        id: PlayerId,
        reason: ResetReason,
        now: u64,
    ) -> Option<PlayerRemoval> {
        if !self.players.contains_key(&id) {
            return None;
        }
        let flag_resets = self.release_flags(id, reason);
        let player = self.players.remove(&id)?;
        let revision = self.commit(now);
        Some(PlayerRemoval {
            player,
            flag_resets,
            revision,
        })
    }

    /// Put a player on a team.
    ///
    /// A carrier switching to the side that owns the flag they hold drops it
    /// back home in the same revision.
    pub fn set_team(&mut self, id: PlayerId, team: Team, now: u64) -> Option<TeamAssignment> {
        let player = self.players.get_mut(&id)?;
        player.team = Some(team);
        let flag_resets = if self.flags.get(team).carrier_id == Some(id) {
            self.release_flag(team, ResetReason::TeamChange)
                .into_iter()
                .collect()
        } else {
            FlagResets::new()
        };
        let revision = self.commit(now);
        Some(TeamAssignment {
            team,
            flag_resets,
            revision,
        })
    }

    /// Start a fresh round: flags home, counters zeroed, everyone healed.
    /// Terrain edits carry over.
    pub fn reset_match(&mut self, now: u64) -> u64 {
        self.flags.alpha.return_home();
        self.flags.bravo.return_home();
        self.score = TeamTally::default();
        self.captures = TeamTally::default();
        for player in self.players.values_mut() {
            player.hp = self.config.max_hp;
            player.kills = 0;
            player.deaths = 0;
        }
        self.commit(now)
    }

    /// Everything a client needs to rebuild the world from blank terrain.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            revision: self.revision,
            blocks: self.blocks.mutations().copied().collect(),
            flags: self.flags,
            score: self.score,
            captures: self.captures,
            updated_at: self.updated_at,
        }
    }
}

impl Default for ArenaState {
    fn default() -> Self {
        Self::with_config(CtfConfig::default())
    }
}
