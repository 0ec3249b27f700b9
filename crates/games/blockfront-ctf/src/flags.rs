//! Flag pickup, carry, capture and reset.
//!
//! A flag is either at home (`carrier_id == None`) or carried. There is no
//! dropped state: losing the carrier always sends the flag home. Transitions
//! are evaluated on the carrier's position syncs and folded into a single
//! revision per sync.

use smallvec::SmallVec;

use blockfront_core::net::messages::PositionSyncMsg;
use blockfront_core::objective::{CtfEvent, ResetReason, Vec3};
use blockfront_core::player::{PlayerId, PlayerPose, Team};
use blockfront_core::validation::validate_pose;

use crate::{ArenaState, FlagResets};

/// Objective changes caused by one position sync.
#[derive(Debug, Clone, PartialEq)]
pub struct CtfChange {
    pub revision: u64,
    /// Pickup and capture events; empty when the flag only followed its carrier.
    pub events: SmallVec<[CtfEvent; 2]>,
}

/// An accepted position sync.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSync {
    pub player_id: PlayerId,
    pub pose: PlayerPose,
    /// Present only when the sync moved or changed a flag.
    pub ctf: Option<CtfChange>,
}

impl ArenaState {
    /// Store a player's reported pose and run the flag transitions for it.
    ///
    /// Returns `None` (and changes nothing) for unknown players or malformed
    /// input. Plain movement does not bump the revision; any flag change does.
    pub fn sync_position(
        &mut self,
        player_id: PlayerId,
        raw: &PositionSyncMsg,
        now: u64,
    ) -> Option<PoseSync> {
        let pose = match validate_pose(raw, now) {
            Ok(pose) => pose,
            Err(reason) => {
                tracing::trace!(player_id, %reason, "Dropping position sync");
                return None;
            },
        };
        let player = self.players.get_mut(&player_id)?;
        player.pose = pose;
        let team = player.team;

        let ctf = team.and_then(|team| self.advance_flags(player_id, team, &pose, now));
        Some(PoseSync {
            player_id,
            pose,
            ctf,
        })
    }

    fn advance_flags(
        &mut self,
        player_id: PlayerId,
        team: Team,
        pose: &PlayerPose,
        now: u64,
    ) -> Option<CtfChange> {
        let enemy = team.opponent();
        let pickup_radius = self.config.pickup_radius;
        let mut events = SmallVec::new();
        let mut moved = false;

        let flag = self.flags.get_mut(enemy);
        let rider = Vec3::new(pose.x, flag.home.y, pose.z);
        match flag.carrier_id {
            Some(carrier) if carrier == player_id => {
                if flag.at != rider {
                    flag.at = rider;
                    moved = true;
                }
            },
            None if rider.xz_distance(&flag.at) <= pickup_radius => {
                flag.carrier_id = Some(player_id);
                flag.at = rider;
                moved = true;
                tracing::debug!(player_id, %team, "Flag picked up");
                events.push(CtfEvent::Pickup {
                    by_player_id: player_id,
                    by_team: team,
                    flag_team: enemy,
                });
            },
            _ => {},
        }

        if let Some(capture) = self.try_capture(player_id, team, pose) {
            moved = true;
            events.push(capture);
        }

        if !moved {
            return None;
        }
        Some(CtfChange {
            revision: self.commit(now),
            events,
        })
    }

    /// Score a capture if `player_id` carries the enemy flag into their own
    /// base while their own flag sits at home.
    fn try_capture(
        &mut self,
        player_id: PlayerId,
        team: Team,
        pose: &PlayerPose,
    ) -> Option<CtfEvent> {
        let enemy = team.opponent();
        if self.flags.get(enemy).carrier_id != Some(player_id) {
            return None;
        }
        let own = self.flags.get(team);
        let at_base = Vec3::new(pose.x, own.home.y, pose.z).xz_distance(&own.home)
            <= self.config.capture_radius;
        if !at_base || !self.own_flag_secure(team) {
            return None;
        }

        self.captures.add(team, 1);
        self.score.add(team, self.config.capture_score);
        self.flags.get_mut(enemy).return_home();
        tracing::info!(
            player_id,
            %team,
            captures = self.captures.get(team),
            "Flag captured"
        );
        Some(CtfEvent::Capture {
            by_player_id: player_id,
            by_team: team,
            flag_team: enemy,
            captures: self.captures,
            score: self.score,
        })
    }

    /// The team's own flag is uncarried and within tolerance of its home point.
    fn own_flag_secure(&self, team: Team) -> bool {
        let own = self.flags.get(team);
        own.is_home() && own.at.distance(&own.home) <= self.config.home_tolerance
    }

    /// Send every flag carried by `player_id` home. Does not bump the
    /// revision; the caller folds the resets into its own commit.
    pub(crate) fn release_flags(
        &mut self,
        player_id: PlayerId,
        reason: ResetReason,
    ) -> FlagResets {
        let carried: SmallVec<[Team; 2]> = self.flags.carried_by(player_id).collect();
        carried
            .into_iter()
            .filter_map(|team| self.release_flag(team, reason))
            .collect()
    }

    pub(crate) fn release_flag(
        &mut self,
        flag_team: Team,
        reason: ResetReason,
    ) -> Option<CtfEvent> {
        let flag = self.flags.get_mut(flag_team);
        let carrier_id = flag.carrier_id?;
        flag.return_home();
        tracing::debug!(carrier_id, %flag_team, ?reason, "Flag reset");
        Some(CtfEvent::Reset {
            flag_team,
            carrier_id,
            reason,
        })
    }
}
