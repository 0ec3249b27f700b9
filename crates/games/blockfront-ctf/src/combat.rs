use blockfront_core::net::messages::ShootMsg;
use blockfront_core::objective::ResetReason;
use blockfront_core::player::PlayerId;
use blockfront_core::validation::parse_player_id;

use crate::{ArenaState, FlagResets};

/// Result of one resolved hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotOutcome {
    pub attacker_id: PlayerId,
    pub victim_id: PlayerId,
    pub damage: i32,
    /// Victim hp after the hit; back at full health when `killed`.
    pub hp: i32,
    pub killed: bool,
    pub flag_resets: FlagResets,
    pub revision: u64,
}

impl ArenaState {
    /// Validate a raw shoot intent and resolve it.
    pub fn apply_shot(
        &mut self,
        shooter_id: PlayerId,
        raw: &ShootMsg,
        now: u64,
    ) -> Option<ShotOutcome> {
        match parse_player_id(raw.target_id.as_ref()) {
            Ok(target_id) => self.resolve_shot(shooter_id, target_id, now),
            Err(reason) => {
                tracing::trace!(shooter_id, %reason, "Dropping shot");
                None
            },
        }
    }

    /// Apply one hit from `shooter_id` to `target_id`.
    ///
    /// Self-hits, missing players, unassigned teams and friendly fire are
    /// ignored. A lethal hit respawns the victim, credits the shooter's team,
    /// and sends home any flag the victim carried, all under one revision.
    pub fn resolve_shot(
        &mut self,
        shooter_id: PlayerId,
        target_id: PlayerId,
        now: u64,
    ) -> Option<ShotOutcome> {
        if shooter_id == target_id {
            return None;
        }
        let shooter_team = self.players.get(&shooter_id)?.team?;
        let target = self.players.get_mut(&target_id)?;
        let target_team = target.team?;
        if shooter_team == target_team {
            return None;
        }

        let damage = self.config.shot_damage;
        target.hp = (target.hp - damage).max(0);
        let killed = target.hp == 0;
        if killed {
            target.hp = self.config.max_hp;
            target.deaths += 1;
        }
        let hp = target.hp;

        let mut flag_resets = FlagResets::new();
        if killed {
            if let Some(shooter) = self.players.get_mut(&shooter_id) {
                shooter.kills += 1;
            }
            self.score.add(shooter_team, self.config.kill_score);
            flag_resets = self.release_flags(target_id, ResetReason::CarrierEliminated);
            tracing::debug!(shooter_id, target_id, "Player eliminated");
        }

        Some(ShotOutcome {
            attacker_id: shooter_id,
            victim_id: target_id,
            damage,
            hp,
            killed,
            flag_resets,
            revision: self.commit(now),
        })
    }
}
