pub mod block;
pub mod net;
pub mod objective;
pub mod player;
pub mod room;
pub mod time;
pub mod validation;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::net::messages::{BlockEditMsg, PositionSyncMsg};
    use crate::player::{Player, PlayerId, Team};
    use crate::validation::Loose;

    /// A fresh player with a generated name, optionally on a team.
    pub fn make_player(id: PlayerId, team: Option<Team>) -> Player {
        let mut player = Player::new(id, format!("Player{id}"), 0);
        player.team = team;
        player
    }

    /// `n` players alternating alpha/bravo, ids starting at 1.
    pub fn make_teams(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| {
                let team = if i % 2 == 0 { Team::Alpha } else { Team::Bravo };
                make_player(i as PlayerId + 1, Some(team))
            })
            .collect()
    }

    /// A well-formed position sync facing forward.
    pub fn sync_msg(x: f64, y: f64, z: f64) -> PositionSyncMsg {
        PositionSyncMsg {
            x: Some(Loose::Float(x)),
            y: Some(Loose::Float(y)),
            z: Some(Loose::Float(z)),
            yaw: Some(Loose::Float(0.0)),
            pitch: Some(Loose::Float(0.0)),
        }
    }

    pub fn place_msg(x: i64, y: i64, z: i64, type_id: i64) -> BlockEditMsg {
        BlockEditMsg {
            action: Some("place".to_string()),
            x: Some(Loose::Int(x)),
            y: Some(Loose::Int(y)),
            z: Some(Loose::Int(z)),
            type_id: Some(Loose::Int(type_id)),
        }
    }

    pub fn remove_msg(x: i64, y: i64, z: i64) -> BlockEditMsg {
        BlockEditMsg {
            action: Some("remove".to_string()),
            x: Some(Loose::Int(x)),
            y: Some(Loose::Int(y)),
            z: Some(Loose::Int(z)),
            type_id: None,
        }
    }
}
