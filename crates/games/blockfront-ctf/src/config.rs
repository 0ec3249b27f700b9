use serde::{Deserialize, Serialize};

use blockfront_core::objective::Vec3;

/// Data-driven tuning for the capture-the-flag arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CtfConfig {
    /// Horizontal distance within which a player grabs the enemy flag.
    pub pickup_radius: f64,
    /// Horizontal distance from the carrier's own home that counts as a capture.
    pub capture_radius: f64,
    /// How far the capturing team's own flag may sit from its home point.
    pub home_tolerance: f64,
    /// Team score awarded per capture.
    pub capture_score: u32,
    /// Team score awarded per elimination.
    pub kill_score: u32,
    /// Hit points removed by one shot.
    pub shot_damage: i32,
    /// Hit points on join and after respawn.
    pub max_hp: i32,
    pub alpha_home: Vec3,
    pub bravo_home: Vec3,
}

impl Default for CtfConfig {
    fn default() -> Self {
        Self {
            pickup_radius: 2.25,
            capture_radius: 3.1,
            home_tolerance: 0.25,
            capture_score: 500,
            kill_score: 1,
            shot_damage: 34,
            max_hp: 100,
            alpha_home: Vec3::new(-48.0, 2.0, 0.0),
            bravo_home: Vec3::new(48.0, 2.0, 0.0),
        }
    }
}

impl CtfConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("BLOCKFRONT_CTF_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
        {
            match toml::from_str::<Self>(&contents) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Ignoring unreadable CTF config")
                },
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/ctf.toml")
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: CtfConfig = toml::from_str(
            r#"
            shot_damage = 50

            [alpha_home]
            x = -10.0
            y = 4.0
            z = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.shot_damage, 50);
        assert_eq!(config.alpha_home, Vec3::new(-10.0, 4.0, 1.0));
        assert_eq!(config.max_hp, 100);
        assert!((config.pickup_radius - 2.25).abs() < f64::EPSILON);
    }

    #[test]
    fn defaults_match_gameplay_constants() {
        let config = CtfConfig::default();
        assert_eq!(config.capture_score, 500);
        assert_eq!(config.kill_score, 1);
        assert!((config.capture_radius - 3.1).abs() < f64::EPSILON);
        assert!((config.home_tolerance - 0.25).abs() < f64::EPSILON);
    }
}
