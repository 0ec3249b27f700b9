use serde::Deserialize;

use blockfront_core::room::{DEFAULT_ROOM_CODE, ROOM_CAPACITY};

/// Top-level server configuration, loaded from `blockfront.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Origins allowed to open the event channel. `*` allows any.
    pub allowed_origins: Vec<String>,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            allowed_origins: vec!["*".to_string()],
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 500,
            ws_rate_limit_per_sec: 60.0,
            player_message_buffer: 256,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub capacity: usize,
    /// Code of the persistent room every join lands in.
    pub default_room_code: String,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            capacity: ROOM_CAPACITY,
            default_room_code: DEFAULT_ROOM_CODE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid { field, reason } => write!(f, "{field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ServerConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allows_any_origin()
            || self
                .allowed_origins
                .iter()
                .any(|o| o.eq_ignore_ascii_case(origin.trim_end_matches('/')))
    }

    /// Check values that would make the server unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(invalid("port", "must be > 0"));
        }
        if self.allowed_origins.is_empty() {
            return Err(invalid("allowed_origins", "must list at least one origin or \"*\""));
        }
        if self.limits.max_ws_connections == 0 {
            return Err(invalid("limits.max_ws_connections", "must be > 0"));
        }
        let rate = self.limits.ws_rate_limit_per_sec;
        if rate.is_nan() || rate <= 0.0 {
            return Err(invalid("limits.ws_rate_limit_per_sec", "must be > 0"));
        }
        if self.limits.player_message_buffer == 0 {
            return Err(invalid("limits.player_message_buffer", "must be > 0"));
        }
        if self.rooms.capacity == 0 {
            return Err(invalid("rooms.capacity", "must be > 0"));
        }
        if self.rooms.default_room_code.trim().is_empty() {
            return Err(invalid("rooms.default_room_code", "must not be empty"));
        }
        Ok(())
    }

    /// Load config from `blockfront.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("blockfront.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from blockfront.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse blockfront.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No blockfront.toml found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("PORT")
            && let Ok(port) = val.trim().parse::<u16>()
        {
            self.port = port;
        }
        if let Some(val) = lookup("ALLOWED_ORIGINS")
            && !val.trim().is_empty()
        {
            self.allowed_origins = parse_origins(&val);
        }
        if let Some(val) = lookup("BLOCKFRONT_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = lookup("BLOCKFRONT_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
    }
}
