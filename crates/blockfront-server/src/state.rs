use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;

use blockfront_ctf::CtfConfig;

use crate::config::ServerConfig;
use crate::room_manager::RoomRegistry;

/// Every room mutation takes the write lock, so block edits, flag transitions
/// and shot resolution for a room never interleave.
pub type SharedRoomRegistry = Arc<RwLock<RoomRegistry>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomRegistry,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_ctf_config(config, CtfConfig::load())
    }

    pub fn with_ctf_config(config: ServerConfig, ctf: CtfConfig) -> Self {
        let registry = RoomRegistry::new(&config.rooms, ctf);
        Self {
            rooms: Arc::new(RwLock::new(registry)),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// Holds one slot of the WebSocket connection budget; released on drop.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    /// Reserve a slot unless `max` connections are already open.
    pub fn try_acquire(count: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;
        Some(Self {
            count: Arc::clone(count),
        })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
