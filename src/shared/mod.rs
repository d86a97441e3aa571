//! Cross-worker shared state: arena, region lock, statistics block.

mod arena;
mod lock;
mod stats;

pub use arena::{ArenaError, SharedArena};
pub use lock::{LockGuard, ProcessLock, RegionLock, SpinLock};
pub use stats::{PeerStats, SharedStats};
