//! Read-only diagnostics: point-in-time snapshots of upstream state and
//! their text rendering.
//!
//! Snapshots read the shared block without taking the region lock, so a
//! row may mix values from adjacent updates. That is acceptable for a
//! status page; nothing here feeds back into selection.

mod server;

pub use server::run_status_server;

use std::fmt;
use std::time::Duration;

/// Point-in-time view of one peer.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub name: String,
    pub route: String,
    pub weight: u32,
    pub credit: i64,
    pub max_fails: u32,
    pub fails: u64,
    pub down: bool,
    pub backup: bool,
    pub active: u64,
    pub total: u64,
    pub last_req_id: u64,
    /// Unix milliseconds of the last recorded failure; 0 = never.
    pub last_fail_ms: u64,
}

/// Point-in-time view of one upstream group, primary peers first.
#[derive(Debug, Clone)]
pub struct UpstreamSnapshot {
    pub name: String,
    pub total_active: u64,
    pub total_requests: u64,
    /// Unix milliseconds at capture, the reference point for elapsed
    /// times in the rendering.
    pub taken_at_ms: u64,
    pub peers: Vec<PeerSnapshot>,
}

impl fmt::Display for UpstreamSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "upstream {}: active {}, requests {}",
            self.name, self.total_active, self.total_requests
        )?;
        for peer in &self.peers {
            writeln!(
                f,
                "  {} {} route={} status={} weight={}/{} fails={}/{} active={} total={} last_req={} last_fail={}",
                if peer.backup { "backup" } else { "server" },
                peer.name,
                peer.route,
                if peer.down { "down" } else { "up" },
                peer.credit,
                peer.weight,
                peer.fails,
                peer.max_fails,
                peer.active,
                peer.total,
                peer.last_req_id,
                self.elapsed_since_failure(peer),
            )?;
        }
        Ok(())
    }
}

impl UpstreamSnapshot {
    fn elapsed_since_failure(&self, peer: &PeerSnapshot) -> String {
        if peer.last_fail_ms == 0 {
            return "never".to_string();
        }
        let elapsed_ms = self.taken_at_ms.saturating_sub(peer.last_fail_ms);
        let rounded = Duration::from_secs(elapsed_ms / 1000);
        format!("{} ago", humantime::format_duration(rounded))
    }
}
