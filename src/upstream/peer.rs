//! Static peer attributes.

use crate::config::ServerConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// One configured backend server, frozen at startup.
///
/// `index` is the peer's position in its registry after the weight sort
/// and doubles as its slot index in the shared statistics block.
#[derive(Debug, Clone)]
pub struct Peer {
    pub index: usize,
    pub address: SocketAddr,
    /// Display name, the configured address text.
    pub name: String,
    /// Affinity identifier matched against session tokens.
    pub route: String,
    /// Static selection weight. A peer marked `down` carries weight 0
    /// regardless of configuration.
    pub weight: u32,
    /// Failure threshold for circuit breaking; 0 disables it.
    pub max_fails: u32,
    pub fail_timeout: Duration,
    pub down: bool,
}

impl Peer {
    pub(crate) fn from_config(config: &ServerConfig) -> Self {
        Self {
            index: 0,
            address: config.address,
            name: config.address.to_string(),
            route: config.route.clone(),
            weight: if config.down { 0 } else { config.weight },
            max_fails: config.max_fails,
            fail_timeout: config.fail_timeout,
            down: config.down,
        }
    }

    pub fn fail_timeout_ms(&self) -> u64 {
        self.fail_timeout.as_millis() as u64
    }
}
