//! Immutable, weight-ordered peer list.

use crate::config::ServerConfig;
use crate::upstream::Peer;

/// Ordered collection of peers for one upstream group.
///
/// Peers are sorted descending by static weight; the sort is stable, so
/// equally weighted peers keep their configured order. Indices assigned
/// after the sort are the ones the selection engine and the shared
/// statistics block use.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: Vec<Peer>,
}

impl PeerRegistry {
    pub(crate) fn from_servers<'a, I>(servers: I) -> Self
    where
        I: IntoIterator<Item = &'a ServerConfig>,
    {
        let mut peers: Vec<Peer> = servers.into_iter().map(Peer::from_config).collect();

        peers.sort_by_key(|peer| std::cmp::Reverse(peer.weight));
        for (index, peer) in peers.iter_mut().enumerate() {
            peer.index = index;
        }

        Self { peers }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Peer> {
        self.peers.get(index)
    }

    /// Indexed access for indices the registry itself handed out.
    pub fn peer(&self, index: usize) -> &Peer {
        &self.peers[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    /// Linear scan for the first peer carrying `route`.
    pub fn find_by_route(&self, route: &str) -> Option<&Peer> {
        self.peers.iter().find(|peer| peer.route == route)
    }
}
