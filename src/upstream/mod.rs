//! Upstream groups: static peer registries plus their shared live state.

mod peer;
mod registry;

pub use peer::Peer;
pub use registry::PeerRegistry;

use crate::affinity::{self, SessionRequest};
use crate::config::{AffinityConfig, UpstreamConfig};
use crate::metrics::MetricsCollector;
use crate::select::{self, Outcome, SelectError, Selected, SelectionContext};
use crate::shared::{ArenaError, SharedArena, SharedStats};
use crate::status::{PeerSnapshot, UpstreamSnapshot};
use crate::util::unix_millis;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream {name} has no primary peers")]
    NoPeers { name: String },

    #[error("shared region allocation failed: {0}")]
    Arena(#[from] ArenaError),
}

/// One upstream group: its peers, backup peers, and shared statistics.
///
/// The facade wraps the selection engine with token resolution, metrics,
/// and logging. Backup peers hold statistics slots after the primary
/// block and show up in snapshots, but the engine never selects them.
#[derive(Debug)]
pub struct Upstream {
    name: String,
    affinity: AffinityConfig,
    peers: PeerRegistry,
    backup: PeerRegistry,
    stats: SharedStats,
    metrics: Arc<MetricsCollector>,
}

impl Upstream {
    pub fn new(
        config: &UpstreamConfig,
        arena: &SharedArena,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self, UpstreamError> {
        let peers = PeerRegistry::from_servers(config.servers.iter().filter(|s| !s.backup));
        let backup = PeerRegistry::from_servers(config.servers.iter().filter(|s| s.backup));

        if peers.is_empty() {
            return Err(UpstreamError::NoPeers {
                name: config.name.clone(),
            });
        }

        let stats = SharedStats::new(arena, peers.len() + backup.len())?;
        stats.ensure_initialized(
            peers
                .iter()
                .map(|p| p.weight)
                .chain(backup.iter().map(|p| p.weight)),
        );

        debug!(
            upstream = %config.name,
            peers = peers.len(),
            backup = backup.len(),
            "upstream initialized"
        );

        Ok(Self {
            name: config.name.clone(),
            affinity: config.affinity.clone(),
            peers,
            backup,
            stats,
            metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn backup_peers(&self) -> &PeerRegistry {
        &self.backup
    }

    /// Open a request: resolve its affinity token and allocate its id.
    ///
    /// A malformed token source is logged and treated as no token; the
    /// request still goes through weighted selection.
    pub fn start_request(&self, request: &SessionRequest<'_>) -> SelectionContext {
        let token = match affinity::resolve_token(request, &self.affinity) {
            Ok(token) => token.map(str::to_string),
            Err(error) => {
                warn!(
                    upstream = %self.name,
                    error = %error,
                    "affinity token resolution failed, selecting without affinity"
                );
                None
            }
        };

        self.metrics.record_request(&self.name);
        select::start_request(&self.stats, self.peers.len(), token)
    }

    /// Select a peer for the next connection attempt of this request.
    pub fn select_peer(&self, ctx: &mut SelectionContext) -> Result<Selected<'_>, SelectError> {
        match select::select_peer(&self.peers, &self.stats, self.affinity.match_mode, ctx) {
            Ok(selected) => {
                self.metrics.record_selection(&self.name, selected.strategy);
                debug!(
                    upstream = %self.name,
                    peer = %selected.name,
                    strategy = selected.strategy.as_str(),
                    request_id = ctx.request_id(),
                    "peer selected"
                );
                Ok(selected)
            }
            Err(error) => {
                self.metrics.record_selection_failure(&self.name);
                warn!(
                    upstream = %self.name,
                    request_id = ctx.request_id(),
                    "no peer available"
                );
                Err(error)
            }
        }
    }

    /// Report how the attempt against the selected peer ended.
    pub fn report_outcome(&self, ctx: &mut SelectionContext, outcome: Outcome) {
        let Some(index) = select::report_outcome(&self.peers, &self.stats, ctx, outcome) else {
            return;
        };

        if outcome == Outcome::Failure {
            let peer = self.peers.peer(index);
            self.metrics.record_peer_failure(&self.name, &peer.name);
            debug!(
                upstream = %self.name,
                peer = %peer.name,
                fails = self.stats.slot(index).fails(),
                "peer failure recorded"
            );
        }
    }

    /// Unlocked, stale-tolerant view of the group for diagnostics.
    pub fn snapshot(&self) -> UpstreamSnapshot {
        let primary_len = self.peers.len();
        let peers = self
            .peers
            .iter()
            .map(|p| self.peer_snapshot(p, p.index, false))
            .chain(
                self.backup
                    .iter()
                    .map(|p| self.peer_snapshot(p, primary_len + p.index, true)),
            )
            .collect();

        UpstreamSnapshot {
            name: self.name.clone(),
            total_active: self.stats.total_active(),
            total_requests: self.stats.total_requests(),
            taken_at_ms: unix_millis(),
            peers,
        }
    }

    fn peer_snapshot(&self, peer: &Peer, slot_index: usize, backup: bool) -> PeerSnapshot {
        let slot = self.stats.slot(slot_index);
        PeerSnapshot {
            name: peer.name.clone(),
            route: peer.route.clone(),
            weight: peer.weight,
            credit: slot.credit(),
            max_fails: peer.max_fails,
            fails: slot.fails(),
            down: peer.down,
            backup,
            active: slot.active(),
            total: slot.total(),
            last_req_id: slot.last_req_id(),
            last_fail_ms: slot.last_fail_ms(),
        }
    }
}
