//! Prometheus metrics for selection traffic.
//!
//! Counters are bumped at event time from the upstream facade; per-peer
//! gauges are synced from a snapshot when the exporter is scraped.

use crate::select::SelectionStrategy;
use crate::status::UpstreamSnapshot;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct UpstreamLabels {
    upstream: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SelectionLabels {
    upstream: String,
    strategy: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PeerLabels {
    upstream: String,
    peer: String,
}

/// Registry plus the metric families the crate reports into.
#[derive(Debug)]
pub struct MetricsCollector {
    registry: Registry,
    requests_total: Family<UpstreamLabels, Counter>,
    selections_total: Family<SelectionLabels, Counter>,
    selection_failures_total: Family<UpstreamLabels, Counter>,
    peer_failures_total: Family<PeerLabels, Counter>,
    peer_active: Family<PeerLabels, Gauge>,
    peer_credit: Family<PeerLabels, Gauge>,
    peer_fails: Family<PeerLabels, Gauge>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let requests_total = Family::<UpstreamLabels, Counter>::default();
        registry.register(
            "stickylb_requests",
            "Requests entering peer selection",
            requests_total.clone(),
        );

        let selections_total = Family::<SelectionLabels, Counter>::default();
        registry.register(
            "stickylb_selections",
            "Committed peer selections by strategy",
            selections_total.clone(),
        );

        let selection_failures_total = Family::<UpstreamLabels, Counter>::default();
        registry.register(
            "stickylb_selection_failures",
            "Requests refused because no peer was available",
            selection_failures_total.clone(),
        );

        let peer_failures_total = Family::<PeerLabels, Counter>::default();
        registry.register(
            "stickylb_peer_failures",
            "Failed attempts reported against a peer",
            peer_failures_total.clone(),
        );

        let peer_active = Family::<PeerLabels, Gauge>::default();
        registry.register(
            "stickylb_peer_active_requests",
            "In-flight requests per peer",
            peer_active.clone(),
        );

        let peer_credit = Family::<PeerLabels, Gauge>::default();
        registry.register(
            "stickylb_peer_credit",
            "Remaining selection credit per peer",
            peer_credit.clone(),
        );

        let peer_fails = Family::<PeerLabels, Gauge>::default();
        registry.register(
            "stickylb_peer_consecutive_fails",
            "Current failure streak per peer",
            peer_fails.clone(),
        );

        Self {
            registry,
            requests_total,
            selections_total,
            selection_failures_total,
            peer_failures_total,
            peer_active,
            peer_credit,
            peer_fails,
        }
    }

    pub fn record_request(&self, upstream: &str) {
        self.requests_total
            .get_or_create(&UpstreamLabels {
                upstream: upstream.to_string(),
            })
            .inc();
    }

    pub fn record_selection(&self, upstream: &str, strategy: SelectionStrategy) {
        self.selections_total
            .get_or_create(&SelectionLabels {
                upstream: upstream.to_string(),
                strategy: strategy.as_str().to_string(),
            })
            .inc();
    }

    pub fn record_selection_failure(&self, upstream: &str) {
        self.selection_failures_total
            .get_or_create(&UpstreamLabels {
                upstream: upstream.to_string(),
            })
            .inc();
    }

    pub fn record_peer_failure(&self, upstream: &str, peer: &str) {
        self.peer_failures_total
            .get_or_create(&PeerLabels {
                upstream: upstream.to_string(),
                peer: peer.to_string(),
            })
            .inc();
    }

    /// Refresh the per-peer gauges from a snapshot.
    pub fn sync_gauges(&self, snapshot: &UpstreamSnapshot) {
        for peer in &snapshot.peers {
            let labels = PeerLabels {
                upstream: snapshot.name.clone(),
                peer: peer.name.clone(),
            };
            self.peer_active.get_or_create(&labels).set(peer.active as i64);
            self.peer_credit.get_or_create(&labels).set(peer.credit);
            self.peer_fails.get_or_create(&labels).set(peer.fails as i64);
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
