//! Peer selection and outcome reporting.
//!
//! Selection runs in two passes over the registry, both under the region
//! lock. The affinity pass honors the request's session token; the
//! weighted pass rotates through remaining credit. Both passes share one
//! availability filter covering the tried set, administrative down, and
//! the failure circuit breaker.

use crate::affinity::route_matches;
use crate::config::MatchMode;
use crate::select::context::{Outcome, SelectError, Selected, SelectionContext, SelectionStrategy};
use crate::select::tried::TriedSet;
use crate::shared::{PeerStats, RegionLock, SharedStats};
use crate::upstream::{Peer, PeerRegistry};
use crate::util::unix_millis;

/// Open a request: allocate its id and snapshot the rotation cursor.
pub fn start_request<L: RegionLock>(
    stats: &SharedStats<L>,
    peer_count: usize,
    token: Option<String>,
) -> SelectionContext {
    let (request_id, cursor) = stats.with_lock(|| (stats.next_request_id(), stats.cursor()));
    SelectionContext::new(token, request_id, cursor, peer_count)
}

/// Select a peer for the next connection attempt.
///
/// Each call advances the context cursor one step and spends one unit of
/// the tries budget. On success the choice is committed to the shared
/// block; the caller must pair it with [`report_outcome`]. When nothing
/// is selectable every failure streak is cleared so the next request
/// probes afresh, and the request is refused.
pub fn select_peer<'a, L: RegionLock>(
    peers: &'a PeerRegistry,
    stats: &SharedStats<L>,
    mode: MatchMode,
    ctx: &mut SelectionContext,
) -> Result<Selected<'a>, SelectError> {
    let n = peers.len();
    if n == 0 {
        return Err(SelectError::NoPeerAvailable);
    }

    // Clock reads stay outside the critical section.
    let now_ms = unix_millis();

    stats.with_lock(|| {
        ctx.cursor = (ctx.cursor + 1) % n;
        ctx.tries = ctx.tries.saturating_sub(1);

        let Some((index, strategy)) = choose(peers, stats, ctx, mode, now_ms) else {
            for peer in peers.iter() {
                stats.slot(peer.index).reset_fails();
            }
            ctx.chosen = None;
            return Err(SelectError::NoPeerAvailable);
        };

        ctx.tried.insert(index);
        ctx.chosen = Some(index);
        stats.set_cursor(index);

        let slot = stats.slot(index);
        slot.consume_credit();
        slot.begin_request(ctx.request_id);
        stats.inc_total_active();

        let peer = peers.peer(index);
        Ok(Selected {
            index,
            address: peer.address,
            name: &peer.name,
            route: &peer.route,
            strategy,
        })
    })
}

/// Report how the attempt against the committed peer ended.
///
/// Safe to call unconditionally: a context with no committed choice is
/// left untouched, and the committed index is taken out of the context
/// so a duplicate report is a no-op. Returns the peer index the report
/// applied to.
pub fn report_outcome<L: RegionLock>(
    peers: &PeerRegistry,
    stats: &SharedStats<L>,
    ctx: &mut SelectionContext,
    outcome: Outcome,
) -> Option<usize> {
    let index = ctx.chosen.take()?;
    let now_ms = unix_millis();

    stats.with_lock(|| {
        let peer = peers.peer(index);
        let slot = stats.slot(index);

        slot.end_request();
        stats.dec_total_active();

        if outcome == Outcome::Failure {
            // max_fails 0 turns the breaker off; the streak and timestamp
            // are still recorded for diagnostics.
            let penalty = if peer.max_fails > 0 {
                i64::from(peer.weight / peer.max_fails)
            } else {
                0
            };
            slot.record_failure(now_ms, penalty);
        }

        // A single-peer group has no second peer to retry against.
        if peers.len() == 1 {
            ctx.tries = 0;
        }
    });

    Some(index)
}

fn choose<L: RegionLock>(
    peers: &PeerRegistry,
    stats: &SharedStats<L>,
    ctx: &SelectionContext,
    mode: MatchMode,
    now_ms: u64,
) -> Option<(usize, SelectionStrategy)> {
    if peers.len() > 1 {
        if let Some(token) = ctx.token.as_deref() {
            if let Some(index) = choose_by_route(peers, stats, ctx, token, mode, now_ms) {
                return Some((index, SelectionStrategy::Affinity));
            }
        }
    }
    choose_by_weight(peers, stats, ctx, now_ms)
        .map(|index| (index, SelectionStrategy::Weighted))
}

/// One wrapping scan for an available peer whose route matches the token.
fn choose_by_route<L: RegionLock>(
    peers: &PeerRegistry,
    stats: &SharedStats<L>,
    ctx: &SelectionContext,
    token: &str,
    mode: MatchMode,
    now_ms: u64,
) -> Option<usize> {
    let n = peers.len();
    for step in 0..n {
        let index = (ctx.cursor + step) % n;
        let peer = peers.peer(index);
        if route_matches(token, &peer.route, mode)
            && available(peer, stats.slot(index), &ctx.tried, now_ms)
        {
            return Some(index);
        }
    }
    None
}

/// Wrapping scan over peers with remaining credit, at most two passes.
///
/// A pass that finds nothing restores every credit to its static weight
/// before the rescan, so a group that merely ran out of credit recovers
/// within the same call while a group that is actually unavailable still
/// terminates.
fn choose_by_weight<L: RegionLock>(
    peers: &PeerRegistry,
    stats: &SharedStats<L>,
    ctx: &SelectionContext,
    now_ms: u64,
) -> Option<usize> {
    let n = peers.len();
    for _ in 0..2 {
        for step in 0..n {
            let index = (ctx.cursor + step) % n;
            let slot = stats.slot(index);
            if slot.credit() <= 0 {
                continue;
            }
            if available(peers.peer(index), slot, &ctx.tried, now_ms) {
                return Some(index);
            }
        }
        for peer in peers.iter() {
            stats.slot(peer.index).set_credit(i64::from(peer.weight));
        }
    }
    None
}

/// The availability filter shared by both passes.
///
/// A peer past its failure threshold becomes eligible again once
/// `fail_timeout` has elapsed since the last recorded failure; crossing
/// that boundary forgives the streak.
fn available(peer: &Peer, slot: &PeerStats, tried: &TriedSet, now_ms: u64) -> bool {
    if tried.contains(peer.index) || peer.down {
        return false;
    }
    if peer.max_fails == 0 || slot.fails() < u64::from(peer.max_fails) {
        return true;
    }
    if now_ms.saturating_sub(slot.last_fail_ms()) > peer.fail_timeout_ms() {
        slot.reset_fails();
        return true;
    }
    false
}
