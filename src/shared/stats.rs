//! The shared statistics block.
//!
//! One [`SharedStats`] instance backs one upstream group. Worker threads
//! funnel every selection and outcome mutation through [`SharedStats::with_lock`];
//! the slots themselves are atomics so diagnostics can take unlocked,
//! stale-tolerant reads.

use crate::shared::arena::{ArenaError, SharedArena};
use crate::shared::lock::{LockGuard, RegionLock, SpinLock};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};

/// Live counters for a single peer.
///
/// All fields are mutated only while the region lock is held, so plain
/// load/store with relaxed ordering is sufficient; the lock provides the
/// synchronization edges.
#[derive(Debug, Default)]
pub struct PeerStats {
    /// Requests currently in flight to this peer.
    active: AtomicU64,
    /// Total requests ever routed to this peer.
    total: AtomicU64,
    /// Request id of the most recent request routed here.
    last_req_id: AtomicU64,
    /// Consecutive failures since the last success window.
    fails: AtomicU64,
    /// Remaining selection credit. Starts at the static weight and is
    /// clamped to [0, weight].
    credit: AtomicI64,
    /// Unix milliseconds of the most recent recorded failure.
    last_fail_ms: AtomicU64,
}

impl PeerStats {
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn last_req_id(&self) -> u64 {
        self.last_req_id.load(Ordering::Relaxed)
    }

    pub fn fails(&self) -> u64 {
        self.fails.load(Ordering::Relaxed)
    }

    pub fn credit(&self) -> i64 {
        self.credit.load(Ordering::Relaxed)
    }

    pub fn last_fail_ms(&self) -> u64 {
        self.last_fail_ms.load(Ordering::Relaxed)
    }

    /// Record that a request was routed to this peer.
    pub fn begin_request(&self, req_id: u64) {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
        self.last_req_id.store(req_id, Ordering::Relaxed);
    }

    /// Record that a previously routed request finished.
    pub fn end_request(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Spend one unit of selection credit, never dropping below zero.
    pub fn consume_credit(&self) {
        let credit = self.credit.load(Ordering::Relaxed);
        self.credit.store((credit - 1).max(0), Ordering::Relaxed);
    }

    pub fn set_credit(&self, credit: i64) {
        self.credit.store(credit, Ordering::Relaxed);
    }

    /// Record a failed attempt: bump the failure streak, stamp the clock,
    /// and charge `penalty` units of credit (floored at zero).
    pub fn record_failure(&self, now_ms: u64, penalty: i64) {
        self.fails.fetch_add(1, Ordering::Relaxed);
        self.last_fail_ms.store(now_ms, Ordering::Relaxed);
        let credit = self.credit.load(Ordering::Relaxed);
        self.credit.store((credit - penalty).max(0), Ordering::Relaxed);
    }

    pub fn reset_fails(&self) {
        self.fails.store(0, Ordering::Relaxed);
    }
}

/// Shared mutable state for one upstream group.
#[derive(Debug)]
pub struct SharedStats<L: RegionLock = SpinLock> {
    slots: Box<[PeerStats]>,
    total_active: AtomicU64,
    total_requests: AtomicU64,
    /// Rotation cursor; selection scans start one past this index.
    cursor: AtomicUsize,
    initialized: AtomicBool,
    lock: L,
}

impl<L: RegionLock> SharedStats<L> {
    /// Allocate slots for `peer_count` peers out of `arena`.
    ///
    /// The rotation cursor starts at the last index so the first scan
    /// begins at peer zero.
    pub fn new(arena: &SharedArena, peer_count: usize) -> Result<Self, ArenaError> {
        let slots = arena.allocate::<PeerStats>(peer_count)?;
        Ok(Self {
            slots,
            total_active: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            cursor: AtomicUsize::new(peer_count.saturating_sub(1)),
            initialized: AtomicBool::new(false),
            lock: L::default(),
        })
    }

    /// Seed each slot's credit from the peers' static weights.
    ///
    /// Idempotent: only the first caller writes anything. Runs during
    /// startup while the owner is still single-threaded, but takes the
    /// lock anyway so late callers cannot observe half-seeded credits.
    pub fn ensure_initialized<I>(&self, weights: I)
    where
        I: IntoIterator<Item = u32>,
    {
        let _guard = LockGuard::new(&self.lock);
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        for (slot, weight) in self.slots.iter().zip(weights) {
            slot.set_credit(i64::from(weight));
        }
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Run `f` while holding the region lock. The lock is released on
    /// every exit path, including unwinding.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = LockGuard::new(&self.lock);
        f()
    }

    pub fn slot(&self, index: usize) -> &PeerStats {
        &self.slots[index]
    }

    /// Allocate the next request id. Call under the lock.
    pub fn next_request_id(&self) -> u64 {
        self.total_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_active(&self) -> u64 {
        self.total_active.load(Ordering::Relaxed)
    }

    pub fn inc_total_active(&self) {
        self.total_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_total_active(&self) {
        self.total_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn set_cursor(&self, index: usize) {
        self.cursor.store(index, Ordering::Relaxed);
    }
}
