//! Locking primitives guarding the shared statistics region.
//!
//! Selection reads and writes several counters as one atomic step, so the
//! whole region is serialized behind a single lock. The lock strategy is a
//! trait seam: the default [`SpinLock`] matches the short critical sections
//! of peer selection, while [`ProcessLock`] trades spin time for parking
//! when contention is expected to be long-lived.

use std::sync::atomic::{AtomicU32, Ordering};

/// A lock protecting one shared statistics region.
///
/// `acquire` and `release` must be paired; [`LockGuard`] enforces this.
pub trait RegionLock: Default + Send + Sync + 'static {
    fn acquire(&self);
    fn release(&self);
}

/// RAII guard releasing a [`RegionLock`] on drop.
pub struct LockGuard<'a, L: RegionLock> {
    lock: &'a L,
}

impl<'a, L: RegionLock> LockGuard<'a, L> {
    pub fn new(lock: &'a L) -> Self {
        lock.acquire();
        Self { lock }
    }
}

impl<L: RegionLock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Bound on busy-wait iterations before yielding the thread.
const SPIN_LIMIT: u32 = 1024;

/// Test-and-set spinlock with bounded exponential backoff.
///
/// Critical sections in the selection path are a handful of counter
/// updates, so contending threads spin with `spin_loop` hints and fall
/// back to `yield_now` only after [`SPIN_LIMIT`] iterations.
#[derive(Debug, Default)]
pub struct SpinLock {
    state: AtomicU32,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    fn try_acquire(&self) -> bool {
        self.state.load(Ordering::Relaxed) == 0
            && self
                .state
                .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }
}

impl RegionLock for SpinLock {
    fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }

            let mut spins = 1u32;
            while spins < SPIN_LIMIT {
                for _ in 0..spins {
                    std::hint::spin_loop();
                }
                if self.try_acquire() {
                    return;
                }
                spins <<= 1;
            }

            std::thread::yield_now();
        }
    }

    fn release(&self) {
        self.state.store(0, Ordering::Release);
    }
}

/// Parking lock for regions with longer or more contended critical
/// sections.
pub struct ProcessLock {
    raw: parking_lot::RawMutex,
}

impl Default for ProcessLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLock {
    pub const fn new() -> Self {
        use parking_lot::lock_api::RawMutex as _;
        Self {
            raw: parking_lot::RawMutex::INIT,
        }
    }
}

impl RegionLock for ProcessLock {
    fn acquire(&self) {
        use parking_lot::lock_api::RawMutex as _;
        self.raw.lock();
    }

    fn release(&self) {
        use parking_lot::lock_api::RawMutex as _;
        // Safety: `release` is only reached through a guard that holds
        // the lock.
        unsafe { self.raw.unlock() }
    }
}
