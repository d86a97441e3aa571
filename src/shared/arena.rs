//! Capacity-accounted allocation for the shared statistics region.
//!
//! The arena fronts a fixed-size region. Allocations are accounted
//! against the configured capacity up front, so callers see exhaustion
//! at startup rather than partway through building peer state, and the
//! backing store can move to a memory mapping without changing callers.

use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("shared region exhausted: requested {requested} bytes, {available} available")]
    Exhausted { requested: usize, available: usize },
}

/// Fixed-capacity allocator for shared per-peer state.
pub struct SharedArena {
    capacity: usize,
    used: AtomicUsize,
}

impl SharedArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
        }
    }

    /// Allocate a slice of `count` default-initialized values.
    pub fn allocate<T: Default>(&self, count: usize) -> Result<Box<[T]>, ArenaError> {
        let requested = std::mem::size_of::<T>().saturating_mul(count);
        self.reserve(requested)?;
        Ok((0..count).map(|_| T::default()).collect())
    }

    /// Reserve `requested` bytes against remaining capacity.
    fn reserve(&self, requested: usize) -> Result<(), ArenaError> {
        let mut used = self.used.load(Ordering::Relaxed);
        loop {
            let available = self.capacity - used;
            if requested > available {
                return Err(ArenaError::Exhausted {
                    requested,
                    available,
                });
            }
            match self.used.compare_exchange_weak(
                used,
                used + requested,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => used = actual,
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn available(&self) -> usize {
        self.capacity - self.used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_within_capacity() {
        let arena = SharedArena::new(1024);
        let slice = arena.allocate::<u64>(16).unwrap();
        assert_eq!(slice.len(), 16);
        assert_eq!(arena.used(), 128);
        assert_eq!(arena.available(), 1024 - 128);
    }

    #[test]
    fn test_exhaustion_reports_requested_and_available() {
        let arena = SharedArena::new(64);
        arena.allocate::<u64>(4).unwrap();

        let err = arena.allocate::<u64>(8).unwrap_err();
        match err {
            ArenaError::Exhausted {
                requested,
                available,
            } => {
                assert_eq!(requested, 64);
                assert_eq!(available, 32);
            }
        }
    }

    #[test]
    fn test_exact_fit() {
        let arena = SharedArena::new(64);
        arena.allocate::<u8>(64).unwrap();
        assert_eq!(arena.available(), 0);
        assert!(arena.allocate::<u8>(1).is_err());
    }

    #[test]
    fn test_zero_count_allocation() {
        let arena = SharedArena::new(0);
        let slice = arena.allocate::<u64>(0).unwrap();
        assert!(slice.is_empty());
    }
}
