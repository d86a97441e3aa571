//! Process-local per-peer session slots.
//!
//! Holds one resumable session (typically a TLS session ticket) per
//! peer, so a worker reconnecting to a peer it has spoken to before can
//! resume instead of performing a full handshake. The cache is
//! deliberately local to the process: session material is not shareable
//! state, and selection never consults it.

use dashmap::DashMap;

/// One saved session per peer index.
pub struct SessionCache<S> {
    sessions: DashMap<usize, S>,
}

impl<S: Clone> SessionCache<S> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// The saved session for `peer`, if any.
    pub fn get(&self, peer: usize) -> Option<S> {
        self.sessions.get(&peer).map(|entry| entry.value().clone())
    }

    /// Save the session negotiated with `peer`, returning the one it
    /// displaced.
    pub fn save(&self, peer: usize, session: S) -> Option<S> {
        self.sessions.insert(peer, session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S: Clone> Default for SessionCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_misses() {
        let cache: SessionCache<Vec<u8>> = SessionCache::new();
        assert_eq!(cache.get(0), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_and_resume() {
        let cache = SessionCache::new();
        assert_eq!(cache.save(2, b"ticket-a".to_vec()), None);
        assert_eq!(cache.get(2), Some(b"ticket-a".to_vec()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_save_displaces_previous_session() {
        let cache = SessionCache::new();
        cache.save(1, b"old".to_vec());
        let displaced = cache.save(1, b"new".to_vec());
        assert_eq!(displaced, Some(b"old".to_vec()));
        assert_eq!(cache.get(1), Some(b"new".to_vec()));
    }

    #[test]
    fn test_slots_are_per_peer() {
        let cache = SessionCache::new();
        cache.save(0, b"a".to_vec());
        cache.save(1, b"b".to_vec());
        assert_eq!(cache.get(0), Some(b"a".to_vec()));
        assert_eq!(cache.get(1), Some(b"b".to_vec()));
    }
}
