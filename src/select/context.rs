//! Per-request selection state.

use crate::select::tried::TriedSet;
use std::net::SocketAddr;
use thiserror::Error;

/// State threaded through one request's selection attempts.
///
/// Created by `start_request`, consumed by `select_peer` and
/// `report_outcome`. Holds everything the engine needs so that retries
/// within the request never re-resolve the token or re-read the shared
/// cursor.
#[derive(Debug)]
pub struct SelectionContext {
    /// Resolved affinity token, if the request carried one.
    pub(crate) token: Option<String>,
    /// Scan start position, advanced once per selection call.
    pub(crate) cursor: usize,
    /// Peers already handed out for this request.
    pub(crate) tried: TriedSet,
    /// The peer awaiting an outcome report. `None` between attempts and
    /// after exhaustion.
    pub(crate) chosen: Option<usize>,
    /// Id allocated from the shared request counter.
    pub(crate) request_id: u64,
    /// Remaining attempts, starting at the peer count.
    pub(crate) tries: u32,
}

impl SelectionContext {
    pub(crate) fn new(
        token: Option<String>,
        request_id: u64,
        cursor: usize,
        peer_count: usize,
    ) -> Self {
        Self {
            token,
            cursor,
            tried: TriedSet::new(peer_count),
            chosen: None,
            request_id,
            tries: peer_count as u32,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Attempts left; callers stop retrying at zero.
    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn chosen(&self) -> Option<usize> {
        self.chosen
    }
}

/// Which pass produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// The affinity token matched the peer's route.
    Affinity,
    /// Weighted rotation, including tokenless requests.
    Weighted,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::Affinity => "affinity",
            SelectionStrategy::Weighted => "weighted",
        }
    }
}

/// A committed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selected<'a> {
    pub index: usize,
    pub address: SocketAddr,
    pub name: &'a str,
    pub route: &'a str,
    pub strategy: SelectionStrategy,
}

/// How an attempt against the selected peer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// Every peer was tried, unhealthy, or administratively down.
    #[error("no peer available")]
    NoPeerAvailable,
}
