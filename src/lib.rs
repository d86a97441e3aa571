//! Session-affinity peer selection for reverse proxies.
//!
//! An [`upstream::Upstream`] owns an immutable, weight-ordered peer
//! registry and a shared statistics block. For each request it resolves
//! the session token from the cookie header or request URI, selects the
//! peer the session is pinned to, and falls back to weighted rotation
//! with per-peer circuit breaking when the pinned peer is unavailable.
//! Outcome reports feed the failure accounting that drives the breaker.
//!
//! The crate stops at selection: connecting to the returned address is
//! the caller's transport concern.

pub mod affinity;
pub mod config;
pub mod metrics;
pub mod select;
pub mod session;
pub mod shared;
pub mod status;
pub mod upstream;
pub mod util;

pub use affinity::{ResolveError, SessionRequest};
pub use config::{Config, load_config, validate_config};
pub use select::{Outcome, SelectError, Selected, SelectionContext};
pub use session::SessionCache;
pub use upstream::{Upstream, UpstreamError};
