//! Selection engine: per-request context, tried-set, and the two-pass
//! peer choice algorithm.

mod context;
mod engine;
mod tried;

pub use context::{Outcome, SelectError, Selected, SelectionContext, SelectionStrategy};
pub use engine::{report_outcome, select_peer, start_request};
