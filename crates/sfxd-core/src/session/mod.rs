//! Bounded-concurrency download sessions.
//!
//! One `run_session` call is one run: it seeds the backlog, admits jobs up
//! to the concurrency limit, executes each with retry/fallback on a
//! blocking worker, and drains worker events from a single consumer loop
//! until backlog and active set are both empty. All run bookkeeping is
//! owned by that consumer, so no locks guard the counters.

mod aggregate;
mod run;

pub use aggregate::SessionAggregate;
pub use run::{run_session, SessionOptions};
