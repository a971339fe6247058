//! Retry and fallback policy.
//!
//! Encapsulates attempt budgets (full retry budget for the primary URL, one
//! try per fallback), exponential backoff with cancellation-aware sleeps,
//! and the per-job driver that turns a `JobSpec` into exactly one terminal
//! result event.

mod policy;
mod run;

pub use policy::{attempts_for, BackoffPolicy};
pub(crate) use run::execute_job;
