//! Cooperative cancellation: per-job tokens and the session-wide registry.
//!
//! Each admitted job gets a `CancelToken` that its worker polls at every
//! suspension point (before attempts, during backoff sleeps, inside the
//! transfer progress callback). A `SessionControl` handle lets an external
//! driver cancel one job or the whole run; cancellation is cooperative, so
//! an in-flight transfer stops at its next callback rather than being torn
//! down preemptively.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::job::JobId;

/// Shared cancel flag for one job (or the whole session).
///
/// Cheap to clone; `cancel` uses release ordering and `is_cancelled` acquire
/// ordering so a worker reliably observes a cancellation issued from the
/// controller thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleeps for `total`, polling the flag every `poll` so a cancellation is
    /// observed within that granularity. Returns false if cancelled first.
    pub fn sleep_for(&self, total: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return true;
            };
            if left.is_zero() {
                return true;
            }
            std::thread::sleep(left.min(poll));
        }
    }
}

/// Registry of active jobs plus pre-start cancellations and the run stop flag.
///
/// The scheduler registers a token when it admits a job and unregisters it on
/// the job's terminal event. `cancel_job` on a job that has not started yet is
/// remembered and honoured at admission time (the job is dropped without ever
/// running, and without emitting a result).
#[derive(Debug, Default)]
pub struct SessionControl {
    active: RwLock<HashMap<JobId, CancelToken>>,
    pre_start: RwLock<HashSet<JobId>>,
    stop: CancelToken,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an admitted job; returns the token its worker will poll.
    /// If a stop was already requested, the token comes back pre-cancelled so
    /// a worker admitted in the same instant still stops before its first
    /// attempt.
    pub(crate) fn register(&self, job_id: JobId) -> CancelToken {
        let token = CancelToken::new();
        self.active.write().unwrap().insert(job_id, token.clone());
        if self.stop.is_cancelled() {
            token.cancel();
        }
        token
    }

    /// Unregister a settled job (success, failure or cancellation).
    pub(crate) fn unregister(&self, job_id: JobId) {
        self.active.write().unwrap().remove(&job_id);
    }

    /// True if `cancel_job` was called for a job that never started.
    pub(crate) fn cancelled_before_start(&self, job_id: JobId) -> bool {
        self.pre_start.read().unwrap().contains(&job_id)
    }

    /// Best-effort cancellation of a single job. Flags the token of an active
    /// job, or records the id so a still-queued job is never admitted.
    pub fn cancel_job(&self, job_id: JobId) {
        if let Some(token) = self.active.read().unwrap().get(&job_id) {
            token.cancel();
            return;
        }
        self.pre_start.write().unwrap().insert(job_id);
    }

    /// Best-effort cancellation of the whole run: flags every active job and
    /// the stop flag the scheduler polls to drop its backlog. Returns
    /// immediately; in-flight jobs settle through their normal result path.
    pub fn cancel_all(&self) {
        self.stop.cancel();
        for token in self.active.read().unwrap().values() {
            token.cancel();
        }
    }

    /// True once `cancel_all` was issued for this run.
    pub fn stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Number of currently registered (running) jobs.
    pub fn active_count(&self) -> usize {
        self.active.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_clear_and_latches() {
        let t = CancelToken::new();
        assert!(!t.is_cancelled());
        let t2 = t.clone();
        t2.cancel();
        assert!(t.is_cancelled());
    }

    #[test]
    fn sleep_for_returns_false_when_cancelled() {
        let t = CancelToken::new();
        t.cancel();
        assert!(!t.sleep_for(Duration::from_secs(10), Duration::from_millis(1)));
    }

    #[test]
    fn sleep_for_completes_short_sleeps() {
        let t = CancelToken::new();
        assert!(t.sleep_for(Duration::from_millis(5), Duration::from_millis(1)));
    }

    #[test]
    fn cancel_all_flags_every_active_token() {
        let c = SessionControl::new();
        let a = c.register(1);
        let b = c.register(2);
        c.cancel_all();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(c.stop_requested());
    }

    #[test]
    fn register_after_stop_is_pre_cancelled() {
        let c = SessionControl::new();
        c.cancel_all();
        assert!(c.register(3).is_cancelled());
    }

    #[test]
    fn cancel_job_before_start_is_remembered() {
        let c = SessionControl::new();
        c.cancel_job(9);
        assert!(c.cancelled_before_start(9));
        assert!(!c.cancelled_before_start(8));
    }

    #[test]
    fn cancel_job_flags_only_that_job() {
        let c = SessionControl::new();
        let a = c.register(1);
        let b = c.register(2);
        c.cancel_job(1);
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        c.unregister(1);
        assert_eq!(c.active_count(), 1);
    }
}
