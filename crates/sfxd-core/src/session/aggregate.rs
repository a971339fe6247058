//! Run counters owned by the session controller.

use crate::events::{JobOutcome, RunSummary};

/// Counters for one run, mutated only from the controller loop.
///
/// Conservation invariant, checked after every transition:
/// `finished + failed + cancelled + active + backlog == total`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAggregate {
    pub total: usize,
    pub finished: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub active: usize,
    pub backlog: usize,
}

impl SessionAggregate {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            backlog: total,
            ..Self::default()
        }
    }

    /// A job moved from backlog to the active set.
    pub(crate) fn admit(&mut self) {
        self.backlog -= 1;
        self.active += 1;
        self.check();
    }

    /// A job was dropped from the backlog without ever running.
    pub(crate) fn drop_from_backlog(&mut self) {
        self.backlog -= 1;
        self.cancelled += 1;
        self.check();
    }

    /// An active job produced its terminal event.
    pub(crate) fn settle(&mut self, outcome: JobOutcome) {
        self.active -= 1;
        match outcome {
            JobOutcome::Completed => self.finished += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::Cancelled => self.cancelled += 1,
        }
        self.check();
    }

    /// True once every job has settled or been dropped.
    pub fn is_done(&self) -> bool {
        self.backlog == 0 && self.active == 0
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            finished: self.finished,
            failed: self.failed,
            cancelled: self.cancelled,
            total: self.total,
        }
    }

    fn check(&self) {
        debug_assert_eq!(
            self.finished + self.failed + self.cancelled + self.active + self.backlog,
            self.total,
            "aggregate counters out of balance"
        );
    }
}
