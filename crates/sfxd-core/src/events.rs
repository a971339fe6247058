//! Events flowing from workers to the session controller and on to the
//! subscriber.
//!
//! Progress is advisory and lossy: a tick dropped under backpressure is
//! replaced by the next one. Result events are terminal (exactly one per
//! started job) and are never dropped.

use tokio::sync::mpsc;

use crate::job::JobId;

/// Advisory progress tick for one job.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub message: String,
    /// Percent complete in [0, 100]; 0 when the total size is unknown.
    pub percent: u8,
}

/// Terminal outcome of one started job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Terminal event closing a job's lifecycle.
#[derive(Debug, Clone)]
pub struct ResultEvent {
    pub job_id: JobId,
    pub outcome: JobOutcome,
    /// Last attempt's error for `Failed`; `None` otherwise.
    pub error: Option<String>,
}

/// Event delivered to the run's subscriber.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Progress(ProgressEvent),
    Result(ResultEvent),
    /// Emitted exactly once per run, after the last job settles.
    Completed(RunSummary),
}

/// Final counters reported once per run. `finished + failed == total` unless
/// jobs were cancelled; cancelled covers both dropped-before-start and
/// interrupted-in-flight jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub finished: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

/// Internal worker → controller event.
#[derive(Debug)]
pub(crate) enum JobEvent {
    Progress(ProgressEvent),
    Result(ResultEvent),
}

/// Worker-side sender half of the event channel.
///
/// Only ever used from blocking worker threads, hence `blocking_send` for
/// results: a terminal event must land even when the channel is full.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<JobEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<JobEvent>) -> Self {
        Self { tx }
    }

    /// Lossy: dropped when the channel is full or closed.
    pub(crate) fn progress(&self, job_id: JobId, message: impl Into<String>, percent: u8) {
        let _ = self.tx.try_send(JobEvent::Progress(ProgressEvent {
            job_id,
            message: message.into(),
            percent: percent.min(100),
        }));
    }

    /// Reliable: blocks the worker until the controller makes room.
    pub(crate) fn result(&self, event: ResultEvent) {
        if self.tx.blocking_send(JobEvent::Result(event)).is_err() {
            tracing::warn!("result channel closed before delivery");
        }
    }
}
