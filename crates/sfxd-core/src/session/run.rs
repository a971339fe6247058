//! The session controller: backlog, active set, refill and event drain.
//!
//! The controller task is the single consumer of the worker event channel
//! and the only mutator of backlog, active set and counters. Admission
//! happens from here after every processed terminal event, so "a slot
//! freed up" and "a job was admitted" can never race, and the pool stays
//! saturated without a polling thread.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::control::{CancelToken, SessionControl};
use crate::error::DownloadError;
use crate::events::{EventSink, JobEvent, ResultEvent, RunSummary, SessionEvent};
use crate::fetch::HttpOptions;
use crate::job::{self, JobId, JobSpec};
use crate::retry::{self, BackoffPolicy};

use super::aggregate::SessionAggregate;

/// Worker → controller channel capacity. Progress overflow is dropped;
/// result sends block the worker until the controller makes room.
const EVENT_CAPACITY: usize = 256;
/// Maximum events processed per controller wake-up.
const DRAIN_BATCH: usize = 32;
/// Controller tick when no events arrive; bounds stop-flag latency.
const TICK: Duration = Duration::from_millis(100);

/// Pool and policy settings for one run.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum concurrently executing jobs; must be at least 1.
    pub concurrency: usize,
    pub http: HttpOptions,
    pub backoff: BackoffPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            http: HttpOptions::default(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SessionOptions {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }
}

/// Runs one batch of jobs to completion (or until cancelled) and returns
/// the final counters.
///
/// Fails synchronously with `InvalidConfig`, before any worker starts, when
/// the concurrency limit or a job spec is unusable. Subscriber delivery via
/// `events_tx` mirrors the internal channel's contract: progress events are
/// dropped under backpressure, result and completion events always land.
pub async fn run_session(
    jobs: Vec<JobSpec>,
    opts: SessionOptions,
    control: Arc<SessionControl>,
    events_tx: Option<mpsc::Sender<SessionEvent>>,
) -> Result<RunSummary, DownloadError> {
    job::validate(&jobs, opts.concurrency)?;

    let (tx, mut rx) = mpsc::channel(EVENT_CAPACITY);
    let sink = EventSink::new(tx);
    let mut backlog: VecDeque<JobSpec> = jobs.into();
    let mut active: HashMap<JobId, CancelToken> = HashMap::new();
    let mut agg = SessionAggregate::new(backlog.len());

    loop {
        if control.stop_requested() && !backlog.is_empty() {
            // Not-yet-started jobs are dropped without running and without a
            // result event; in-flight jobs keep draining below.
            let dropped = backlog.len();
            while backlog.pop_front().is_some() {
                agg.drop_from_backlog();
            }
            tracing::info!(dropped, still_active = active.len(), "run stopped");
        }
        refill(&mut backlog, &mut active, &mut agg, &opts, &control, &sink);
        if agg.is_done() {
            break;
        }

        match tokio::time::timeout(TICK, rx.recv()).await {
            Ok(Some(event)) => {
                process_event(event, &mut active, &mut agg, &control, &events_tx).await;
                for _ in 1..DRAIN_BATCH {
                    let Ok(event) = rx.try_recv() else { break };
                    process_event(event, &mut active, &mut agg, &control, &events_tx).await;
                }
            }
            // All sinks dropped; cannot happen while jobs are active.
            Ok(None) => break,
            // Tick: loop around and re-check the stop flag.
            Err(_) => {}
        }
    }

    let summary = agg.summary();
    tracing::info!(
        finished = summary.finished,
        failed = summary.failed,
        cancelled = summary.cancelled,
        total = summary.total,
        "run completed"
    );
    if let Some(tx) = &events_tx {
        let _ = tx.send(SessionEvent::Completed(summary)).await;
    }
    Ok(summary)
}

/// Admission step: move jobs from backlog to active set until the limit is
/// reached, skipping jobs cancelled before they ever started.
fn refill(
    backlog: &mut VecDeque<JobSpec>,
    active: &mut HashMap<JobId, CancelToken>,
    agg: &mut SessionAggregate,
    opts: &SessionOptions,
    control: &SessionControl,
    sink: &EventSink,
) {
    while active.len() < opts.concurrency {
        let Some(spec) = backlog.pop_front() else { break };
        if control.stop_requested() || control.cancelled_before_start(spec.id) {
            agg.drop_from_backlog();
            continue;
        }
        let token = control.register(spec.id);
        active.insert(spec.id, token.clone());
        agg.admit();

        let sink = sink.clone();
        let http = opts.http.clone();
        let backoff = opts.backoff;
        tracing::debug!(job = spec.id, dest = %spec.destination.display(), "admitting job");
        tokio::task::spawn_blocking(move || {
            retry::execute_job(&spec, &token, &sink, &http, &backoff)
        });
    }
}

async fn process_event(
    event: JobEvent,
    active: &mut HashMap<JobId, CancelToken>,
    agg: &mut SessionAggregate,
    control: &SessionControl,
    events_tx: &Option<mpsc::Sender<SessionEvent>>,
) {
    match event {
        JobEvent::Progress(p) => {
            if let Some(tx) = events_tx {
                let _ = tx.try_send(SessionEvent::Progress(p));
            }
        }
        JobEvent::Result(r) => {
            settle(&r, active, agg, control);
            if let Some(tx) = events_tx {
                let _ = tx.send(SessionEvent::Result(r)).await;
            }
        }
    }
}

fn settle(
    result: &ResultEvent,
    active: &mut HashMap<JobId, CancelToken>,
    agg: &mut SessionAggregate,
    control: &SessionControl,
) {
    if active.remove(&result.job_id).is_some() {
        control.unregister(result.job_id);
        agg.settle(result.outcome);
    } else {
        tracing::warn!(job = result.job_id, "terminal event for unknown job");
    }
}
