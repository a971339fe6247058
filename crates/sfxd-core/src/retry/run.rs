//! Per-job driver: URL sequencing, retries, backoff, staging and commit.
//!
//! Every job that reaches `execute_job` produces exactly one terminal
//! `ResultEvent` through the sink; no error or cancellation path escapes to
//! the scheduler, so a failing job can never take down the pool or another
//! job.

use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::events::{EventSink, JobOutcome, ResultEvent};
use crate::fetch::{self, HttpOptions};
use crate::job::JobSpec;
use crate::retry::policy::{attempts_for, BackoffPolicy};
use crate::storage::StagedFile;

/// Runs one job to completion on the current (blocking) thread.
pub(crate) fn execute_job(
    spec: &JobSpec,
    token: &CancelToken,
    sink: &EventSink,
    http: &HttpOptions,
    backoff: &BackoffPolicy,
) {
    let event = match run_attempts(spec, token, sink, http, backoff) {
        Ok(()) => ResultEvent {
            job_id: spec.id,
            outcome: JobOutcome::Completed,
            error: None,
        },
        Err(e) if e.is_cancelled() => ResultEvent {
            job_id: spec.id,
            outcome: JobOutcome::Cancelled,
            error: None,
        },
        Err(e) => ResultEvent {
            job_id: spec.id,
            outcome: JobOutcome::Failed,
            error: Some(e.to_string()),
        },
    };
    sink.result(event);
}

fn run_attempts(
    spec: &JobSpec,
    token: &CancelToken,
    sink: &EventSink,
    http: &HttpOptions,
    backoff: &BackoffPolicy,
) -> Result<(), DownloadError> {
    let name = spec.file_name();
    sink.progress(spec.id, format!("Starting download: {}", name), 0);

    let mut last_err = None;
    for (url_index, url) in spec.urls().enumerate() {
        if url_index == 1 {
            sink.progress(
                spec.id,
                format!("Primary URL failed, trying alternatives for: {}", name),
                0,
            );
        }
        let host = fetch::display_host(url);
        let max_attempts = attempts_for(url_index, spec.max_retries);
        for attempt in 1..=max_attempts {
            if token.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            match try_once(spec, url, &host, token, sink, http) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::debug!(
                        job = spec.id,
                        url,
                        attempt,
                        "attempt failed: {}",
                        e
                    );
                    last_err = Some(e);
                    if attempt < max_attempts {
                        sink.progress(
                            spec.id,
                            format!("Retry {}/{} from {}: {}", attempt, max_attempts, host, name),
                            0,
                        );
                        if !token.sleep_for(backoff.delay_after(attempt), backoff.poll_interval) {
                            return Err(DownloadError::Cancelled);
                        }
                    } else {
                        sink.progress(spec.id, format!("Failed from {}: {}", host, name), 0);
                    }
                }
            }
        }
    }

    sink.progress(spec.id, format!("All URLs failed for: {}", name), 0);
    // Validation guarantees at least one URL, so an error is always recorded.
    Err(last_err
        .unwrap_or_else(|| DownloadError::InvalidConfig(format!("job {} has no URLs", spec.id))))
}

/// One attempt against one URL: stage, transfer, re-check the token, commit.
fn try_once(
    spec: &JobSpec,
    url: &str,
    host: &str,
    token: &CancelToken,
    sink: &EventSink,
    http: &HttpOptions,
) -> Result<(), DownloadError> {
    let name = spec.file_name();
    let staged = StagedFile::stage()?;
    sink.progress(spec.id, format!("Downloading from {}: {}", host, name), 0);

    let progress_sink = sink.clone();
    let job_id = spec.id;
    let message = format!("Downloading from {}: {}", host, name);
    let bytes = fetch::fetch_url(url, &staged, http, spec.timeout, token, move |percent| {
        progress_sink.progress(job_id, message.clone(), percent);
    })?;

    // A download that completed after cancellation is discarded, stage and
    // all; the job settles as cancelled, not as a success.
    if token.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    staged.commit(&spec.destination)?;
    tracing::debug!(job = spec.id, bytes, dest = %spec.destination.display(), "download committed");
    sink.progress(spec.id, format!("Completed: {}", name), 100);
    Ok(())
}
