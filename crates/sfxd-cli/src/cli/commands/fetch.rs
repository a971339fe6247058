//! `sfxd fetch` – download everything a manifest lists.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use sfxd_core::config::SfxdConfig;
use sfxd_core::control::SessionControl;
use sfxd_core::events::{JobOutcome, SessionEvent};
use sfxd_core::retry::BackoffPolicy;
use sfxd_core::session::{run_session, SessionOptions};

use crate::cli::manifest;

const PROGRESS_INTERVAL_MS: u64 = 500;

pub async fn run_fetch(
    cfg: &SfxdConfig,
    manifest_path: &Path,
    out: Option<PathBuf>,
    threads: Option<usize>,
    retries: Option<u32>,
    timeout: Option<u64>,
) -> Result<()> {
    // Flags override the config file for this run only.
    let mut cfg = cfg.clone();
    if let Some(n) = threads {
        cfg.threads = n;
    }
    if let Some(n) = retries {
        cfg.retries = n;
    }
    if let Some(secs) = timeout {
        cfg.timeout_secs = secs;
    }
    let out_dir = out.unwrap_or_else(|| cfg.output_dir.clone());

    let plan = manifest::load_manifest(manifest_path, &out_dir, &cfg).await?;
    if plan.skipped_existing > 0 {
        println!("Skipping {} existing files", plan.skipped_existing);
    }
    if plan.jobs.is_empty() {
        println!("No new samples to download");
        return Ok(());
    }
    println!(
        "Downloading {} samples to {} with up to {} threads",
        plan.jobs.len(),
        out_dir.display(),
        cfg.threads
    );

    let control = Arc::new(SessionControl::new());
    let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(256);

    // Ctrl-C stops the run: queued jobs are dropped, in-flight ones drain.
    let ctrl = Arc::clone(&control);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping downloads...");
            ctrl.cancel_all();
        }
    });

    let printer = tokio::spawn(async move {
        let mut last_print = Instant::now();
        while let Some(event) = events_rx.recv().await {
            match event {
                SessionEvent::Progress(p) => {
                    let now = Instant::now();
                    if now.duration_since(last_print).as_millis() as u64 >= PROGRESS_INTERVAL_MS {
                        println!("  [{:3}%] {}", p.percent, p.message);
                        last_print = now;
                    }
                }
                SessionEvent::Result(r) => match r.outcome {
                    JobOutcome::Completed => tracing::info!(job = r.job_id, "completed"),
                    JobOutcome::Cancelled => tracing::info!(job = r.job_id, "cancelled"),
                    JobOutcome::Failed => {
                        println!(
                            "  failed: job {} ({})",
                            r.job_id,
                            r.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                },
                SessionEvent::Completed(_) => break,
            }
        }
    });

    let opts = SessionOptions {
        concurrency: cfg.threads,
        http: cfg.http_options(),
        backoff: BackoffPolicy::default(),
    };
    let summary = run_session(plan.jobs, opts, control, Some(events_tx)).await?;
    let _ = printer.await;

    println!(
        "Completed: {} successful, {} failed, {} cancelled",
        summary.finished, summary.failed, summary.cancelled
    );
    if summary.failed > 0 {
        anyhow::bail!("{} download(s) failed", summary.failed);
    }
    Ok(())
}
