//! `sfxd plan` – dry-run: report what a manifest would download.

use anyhow::Result;
use std::path::{Path, PathBuf};

use sfxd_core::config::SfxdConfig;

use crate::cli::manifest;

pub async fn run_plan(cfg: &SfxdConfig, manifest_path: &Path, out: Option<PathBuf>) -> Result<()> {
    let out_dir = out.unwrap_or_else(|| cfg.output_dir.clone());
    let plan = manifest::load_manifest(manifest_path, &out_dir, cfg).await?;

    for job in &plan.jobs {
        println!("  {}", job.destination.display());
    }
    println!(
        "{} of {} rows to download into {} ({} already present, {} unusable rows)",
        plan.jobs.len(),
        plan.total_rows(),
        out_dir.display(),
        plan.skipped_existing,
        plan.skipped_invalid
    );
    Ok(())
}
