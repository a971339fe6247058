//! Manifest loading: BBC sound-effects CSV rows → job specs.
//!
//! Each usable row yields one job: a destination under
//! `<out>/<CD name>/<description>.<location>` plus the archive's primary
//! and legacy fallback URLs. Rows whose destination already exists are
//! skipped, so re-running a partially finished batch only fetches what is
//! missing.

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use sfxd_core::config::SfxdConfig;
use sfxd_core::job::JobSpec;

use super::sanitize::sanitize_component;

const PRIMARY_BASE: &str = "https://sound-effects.bbcrewind.co.uk/assets/";
/// Older URL layouts, last resort first to last.
const FALLBACK_BASES: [&str; 2] = [
    "https://sound-effects.bbcrewind.co.uk/",
    "http://bbcsfx.acropolis.org.uk/assets/",
];

/// One row of the sound-effects manifest. Optional so rows (or whole files)
/// missing a column are skipped instead of failing the run.
#[derive(Debug, Deserialize)]
struct ManifestRow {
    #[serde(rename = "CDName")]
    cd_name: Option<String>,
    description: Option<String>,
    location: Option<String>,
}

/// Outcome of a manifest scan.
#[derive(Debug, Default)]
pub struct ManifestPlan {
    pub jobs: Vec<JobSpec>,
    pub skipped_existing: usize,
    pub skipped_invalid: usize,
}

impl ManifestPlan {
    pub fn total_rows(&self) -> usize {
        self.jobs.len() + self.skipped_existing + self.skipped_invalid
    }
}

/// Scan `path` and build the jobs that still need downloading into
/// `out_dir`, using the retry/timeout/filename settings from `cfg`.
pub async fn load_manifest(path: &Path, out_dir: &Path, cfg: &SfxdConfig) -> Result<ManifestPlan> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open manifest: {}", path.display()))?;
    let mut reader = csv_async::AsyncDeserializer::from_reader(file);
    let mut records = reader.deserialize::<ManifestRow>();

    let mut plan = ManifestPlan::default();
    let mut next_id: u64 = 1;
    while let Some(row) = records.next().await {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!("skipping malformed manifest row: {}", e);
                plan.skipped_invalid += 1;
                continue;
            }
        };
        let (Some(cd_name), Some(description), Some(location)) =
            (row.cd_name, row.description, row.location)
        else {
            plan.skipped_invalid += 1;
            continue;
        };
        if location.trim().is_empty() {
            plan.skipped_invalid += 1;
            continue;
        }

        let folder = sanitize_component(&cd_name);
        let suffix = format!(".{}", location.trim());
        let budget = cfg.max_filename_len.saturating_sub(suffix.len());
        let stem = sanitize_component(&description);
        let filename = format!("{}{}", truncate_to(&stem, budget), suffix);
        let destination = out_dir.join(folder).join(filename);

        if destination.exists() {
            plan.skipped_existing += 1;
            continue;
        }

        let location = location.trim();
        plan.jobs.push(JobSpec {
            id: next_id,
            primary_url: format!("{}{}", PRIMARY_BASE, location),
            fallback_urls: FALLBACK_BASES
                .iter()
                .map(|base| format!("{}{}", base, location))
                .collect(),
            destination,
            max_retries: cfg.retries.max(1),
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
        });
        next_id += 1;
    }

    tracing::info!(
        jobs = plan.jobs.len(),
        existing = plan.skipped_existing,
        invalid = plan.skipped_invalid,
        "manifest scanned"
    );
    Ok(plan)
}

/// Longest prefix of `s` that fits `max_bytes` without splitting a char.
fn truncate_to(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
