//! Job descriptors: one job downloads one resource to one destination path.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::DownloadError;

/// Identifies one job within a run. Assigned at submission time.
pub type JobId = u64;

/// Immutable description of one download.
///
/// The primary URL is attempted up to `max_retries` times; each fallback URL
/// is attempted exactly once, in order. `timeout` bounds a single attempt,
/// not the whole job. Destinations are assumed unique across a submission
/// (duplicates are filtered by the caller), so no two jobs ever contend for
/// the same output path.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: JobId,
    pub primary_url: String,
    pub fallback_urls: Vec<String>,
    pub destination: PathBuf,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl JobSpec {
    /// Ordered URL list for attempt sequencing: primary first, then fallbacks.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_url.as_str())
            .chain(self.fallback_urls.iter().map(String::as_str))
    }

    /// Destination file name for user-facing messages.
    pub fn file_name(&self) -> String {
        self.destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.destination.display().to_string())
    }
}

/// Checks a submission before any worker starts.
pub fn validate(jobs: &[JobSpec], concurrency: usize) -> Result<(), DownloadError> {
    if concurrency < 1 {
        return Err(DownloadError::InvalidConfig(
            "concurrency limit must be at least 1".into(),
        ));
    }
    for job in jobs {
        if job.primary_url.trim().is_empty() {
            return Err(DownloadError::InvalidConfig(format!(
                "job {}: empty primary URL",
                job.id
            )));
        }
        if job.max_retries < 1 {
            return Err(DownloadError::InvalidConfig(format!(
                "job {}: max_retries must be at least 1",
                job.id
            )));
        }
        if job.destination.as_os_str().is_empty() {
            return Err(DownloadError::InvalidConfig(format!(
                "job {}: empty destination path",
                job.id
            )));
        }
    }
    Ok(())
}
