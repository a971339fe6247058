//! Atomic materialization of downloaded files.
//!
//! A download is staged to a uniquely named temp file in the system temp
//! area and only renamed onto its destination once complete and non-empty,
//! so a reader of the output tree observes either nothing or a finished
//! file under the final name. Dropping a stage without committing removes
//! the temp file, covering every failure and cancellation path.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::DownloadError;

/// Staging prefix in the system temp dir.
const STAGE_PREFIX: &str = "sfxd-";

/// Suffix for the same-volume sibling used by the cross-device commit path:
/// `file.wav` → `file.wav.part`.
pub const PART_SUFFIX: &str = ".part";

/// Sibling path for the cross-device fallback.
pub fn part_path(final_path: &Path) -> PathBuf {
    let mut os = final_path.as_os_str().to_owned();
    os.push(PART_SUFFIX);
    PathBuf::from(os)
}

/// Staged download target. Dropping it without `commit` removes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
}

impl StagedFile {
    /// Create a fresh uniquely-named staging file in the system temp directory.
    pub fn stage() -> Result<Self, DownloadError> {
        let temp = tempfile::Builder::new()
            .prefix(STAGE_PREFIX)
            .tempfile()
            .map_err(|e| DownloadError::fs(std::env::temp_dir(), e))?;
        Ok(Self { temp })
    }

    /// Clone of the underlying file handle for the transfer to write into.
    pub fn writer(&self) -> Result<fs::File, DownloadError> {
        self.temp
            .as_file()
            .try_clone()
            .map_err(|e| DownloadError::fs(self.temp.path(), e))
    }

    /// Bytes staged so far.
    pub fn len(&self) -> Result<u64, DownloadError> {
        self.temp
            .as_file()
            .metadata()
            .map(|m| m.len())
            .map_err(|e| DownloadError::fs(self.temp.path(), e))
    }

    pub fn is_empty(&self) -> Result<bool, DownloadError> {
        Ok(self.len()? == 0)
    }

    /// Finish the download: verify the stage is non-empty, create the
    /// destination's parent directories, rename the temp file onto `dest`
    /// and set final permissions. An empty stage is a failed attempt, not a
    /// success; the temp file is removed on every error path.
    pub fn commit(self, dest: &Path) -> Result<(), DownloadError> {
        if self.is_empty()? {
            return Err(DownloadError::EmptyResponse);
        }
        ensure_parent_dirs(dest)?;
        match self.temp.persist(dest) {
            Ok(_) => {}
            // The system temp dir is often on another filesystem (tmpfs), so
            // rename can fail with EXDEV; copy to a sibling of the
            // destination and rename that, keeping the final name atomic.
            Err(e) if e.error.kind() == ErrorKind::CrossesDevices => {
                commit_across_devices(e.file, dest)?;
            }
            Err(e) => return Err(DownloadError::fs(dest, e.error)),
        }
        set_world_readable(dest);
        Ok(())
    }
}

fn commit_across_devices(temp: NamedTempFile, dest: &Path) -> Result<(), DownloadError> {
    let part = part_path(dest);
    fs::copy(temp.path(), &part).map_err(|e| DownloadError::fs(&part, e))?;
    if let Err(e) = fs::rename(&part, dest) {
        let _ = fs::remove_file(&part);
        return Err(DownloadError::fs(dest, e));
    }
    Ok(())
}

/// Recursively create `dest`'s parent directory. Directory permissions are
/// opened to 0755 on Unix; a chmod failure is logged and ignored, matching
/// the non-fatal treatment of permission tweaks elsewhere.
pub fn ensure_parent_dirs(dest: &Path) -> Result<(), DownloadError> {
    let Some(parent) = dest.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|e| DownloadError::fs(parent, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(parent, fs::Permissions::from_mode(0o755)) {
            tracing::warn!("could not set permissions on {}: {}", parent.display(), e);
        }
    }
    Ok(())
}

/// World-readable, owner-writable output files (0644). Non-fatal.
fn set_world_readable(dest: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(dest, fs::Permissions::from_mode(0o644)) {
            tracing::warn!("could not set permissions on {}: {}", dest.display(), e);
        }
    }
    #[cfg(not(unix))]
    let _ = dest;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/out/a.wav")).to_string_lossy(),
            "/out/a.wav.part"
        );
    }

    #[test]
    fn commit_moves_stage_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cd1").join("sample.wav");

        let staged = StagedFile::stage().unwrap();
        let temp_path = staged.temp.path().to_path_buf();
        staged.writer().unwrap().write_all(b"RIFF....").unwrap();
        staged.commit(&dest).unwrap();

        assert!(!temp_path.exists(), "stage must not outlive the commit");
        assert_eq!(fs::read(&dest).unwrap(), b"RIFF....");
    }

    #[test]
    fn commit_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a").join("b").join("c.wav");
        let staged = StagedFile::stage().unwrap();
        staged.writer().unwrap().write_all(b"x").unwrap();
        staged.commit(&dest).unwrap();
        assert!(dest.is_file());
    }

    #[test]
    fn empty_stage_is_rejected_and_leaves_no_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sample.wav");
        let staged = StagedFile::stage().unwrap();
        let temp_path = staged.temp.path().to_path_buf();
        let err = staged.commit(&dest).unwrap_err();
        assert!(matches!(err, DownloadError::EmptyResponse));
        assert!(!dest.exists());
        assert!(!temp_path.exists(), "stage must be removed on rejection");
    }

    #[test]
    fn dropping_a_stage_removes_the_temp_file() {
        let staged = StagedFile::stage().unwrap();
        let temp_path = staged.temp.path().to_path_buf();
        assert!(temp_path.exists());
        drop(staged);
        assert!(!temp_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn committed_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sample.wav");
        let staged = StagedFile::stage().unwrap();
        staged.writer().unwrap().write_all(b"x").unwrap();
        staged.commit(&dest).unwrap();
        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
