use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::HttpOptions;

/// Global configuration loaded from `~/.config/sfxd/config.toml`.
///
/// Platform-dependent values (output directory, filename length budget) are
/// resolved here once and carried as plain configuration; nothing below the
/// config layer probes the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfxdConfig {
    /// Maximum concurrent downloads.
    pub threads: usize,
    /// Retry attempts against a job's primary URL (fallbacks get one each).
    pub retries: u32,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Default output directory for downloaded samples.
    pub output_dir: PathBuf,
    /// Longest filename the output filesystem is assumed to accept, in bytes.
    pub max_filename_len: usize,
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Referer header sent with every request.
    #[serde(default = "default_referer")]
    pub referer: String,
}

impl Default for SfxdConfig {
    fn default() -> Self {
        Self {
            threads: 5,
            retries: 3,
            timeout_secs: 30,
            output_dir: default_output_dir(),
            max_filename_len: default_max_filename_len(),
            user_agent: default_user_agent(),
            referer: default_referer(),
        }
    }
}

impl SfxdConfig {
    /// Per-attempt timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Request settings derived from the configured headers.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent.clone(),
            referer: self.referer.clone(),
            ..HttpOptions::default()
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 sfxd BBC Sound Effects Downloader".into()
}

fn default_referer() -> String {
    "https://sound-effects.bbcrewind.co.uk/".into()
}

/// Platform default output directory: Documents on Windows, Music on macOS,
/// the home directory elsewhere, each with a `BBCSounds` folder.
fn default_output_dir() -> PathBuf {
    let dirs = directories::UserDirs::new();
    let base = if cfg!(target_os = "windows") {
        dirs.as_ref()
            .and_then(|u| u.document_dir().map(|d| d.to_path_buf()))
    } else if cfg!(target_os = "macos") {
        dirs.as_ref()
            .and_then(|u| u.audio_dir().map(|d| d.to_path_buf()))
    } else {
        None
    };
    base.or_else(|| dirs.as_ref().map(|u| u.home_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("BBCSounds")
}

/// 255 bytes on Windows and macOS; 143 on Linux, conservative enough for
/// ecryptfs-backed home directories.
fn default_max_filename_len() -> usize {
    if cfg!(target_os = "linux") {
        143
    } else {
        255
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sfxd")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SfxdConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SfxdConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SfxdConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SfxdConfig::default();
        assert_eq!(cfg.threads, 5);
        assert_eq!(cfg.retries, 3);
        assert_eq!(cfg.timeout_secs, 30);
        assert!(cfg.output_dir.ends_with("BBCSounds"));
        assert!(cfg.max_filename_len == 143 || cfg.max_filename_len == 255);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SfxdConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SfxdConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.threads, cfg.threads);
        assert_eq!(parsed.retries, cfg.retries);
        assert_eq!(parsed.timeout_secs, cfg.timeout_secs);
        assert_eq!(parsed.output_dir, cfg.output_dir);
        assert_eq!(parsed.user_agent, cfg.user_agent);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            threads = 12
            retries = 5
            timeout_secs = 10
            output_dir = "/srv/sounds"
            max_filename_len = 200
        "#;
        let cfg: SfxdConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.threads, 12);
        assert_eq!(cfg.retries, 5);
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.output_dir, PathBuf::from("/srv/sounds"));
        // Headers fall back to defaults when missing from the file.
        assert_eq!(cfg.referer, default_referer());
    }
}
