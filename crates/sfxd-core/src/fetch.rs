//! Blocking HTTP GET of one URL into a staged file.
//!
//! One curl `Easy` transfer per attempt, streaming the body straight into
//! the stage. The progress callback is the in-flight cancellation point:
//! when the token is set it aborts the transfer, which curl reports as
//! aborted-by-callback and we map to `Cancelled` rather than a transport
//! failure.

use std::io::Write;
use std::time::Duration;

use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::storage::StagedFile;

/// Request settings shared by every attempt in a run.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Referer header sent with every request.
    pub referer: String,
    /// Connect timeout, separate from the per-attempt total timeout.
    pub connect_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 sfxd BBC Sound Effects Downloader".into(),
            referer: "https://sound-effects.bbcrewind.co.uk/".into(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Host portion of a URL for user-facing messages.
pub fn display_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// Download `url` into `staged`, reporting percent changes through
/// `on_percent`. `timeout` bounds this attempt as a whole. Returns the
/// number of bytes written; the caller decides whether the stage is kept.
pub fn fetch_url(
    url: &str,
    staged: &StagedFile,
    opts: &HttpOptions,
    timeout: Duration,
    token: &CancelToken,
    mut on_percent: impl FnMut(u8),
) -> Result<u64, DownloadError> {
    let mut out = staged.writer()?;
    let mut written: u64 = 0;

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(&opts.user_agent)?;
    easy.referer(&opts.referer)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(timeout)?;
    easy.progress(true)?;

    {
        let token = token.clone();
        let mut last_percent: u8 = 0;
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match out.write_all(data) {
            Ok(()) => {
                written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                tracing::warn!("staging write failed: {}", e);
                Ok(0) // abort transfer
            }
        })?;
        transfer.progress_function(move |dltotal, dlnow, _ultotal, _ulnow| {
            if token.is_cancelled() {
                return false;
            }
            if dltotal > 0.0 {
                let percent = ((dlnow / dltotal) * 100.0).clamp(0.0, 100.0) as u8;
                if percent != last_percent {
                    last_percent = percent;
                    on_percent(percent);
                }
            }
            true
        })?;
        transfer.perform().map_err(map_curl_error)?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(DownloadError::HttpStatus(code));
    }
    Ok(written)
}

/// Aborts raised from the progress callback are cancellations, everything
/// else is a transport failure (timeouts included).
fn map_curl_error(e: curl::Error) -> DownloadError {
    if e.is_aborted_by_callback() {
        DownloadError::Cancelled
    } else {
        DownloadError::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_host_extracts_the_host() {
        assert_eq!(
            display_host("https://sound-effects.bbcrewind.co.uk/assets/07070001.wav"),
            "sound-effects.bbcrewind.co.uk"
        );
    }

    #[test]
    fn display_host_falls_back_to_the_raw_string() {
        assert_eq!(display_host("not a url"), "not a url");
    }
}
