//! Error taxonomy for the provider adapters.
//!
//! Authentication and extraction failures are never swallowed; the one
//! deliberate soft-fail is the missing-results case, which `search` resolves
//! to an empty result set after persisting diagnostics.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The browser process failed to start. Fatal to the in-flight call
    /// only; the next call retries the launch.
    #[error("browser session failed to start: {0}")]
    SessionInit(#[source] anyhow::Error),

    /// The provider rejected the credentials or flagged the account.
    /// Not auto-retried: the same credentials would reproduce it.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The provider served an explicit error/restriction marker.
    #[error("provider restriction: {0}")]
    Scrape(String),

    /// An expected page element never appeared within its wait window.
    /// The search path converts this into an empty result set; the download
    /// path surfaces it when the trigger element is missing.
    #[error("timed out waiting for page content")]
    ResultsTimeout,

    /// The download-link element never appeared or carried no href.
    #[error("download link not found on item page")]
    DownloadLinkMissing,

    /// The direct fetch of the resolved download URL returned a non-success
    /// status.
    #[error("download failed with status {status}")]
    Download { status: u16 },

    /// Operation attempted after `close()`. Terminal; the session is never
    /// relaunched past this point.
    #[error("session is closed")]
    SessionClosed,

    /// A browser-side operation (tab, navigation, evaluation) failed.
    #[error("browser operation failed: {0}")]
    Browser(#[source] anyhow::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_error_carries_status() {
        let err = FetchError::Download { status: 403 };
        assert_eq!(err.to_string(), "download failed with status 403");
    }

    #[test]
    fn authentication_error_carries_marker_text() {
        let err = FetchError::Authentication("Too many attempts".to_string());
        assert_eq!(err.to_string(), "authentication failed: Too many attempts");
    }
}
