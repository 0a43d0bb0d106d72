//! Best-effort diagnostic capture for failure paths.
//!
//! Screenshots and raw markup dumps are operator-facing debugging aids, not
//! part of the functional contract: every failure here is logged and
//! swallowed so it can never mask the primary error.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::Tab;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    dir: PathBuf,
}

impl DiagnosticSink {
    pub fn new(dir: PathBuf) -> Self {
        DiagnosticSink { dir }
    }

    fn stamped(&self, label: &str, ext: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        self.dir.join(format!("{label}-{stamp}.{ext}"))
    }

    /// Capture a full-page screenshot of `tab` under `<dir>/<label>-<ts>.png`.
    pub fn screenshot(&self, tab: &Arc<Tab>, label: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!(error = %e, "could not create diagnostics directory");
            return;
        }
        let path = self.stamped(label, "png");
        match tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true) {
            Ok(png) => {
                if let Err(e) = std::fs::write(&path, png) {
                    warn!(path = %path.display(), error = %e, "screenshot write failed");
                } else {
                    debug!(path = %path.display(), "screenshot captured");
                }
            }
            Err(e) => warn!(error = %e, "screenshot capture failed"),
        }
    }

    /// Persist raw page markup under `<dir>/<label>-<ts>.html`.
    pub fn dump_html(&self, label: &str, html: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!(error = %e, "could not create diagnostics directory");
            return;
        }
        let path = self.stamped(label, "html");
        if let Err(e) = std::fs::write(&path, html) {
            warn!(path = %path.display(), error = %e, "markup dump failed");
        } else {
            debug!(path = %path.display(), "markup dumped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_lands_in_configured_directory() {
        let dir = std::env::temp_dir().join("stock-fetcher-diag-test");
        let _ = std::fs::remove_dir_all(&dir);
        let sink = DiagnosticSink::new(dir.clone());

        sink.dump_html("no-results-freepik", "<html></html>");

        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().flatten().collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().to_string_lossy().to_string();
        assert!(name.starts_with("no-results-freepik-"));
        assert!(name.ends_with(".html"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
