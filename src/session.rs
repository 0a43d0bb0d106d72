//! Ownership of the long-lived Chrome process.
//!
//! One `BrowserSession` owns at most one browser process. There is no
//! out-of-band disconnect event to subscribe to, so liveness is probed on
//! access: a dead process is detected by a failing version call, dropped,
//! and transparently replaced on the next `ensure`.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};
use tracing::{info, warn};

use crate::config::FetcherConfig;
use crate::error::{FetchError, Result};

/// Keep the CDP connection alive across quiet periods between operations;
/// the default idle timeout would reap the process after 30 seconds.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(3_600);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub chrome_path: Option<PathBuf>,
    pub args: Vec<String>,
    pub proxy_server: Option<String>,
    pub window_size: (u32, u32),
}

impl SessionOptions {
    pub fn from_config(config: &FetcherConfig) -> Self {
        SessionOptions {
            chrome_path: config.chrome_path.clone(),
            args: config.browser_args.clone(),
            proxy_server: config.proxy_server.clone(),
            window_size: (1920, 1080),
        }
    }

    /// Full launch argument list, proxy included.
    fn compose_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(ref proxy) = self.proxy_server {
            args.push(format!("--proxy-server={proxy}"));
        }
        args
    }
}

pub struct BrowserSession {
    options: SessionOptions,
    browser: Option<Browser>,
}

impl BrowserSession {
    pub fn new(options: SessionOptions) -> Self {
        BrowserSession {
            options,
            browser: None,
        }
    }

    /// True when a browser process exists and still answers.
    pub fn is_alive(&self) -> bool {
        self.browser
            .as_ref()
            .is_some_and(|b| b.get_version().is_ok())
    }

    /// Idempotent access to the live browser: returns the existing process
    /// or launches a new one. A process that stopped answering is dropped
    /// here without surfacing an error; only a failed launch is fatal to the
    /// caller, and the next call retries it.
    pub fn ensure(&mut self) -> Result<&Browser> {
        if !self.is_alive() && self.browser.take().is_some() {
            warn!("browser process disconnected, relaunching");
        }
        if self.browser.is_none() {
            let browser = self.launch()?;
            info!("browser session launched");
            self.browser = Some(browser);
        }
        match self.browser {
            Some(ref browser) => Ok(browser),
            None => unreachable!("browser launched above"),
        }
    }

    fn launch(&self) -> Result<Browser> {
        let args = self.options.compose_args();
        let args_os: Vec<&OsStr> = args.iter().map(OsStr::new).collect();

        Browser::new(LaunchOptions {
            headless: true,
            path: self.options.chrome_path.clone(),
            window_size: Some(self.options.window_size),
            args: args_os,
            idle_browser_timeout: IDLE_BROWSER_TIMEOUT,
            ..Default::default()
        })
        .map_err(FetchError::SessionInit)
    }

    /// Drop the process; its child tabs die with it.
    pub fn shutdown(&mut self) {
        if self.browser.take().is_some() {
            info!("browser session shut down");
        }
    }
}
