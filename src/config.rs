//! Environment-driven configuration.
//!
//! Settings are read once at startup into a plain value that the process
//! entry point passes to the adapters; nothing in the library reads the
//! environment after construction.

use std::path::PathBuf;
use std::time::Duration;

/// Default launch arguments; sandbox-disable flags keep Chrome working on
/// constrained hosts (containers, CI runners).
pub const DEFAULT_BROWSER_ARGS: &str =
    "--no-sandbox,--disable-setuid-sandbox,--disable-dev-shm-usage";

const DEFAULT_NAV_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_AUTH_STALENESS_MS: u64 = 3_600_000;
const DEFAULT_REQUEST_DELAY_MS: u64 = 2_000;
const DEFAULT_DEBUG_DIR: &str = "debug";

/// Immutable credential pair for the scraped provider, sourced once at
/// startup.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub credentials: Credentials,
    /// Chrome executable override; `None` lets the launcher autodetect.
    pub chrome_path: Option<PathBuf>,
    /// Extra Chrome launch arguments.
    pub browser_args: Vec<String>,
    /// Bound on every navigation and element wait.
    pub nav_timeout: Duration,
    /// Maximum age of a successful authentication before re-login.
    pub auth_staleness: Duration,
    /// Mandatory spacing between consecutive operations on one session.
    pub request_delay: Duration,
    /// Where diagnostic screenshots and markup dumps land.
    pub debug_dir: PathBuf,
    /// Optional `--proxy-server` value passed through to Chrome.
    pub proxy_server: Option<String>,
    /// Personal token for the marketplace API adapter.
    pub envato_token: Option<String>,
}

impl FetcherConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup function so tests never touch the
    /// process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: u64| {
            Duration::from_millis(
                get(key)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default),
            )
        };
        let non_empty = |key: &str| get(key).filter(|v| !v.is_empty());

        FetcherConfig {
            credentials: Credentials {
                username: get("FREEPIK_USERNAME").unwrap_or_default(),
                password: get("FREEPIK_PASSWORD").unwrap_or_default(),
            },
            chrome_path: non_empty("CHROME_PATH").map(PathBuf::from),
            browser_args: non_empty("BROWSER_ARGS")
                .unwrap_or_else(|| DEFAULT_BROWSER_ARGS.to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            nav_timeout: millis("NAV_TIMEOUT_MS", DEFAULT_NAV_TIMEOUT_MS),
            auth_staleness: millis("AUTH_STALENESS_MS", DEFAULT_AUTH_STALENESS_MS),
            request_delay: millis("REQUEST_DELAY_MS", DEFAULT_REQUEST_DELAY_MS),
            debug_dir: PathBuf::from(
                non_empty("DEBUG_DIR").unwrap_or_else(|| DEFAULT_DEBUG_DIR.to_string()),
            ),
            proxy_server: non_empty("PROXY_SERVER"),
            envato_token: non_empty("ENVATO_PERSONAL_TOKEN"),
        }
    }
}
