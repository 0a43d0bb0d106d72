//! Session manager for the scraped stock-media adapter.
//!
//! Composition root over the browser session, authenticator, throttle, and
//! extractor. Every public operation runs authenticate -> throttle-admit ->
//! extract, in that order, and propagates the first failing stage's error
//! unchanged.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::config::FetcherConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::{FetchError, Result};
use crate::extract::{self, PageProfile};
use crate::provider::Provider;
use crate::resource::Resource;
use crate::session::{BrowserSession, SessionOptions};
use crate::throttle::RequestThrottle;

/// Lifecycle of the shared session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No browser process yet.
    Uninitialized,
    /// Process up, authentication fresh enough to operate.
    Ready,
    /// A login is in flight.
    Authenticating,
    /// The process went away; relaunched on next access.
    Degraded,
    /// `close()` was called. Terminal: no relaunch past this point.
    Closed,
}

struct Core {
    state: SessionState,
    session: BrowserSession,
    authenticator: Authenticator,
}

impl Core {
    /// Authenticate-before-operate. Runs under the core mutex, so two
    /// near-simultaneous stale callers serialize and the second finds a
    /// fresh login instead of logging in again (single-flight).
    async fn ensure_ready(
        &mut self,
        profile: &PageProfile,
        nav_timeout: Duration,
        diagnostics: &DiagnosticSink,
    ) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(FetchError::SessionClosed);
        }

        if self.state != SessionState::Uninitialized && !self.session.is_alive() {
            warn!("session process is gone, entering degraded state");
            self.state = SessionState::Degraded;
            // The replacement process starts without cookies.
            self.authenticator.invalidate();
        }

        let browser = self.session.ensure()?;
        self.state = SessionState::Ready;

        if self.authenticator.is_stale() {
            self.state = SessionState::Authenticating;
            let outcome = self
                .authenticator
                .login(browser, profile, nav_timeout, diagnostics)
                .await;
            self.state = SessionState::Ready;
            outcome?;
        }
        Ok(())
    }
}

/// Scraped-provider adapter holding one long-lived authenticated browser
/// session. Construct once at process startup and share by reference;
/// `close()` must be called before exit so the browser process is not
/// leaked.
pub struct FreepikProvider {
    core: Mutex<Core>,
    throttle: RequestThrottle,
    diagnostics: DiagnosticSink,
    profile: PageProfile,
    nav_timeout: Duration,
}

impl FreepikProvider {
    pub fn new(config: &FetcherConfig) -> Self {
        FreepikProvider {
            core: Mutex::new(Core {
                state: SessionState::Uninitialized,
                session: BrowserSession::new(SessionOptions::from_config(config)),
                authenticator: Authenticator::new(
                    config.credentials.clone(),
                    config.auth_staleness,
                ),
            }),
            throttle: RequestThrottle::new(config.request_delay),
            diagnostics: DiagnosticSink::new(config.debug_dir.clone()),
            profile: PageProfile::freepik(),
            nav_timeout: config.nav_timeout,
        }
    }

    pub async fn state(&self) -> SessionState {
        self.core.lock().await.state
    }

    async fn ensure_ready(&self) -> Result<()> {
        let mut core = self.core.lock().await;
        core.ensure_ready(&self.profile, self.nav_timeout, &self.diagnostics)
            .await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Resource>> {
        self.ensure_ready().await?;
        self.throttle
            .run(async {
                let mut core = self.core.lock().await;
                if core.state == SessionState::Closed {
                    return Err(FetchError::SessionClosed);
                }
                let browser = core.session.ensure()?;
                extract::run_search(
                    browser,
                    &self.profile,
                    query,
                    self.nav_timeout,
                    &self.diagnostics,
                )
            })
            .await
    }

    /// The provider exposes no random endpoint; "popular" stands in for it.
    pub async fn get_random(&self) -> Result<Vec<Resource>> {
        self.search("popular").await
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.ensure_ready().await?;
        self.throttle
            .run(async {
                let href = {
                    let mut core = self.core.lock().await;
                    if core.state == SessionState::Closed {
                        return Err(FetchError::SessionClosed);
                    }
                    let browser = core.session.ensure()?;
                    extract::resolve_download_href(
                        browser,
                        &self.profile,
                        url,
                        self.nav_timeout,
                        &self.diagnostics,
                    )?
                };
                extract::fetch_bytes(&href).await
            })
            .await
    }

    /// Terminal teardown. Idempotent: a second call is a no-op, and every
    /// operation after the first fails with `SessionClosed` instead of
    /// silently relaunching.
    pub async fn close(&self) -> Result<()> {
        let mut core = self.core.lock().await;
        if core.state != SessionState::Closed {
            core.session.shutdown();
            core.state = SessionState::Closed;
            info!("session closed");
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for FreepikProvider {
    async fn search(&self, query: &str) -> Result<Vec<Resource>> {
        FreepikProvider::search(self, query).await
    }

    async fn get_random(&self) -> Result<Vec<Resource>> {
        FreepikProvider::get_random(self).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        FreepikProvider::download(self, url).await
    }

    async fn close(&self) -> Result<()> {
        FreepikProvider::close(self).await
    }
}
