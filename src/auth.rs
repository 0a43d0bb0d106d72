//! Login flow for scraped providers.
//!
//! Authentication state is derived, never stored: an operation re-logs-in
//! whenever the last successful login is older than the staleness window or
//! the browser process has been replaced. Success is stamped with a
//! monotonic instant so wall-clock jumps cannot fake freshness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::{Browser, Element, Tab};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Credentials;
use crate::diagnostics::DiagnosticSink;
use crate::error::{FetchError, Result};
use crate::extract::{restriction_text, PageProfile};

/// Short settle delay before typing; some login forms drop keystrokes that
/// arrive while anti-automation checks are still running. The only fixed
/// sleep in the pipeline.
const PRE_TYPE_DELAY: Duration = Duration::from_millis(2_000);

pub struct Authenticator {
    credentials: Credentials,
    staleness: Duration,
    last_authenticated_at: Option<Instant>,
}

impl Authenticator {
    pub fn new(credentials: Credentials, staleness: Duration) -> Self {
        Authenticator {
            credentials,
            staleness,
            last_authenticated_at: None,
        }
    }

    /// True when a login is required before the next operation.
    pub fn is_stale(&self) -> bool {
        self.last_authenticated_at
            .map_or(true, |at| at.elapsed() > self.staleness)
    }

    /// Forget the previous login, e.g. after the browser process (and its
    /// cookies) went away.
    pub fn invalidate(&mut self) {
        self.last_authenticated_at = None;
    }

    /// Drive the provider's login form in a fresh tab. On success the
    /// authentication timestamp is refreshed; a visible error/restriction
    /// banner fails with its text. Screenshots around the attempt are
    /// best-effort and never mask the outcome.
    pub async fn login(
        &mut self,
        browser: &Browser,
        profile: &PageProfile,
        nav_timeout: Duration,
        diagnostics: &DiagnosticSink,
    ) -> Result<()> {
        info!(provider = profile.name, "authenticating");
        if self.credentials.username.is_empty() {
            warn!(provider = profile.name, "username is empty, login will likely fail");
        }

        let tab = browser.new_tab().map_err(FetchError::Browser)?;
        diagnostics.screenshot(&tab, &format!("pre-login-{}", profile.name));
        let outcome = drive_login(&self.credentials, &tab, profile, nav_timeout).await;
        diagnostics.screenshot(&tab, &format!("post-login-{}", profile.name));
        if let Err(e) = tab.close(true) {
            warn!(error = %e, "login tab close failed");
        }

        outcome?;
        self.last_authenticated_at = Some(Instant::now());
        info!(provider = profile.name, "authentication successful");
        Ok(())
    }
}

fn first_element<'a>(tab: &'a Arc<Tab>, selectors: &[&str]) -> Result<Element<'a>> {
    for raw in selectors {
        if let Ok(el) = tab.find_element(raw) {
            return Ok(el);
        }
    }
    Err(FetchError::Authentication(format!(
        "login form field not found (tried {})",
        selectors.join(", ")
    )))
}

async fn drive_login(
    credentials: &Credentials,
    tab: &Arc<Tab>,
    profile: &PageProfile,
    nav_timeout: Duration,
) -> Result<()> {
    tab.set_default_timeout(nav_timeout);
    tab.navigate_to(profile.login_url)
        .map_err(FetchError::Browser)?;
    tab.wait_until_navigated().map_err(FetchError::Browser)?;

    sleep(PRE_TYPE_DELAY).await;

    first_element(tab, profile.username_selectors)?
        .type_into(&credentials.username)
        .map_err(FetchError::Browser)?;
    first_element(tab, profile.password_selectors)?
        .type_into(&credentials.password)
        .map_err(FetchError::Browser)?;

    tab.find_element(profile.submit_selector)
        .map_err(FetchError::Browser)?
        .click()
        .map_err(FetchError::Browser)?;
    tab.wait_until_navigated().map_err(FetchError::Browser)?;

    if let Some(text) = restriction_text(tab, profile) {
        return Err(FetchError::Authentication(text));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            username: "user@example.com".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn fresh_authenticator_is_stale() {
        let auth = Authenticator::new(credentials(), Duration::from_secs(3_600));
        assert!(auth.is_stale());
    }

    #[test]
    fn staleness_tracks_the_window() {
        let mut auth = Authenticator::new(credentials(), Duration::from_secs(3_600));
        auth.last_authenticated_at = Some(Instant::now());
        assert!(!auth.is_stale());

        // A zero-width window goes stale as soon as any time has passed.
        auth.staleness = Duration::ZERO;
        std::thread::sleep(Duration::from_millis(2));
        assert!(auth.is_stale());
    }

    #[test]
    fn invalidate_forces_relogin() {
        let mut auth = Authenticator::new(credentials(), Duration::from_secs(3_600));
        auth.last_authenticated_at = Some(Instant::now());
        auth.invalidate();
        assert!(auth.is_stale());
    }
}
