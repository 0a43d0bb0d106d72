//! Page navigation and DOM extraction for scraped providers.
//!
//! All provider-specific markup knowledge lives in a [`PageProfile`]; the
//! pipeline itself only knows how to drive a tab, check restriction markers,
//! and map result cards through ordered selector fallbacks. Parsing is a
//! pure HTML -> records function so it stays testable without a browser.

use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, Element, Tab};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::diagnostics::DiagnosticSink;
use crate::error::{FetchError, Result};
use crate::resource::{Author, Resource, ResourceKind};

/// How long to wait for the results container / download elements once the
/// page itself has loaded.
const CONTENT_WAIT: Duration = Duration::from_secs(10);

/// Timeout for the direct fetch of a resolved download URL.
const DOWNLOAD_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/123.0.0.0 Safari/537.36",
    ]
});

/// Item ids are embedded in canonical page URLs, e.g.
/// `/free-photo/forest-path_12345678.htm`.
static ITEM_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(\d+)\.htm").unwrap());

/// One user agent per tab, picked uniformly to reduce fingerprint
/// correlation across requests.
pub fn pick_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Provider-specific page knowledge: URLs, restriction markers, and the
/// selector fallback chains per extracted field. Fallbacks are tried in
/// order; the first selector that yields a non-empty value wins.
#[derive(Debug, Clone)]
pub struct PageProfile {
    pub name: &'static str,
    pub base_url: &'static str,
    pub login_url: &'static str,
    pub username_selectors: &'static [&'static str],
    pub password_selectors: &'static [&'static str],
    pub submit_selector: &'static str,
    /// CSS group matching explicit error/restriction banners.
    pub restriction_markers: &'static str,
    /// One result card.
    pub results_container: &'static str,
    pub card_id_attr: &'static str,
    pub title_selectors: &'static [&'static str],
    pub link_selector: &'static str,
    pub media_type_attr: &'static str,
    pub preview_selectors: &'static [&'static str],
    pub author_selectors: &'static [&'static str],
    pub author_handle_selectors: &'static [&'static str],
    pub download_trigger: &'static str,
    pub download_link: &'static str,
}

impl PageProfile {
    pub fn freepik() -> Self {
        PageProfile {
            name: "freepik",
            base_url: "https://www.freepik.com",
            login_url: "https://www.freepik.com/login",
            username_selectors: &["#username", "#email", "input[name='email']"],
            password_selectors: &["#password", "input[name='password']"],
            submit_selector: "button[type='submit']",
            restriction_markers: ".error-message, .restriction-message",
            results_container: ".showcase__item",
            card_id_attr: "data-id",
            title_selectors: &[".title", ".showcase__title"],
            link_selector: "a[data-type]",
            media_type_attr: "data-type",
            preview_selectors: &["img.showcase__image", "img"],
            author_selectors: &[".author", ".showcase__author"],
            author_handle_selectors: &[".username", ".showcase__username"],
            download_trigger: ".download-button, .download__button",
            download_link: ".download-link, .download__link",
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        format!("{}/search?query={}", self.base_url, urlencoding::encode(query))
    }

    /// Resolve a possibly relative href against the provider origin.
    pub fn absolutize(&self, href: &str) -> String {
        if href.starts_with('/') {
            format!("{}{}", self.base_url, href)
        } else {
            href.to_string()
        }
    }
}

/// Closes its tab when dropped, so every exit path of an operation releases
/// the tab.
struct TabGuard {
    tab: Arc<Tab>,
}

impl TabGuard {
    fn new(tab: Arc<Tab>) -> Self {
        TabGuard { tab }
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            debug!(error = %e, "tab close failed");
        }
    }
}

fn first_text(scope: &ElementRef<'_>, selectors: &[&str]) -> String {
    for raw in selectors {
        if let Ok(selector) = Selector::parse(raw) {
            if let Some(el) = scope.select(&selector).next() {
                let text = el.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    String::new()
}

fn first_attr(scope: &ElementRef<'_>, selectors: &[&str], attr: &str) -> String {
    for raw in selectors {
        if let Ok(selector) = Selector::parse(raw) {
            if let Some(value) = scope
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr(attr))
            {
                if !value.is_empty() {
                    return value.to_string();
                }
            }
        }
    }
    String::new()
}

/// Last-resort identity: pull the numeric id out of the item page URL.
fn item_id_from_url(url: &str) -> String {
    ITEM_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Map rendered search markup into normalized records.
///
/// Each card is mapped independently; a missing field becomes an empty
/// string instead of aborting the record. Records without both an id and a
/// URL are dropped.
pub fn parse_results(html: &str, profile: &PageProfile) -> Vec<Resource> {
    let document = Html::parse_document(html);
    let Ok(card_selector) = Selector::parse(profile.results_container) else {
        return Vec::new();
    };

    document
        .select(&card_selector)
        .map(|card| {
            let url = profile.absolutize(&first_attr(&card, &[profile.link_selector], "href"));
            let id = card
                .value()
                .attr(profile.card_id_attr)
                .unwrap_or("")
                .to_string();
            let id = if id.is_empty() { item_id_from_url(&url) } else { id };
            let media_type = {
                let t = first_attr(&card, &[profile.link_selector], profile.media_type_attr);
                if t.is_empty() { "vector".to_string() } else { t }
            };

            Resource {
                id,
                title: first_text(&card, profile.title_selectors),
                url,
                preview_url: first_attr(&card, profile.preview_selectors, "src"),
                author: Author {
                    name: first_text(&card, profile.author_selectors),
                    username: first_text(&card, profile.author_handle_selectors),
                },
                kind: ResourceKind::Media { media_type },
            }
        })
        .filter(Resource::has_identity)
        .collect()
}

/// Text of the provider's error/restriction banner, if one is present.
pub fn restriction_text(tab: &Arc<Tab>, profile: &PageProfile) -> Option<String> {
    let el = tab.find_element(profile.restriction_markers).ok()?;
    let text = el.get_inner_text().ok()?.trim().to_string();
    Some(text)
}

/// Run one search against a fresh tab.
///
/// The missing-results case is a deliberate soft-fail: "no results" and
/// "markup drifted" both come back as an empty set, with the raw markup
/// persisted for the operator. Restriction markers and browser failures
/// propagate.
pub fn run_search(
    browser: &Browser,
    profile: &PageProfile,
    query: &str,
    nav_timeout: Duration,
    diagnostics: &DiagnosticSink,
) -> Result<Vec<Resource>> {
    let tab = browser.new_tab().map_err(FetchError::Browser)?;
    let _guard = TabGuard::new(Arc::clone(&tab));

    match search_in_tab(&tab, profile, query, nav_timeout) {
        Ok(resources) => {
            info!(provider = profile.name, query, count = resources.len(), "search complete");
            Ok(resources)
        }
        Err(FetchError::ResultsTimeout) => {
            warn!(provider = profile.name, query, "results container never appeared");
            if let Ok(html) = tab.get_content() {
                diagnostics.dump_html(&format!("no-results-{}", profile.name), &html);
            }
            Ok(Vec::new())
        }
        Err(err) => {
            diagnostics.screenshot(&tab, &format!("search-error-{}", profile.name));
            Err(err)
        }
    }
}

fn search_in_tab(
    tab: &Arc<Tab>,
    profile: &PageProfile,
    query: &str,
    nav_timeout: Duration,
) -> Result<Vec<Resource>> {
    tab.set_default_timeout(nav_timeout);
    tab.set_user_agent(pick_user_agent(), None, None)
        .map_err(FetchError::Browser)?;

    let url = profile.search_url(query);
    debug!(%url, "navigating to search page");
    tab.navigate_to(&url).map_err(FetchError::Browser)?;
    tab.wait_until_navigated().map_err(FetchError::Browser)?;

    if let Some(text) = restriction_text(tab, profile) {
        return Err(FetchError::Scrape(text));
    }

    if tab
        .wait_for_element_with_custom_timeout(profile.results_container, CONTENT_WAIT)
        .is_err()
    {
        return Err(FetchError::ResultsTimeout);
    }

    let html = tab.get_content().map_err(FetchError::Browser)?;
    Ok(parse_results(&html, profile))
}

/// Navigate to an item page, click through the download flow, and return the
/// resolved direct-download URL.
pub fn resolve_download_href(
    browser: &Browser,
    profile: &PageProfile,
    item_url: &str,
    nav_timeout: Duration,
    diagnostics: &DiagnosticSink,
) -> Result<String> {
    let tab = browser.new_tab().map_err(FetchError::Browser)?;
    let _guard = TabGuard::new(Arc::clone(&tab));

    match download_href_in_tab(&tab, profile, item_url, nav_timeout) {
        Ok(href) => Ok(href),
        Err(err) => {
            diagnostics.screenshot(&tab, &format!("download-error-{}", profile.name));
            Err(err)
        }
    }
}

fn download_href_in_tab(
    tab: &Arc<Tab>,
    profile: &PageProfile,
    item_url: &str,
    nav_timeout: Duration,
) -> Result<String> {
    tab.set_default_timeout(nav_timeout);
    tab.set_user_agent(pick_user_agent(), None, None)
        .map_err(FetchError::Browser)?;

    tab.navigate_to(item_url).map_err(FetchError::Browser)?;
    tab.wait_until_navigated().map_err(FetchError::Browser)?;

    if let Some(text) = restriction_text(tab, profile) {
        return Err(FetchError::Scrape(text));
    }

    let trigger: Element<'_> = tab
        .wait_for_element_with_custom_timeout(profile.download_trigger, CONTENT_WAIT)
        .map_err(|_| FetchError::ResultsTimeout)?;
    trigger.click().map_err(FetchError::Browser)?;

    tab.wait_for_element_with_custom_timeout(profile.download_link, CONTENT_WAIT)
        .map_err(|_| FetchError::DownloadLinkMissing)?;
    let html = tab.get_content().map_err(FetchError::Browser)?;
    let href = download_href_from_html(&html, profile.download_link);
    if href.is_empty() {
        return Err(FetchError::DownloadLinkMissing);
    }

    Ok(profile.absolutize(&href))
}

/// Read the href off the first matching download-link element.
fn download_href_from_html(html: &str, selector: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse(selector) else {
        return String::new();
    };
    document
        .select(&link_selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .unwrap_or("")
        .to_string()
}

/// Direct fetch of a resolved download URL.
pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .user_agent(pick_user_agent())
        .timeout(DOWNLOAD_FETCH_TIMEOUT)
        .build()?;

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Download {
            status: status.as_u16(),
        });
    }
    Ok(response.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"
        <html><body><div class="showcase">
          <figure class="showcase__item" data-id="101">
            <a data-type="photo" href="/free-photo/forest-path_101.htm"></a>
            <img class="showcase__image" src="https://img.example.com/101.jpg">
            <span class="showcase__title">Forest path</span>
            <span class="showcase__author">Jane Doe</span>
            <span class="showcase__username">@janedoe</span>
          </figure>
          <figure class="showcase__item">
            <a data-type="vector" href="https://www.freepik.com/free-vector/leaf_202.htm"></a>
            <span class="title">Leaf</span>
          </figure>
          <figure class="showcase__item" data-id="303">
            <span class="showcase__title">No link at all</span>
          </figure>
        </div></body></html>
    "#;

    #[test]
    fn maps_cards_and_enforces_identity() {
        let profile = PageProfile::freepik();
        let results = parse_results(SEARCH_PAGE, &profile);

        // Third card has an id but no URL and must be dropped.
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Resource::has_identity));

        let first = &results[0];
        assert_eq!(first.id, "101");
        assert_eq!(first.title, "Forest path");
        assert_eq!(first.url, "https://www.freepik.com/free-photo/forest-path_101.htm");
        assert_eq!(first.preview_url, "https://img.example.com/101.jpg");
        assert_eq!(first.author.name, "Jane Doe");
        assert_eq!(first.author.username, "@janedoe");
        assert_eq!(
            first.kind,
            ResourceKind::Media {
                media_type: "photo".into()
            }
        );
    }

    #[test]
    fn id_falls_back_to_item_page_url() {
        let profile = PageProfile::freepik();
        let results = parse_results(SEARCH_PAGE, &profile);
        // Second card has no data-id attribute.
        assert_eq!(results[1].id, "202");
        assert_eq!(results[1].title, "Leaf");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let profile = PageProfile::freepik();
        let results = parse_results(SEARCH_PAGE, &profile);
        assert_eq!(results[1].preview_url, "");
        assert_eq!(results[1].author.name, "");
    }

    #[test]
    fn page_without_cards_yields_empty_set() {
        let profile = PageProfile::freepik();
        assert!(parse_results("<html><body><p>nothing here</p></body></html>", &profile).is_empty());
    }

    #[test]
    fn search_url_is_percent_encoded() {
        let profile = PageProfile::freepik();
        assert_eq!(
            profile.search_url("forest cabin"),
            "https://www.freepik.com/search?query=forest%20cabin"
        );
    }

    #[test]
    fn absolutize_only_touches_relative_hrefs() {
        let profile = PageProfile::freepik();
        assert_eq!(
            profile.absolutize("/download/101"),
            "https://www.freepik.com/download/101"
        );
        assert_eq!(profile.absolutize("https://cdn.example.com/x"), "https://cdn.example.com/x");
    }

    #[test]
    fn download_href_comes_from_first_matching_link() {
        let html = r#"<html><body>
            <a class="download-link" href="/download/101/token"></a>
            <a class="download-link" href="/download/101/stale"></a>
        </body></html>"#;
        assert_eq!(
            download_href_from_html(html, ".download-link, .download__link"),
            "/download/101/token"
        );
        assert_eq!(download_href_from_html("<html></html>", ".download-link"), "");
    }

    #[test]
    fn item_id_regex_matches_canonical_urls() {
        assert_eq!(item_id_from_url("https://www.freepik.com/free-photo/a_42.htm"), "42");
        assert_eq!(item_id_from_url("https://www.freepik.com/profile"), "");
    }

    #[test]
    fn user_agent_comes_from_the_pool() {
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&pick_user_agent()));
        }
    }
}
