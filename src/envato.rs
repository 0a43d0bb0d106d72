//! Token-authenticated marketplace adapter.
//!
//! The contract's other realization, for a provider with a real API: no
//! browser, no throttle, just an authorized HTTP client mapping JSON into
//! the same normalized records as the scraped path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::FetcherConfig;
use crate::error::{FetchError, Result};
use crate::provider::Provider;
use crate::resource::{Author, Resource, ResourceKind};

const ENVATO_API_URL: &str = "https://api.envato.com/v1/market";
const CLIENT_USER_AGENT: &str = "stock-fetcher/0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// The chat surface shows a handful of results at a time.
const MAX_ITEMS: usize = 5;

pub struct EnvatoProvider {
    client: reqwest::Client,
    token: String,
    closed: AtomicBool,
}

impl EnvatoProvider {
    /// Fails fast when no personal token is configured; every request would
    /// be rejected anyway.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let token = config.envato_token.clone().ok_or_else(|| {
            FetchError::Authentication("ENVATO_PERSONAL_TOKEN not configured".to_string())
        })?;
        let client = reqwest::Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(EnvatoProvider {
            client,
            token,
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(FetchError::SessionClosed)
        } else {
            Ok(())
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        self.check_open()?;
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Scrape(format!(
                "marketplace API error: {status}"
            )));
        }
        Ok(response.json().await?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Resource>> {
        let url = format!(
            "{ENVATO_API_URL}/search/item?term={}",
            urlencoding::encode(query)
        );
        let data = self.get_json(&url).await?;
        let items = map_search_matches(&data);
        info!(query, count = items.len(), "marketplace search complete");
        Ok(items)
    }

    pub async fn get_random(&self) -> Result<Vec<Resource>> {
        let data = self
            .get_json(&format!("{ENVATO_API_URL}/popular:themeforest"))
            .await?;
        Ok(map_popular_items(&data))
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.check_open()?;
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Download {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Idempotent; operations after this fail with `SessionClosed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for EnvatoProvider {
    async fn search(&self, query: &str) -> Result<Vec<Resource>> {
        EnvatoProvider::search(self, query).await
    }

    async fn get_random(&self) -> Result<Vec<Resource>> {
        EnvatoProvider::get_random(self).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        EnvatoProvider::download(self, url).await
    }

    async fn close(&self) -> Result<()> {
        EnvatoProvider::close(self);
        Ok(())
    }
}

fn string_field(item: &Value, key: &str) -> String {
    item[key].as_str().unwrap_or("").to_string()
}

/// Ids come back as integers from search and occasionally as strings from
/// the popular feed.
fn id_field(item: &Value) -> String {
    match &item["id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn map_search_matches(data: &Value) -> Vec<Resource> {
    data["matches"]
        .as_array()
        .map(|matches| {
            matches
                .iter()
                .take(MAX_ITEMS)
                .map(map_match)
                .filter(Resource::has_identity)
                .collect()
        })
        .unwrap_or_default()
}

fn map_match(item: &Value) -> Resource {
    let author = string_field(item, "author_username");
    Resource {
        id: id_field(item),
        title: string_field(item, "name"),
        url: string_field(item, "url"),
        preview_url: item["previews"]["landscape_preview"]["landscape_url"]
            .as_str()
            .or_else(|| item["previews"]["icon_with_landscape_preview"]["landscape_url"].as_str())
            .unwrap_or("")
            .to_string(),
        author: Author {
            name: author.clone(),
            username: author,
        },
        kind: ResourceKind::Marketplace {
            price_cents: item["price_cents"].as_u64().unwrap_or(0),
            category: {
                let c = item["category"]["name"].as_str().unwrap_or("");
                if c.is_empty() { "Unknown".to_string() } else { c.to_string() }
            },
        },
    }
}

fn map_popular_items(data: &Value) -> Vec<Resource> {
    data.as_array()
        .map(|items| {
            items
                .iter()
                .take(MAX_ITEMS)
                .map(map_popular)
                .filter(Resource::has_identity)
                .collect()
        })
        .unwrap_or_default()
}

fn map_popular(item: &Value) -> Resource {
    let author = string_field(item, "user");
    let preview = {
        let p = string_field(item, "preview_url");
        if p.is_empty() { string_field(item, "thumbnail") } else { p }
    };
    Resource {
        id: id_field(item),
        title: string_field(item, "item"),
        url: string_field(item, "url"),
        preview_url: preview,
        author: Author {
            name: author.clone(),
            username: author,
        },
        kind: ResourceKind::Marketplace {
            price_cents: item["price_cents"].as_u64().unwrap_or(0),
            category: {
                let c = string_field(item, "category");
                if c.is_empty() { "Unknown".to_string() } else { c }
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_search_matches_and_truncates() {
        let data = json!({
            "matches": (0..8).map(|i| json!({
                "id": 1000 + i,
                "name": format!("Theme {i}"),
                "author_username": "builder",
                "price_cents": 5900,
                "category": { "name": "site-templates" },
                "url": format!("https://themeforest.net/item/{i}"),
                "previews": {
                    "landscape_preview": { "landscape_url": "https://cdn.example.com/p.jpg" }
                }
            })).collect::<Vec<_>>()
        });

        let items = map_search_matches(&data);
        assert_eq!(items.len(), MAX_ITEMS);
        assert!(items.iter().all(Resource::has_identity));

        let first = &items[0];
        assert_eq!(first.id, "1000");
        assert_eq!(first.title, "Theme 0");
        assert_eq!(first.author.username, "builder");
        assert_eq!(first.preview_url, "https://cdn.example.com/p.jpg");
        assert_eq!(
            first.kind,
            ResourceKind::Marketplace {
                price_cents: 5900,
                category: "site-templates".into()
            }
        );
    }

    #[test]
    fn search_matches_without_identity_are_dropped() {
        let data = json!({
            "matches": [
                { "id": 1, "name": "no url", "author_username": "x" },
                { "id": 2, "name": "ok", "url": "https://themeforest.net/item/2" }
            ]
        });
        let items = map_search_matches(&data);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "2");
    }

    #[test]
    fn preview_falls_back_to_icon_variant() {
        let data = json!({
            "matches": [{
                "id": 3,
                "url": "https://themeforest.net/item/3",
                "previews": {
                    "icon_with_landscape_preview": { "landscape_url": "https://cdn.example.com/icon.jpg" }
                }
            }]
        });
        assert_eq!(
            map_search_matches(&data)[0].preview_url,
            "https://cdn.example.com/icon.jpg"
        );
    }

    #[test]
    fn maps_popular_feed_shape() {
        let data = json!([
            {
                "id": "77",
                "item": "Popular Theme",
                "user": "someone",
                "url": "https://themeforest.net/item/77",
                "thumbnail": "https://cdn.example.com/t.jpg"
            }
        ]);
        let items = map_popular_items(&data);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "77");
        assert_eq!(items[0].title, "Popular Theme");
        assert_eq!(items[0].preview_url, "https://cdn.example.com/t.jpg");
        assert_eq!(
            items[0].kind,
            ResourceKind::Marketplace {
                price_cents: 0,
                category: "Unknown".into()
            }
        );
    }

    #[test]
    fn missing_token_fails_construction() {
        let config = FetcherConfig::from_lookup(|_| None);
        assert!(matches!(
            EnvatoProvider::new(&config),
            Err(FetchError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn closed_provider_rejects_operations() {
        let config = FetcherConfig::from_lookup(|key| {
            (key == "ENVATO_PERSONAL_TOKEN").then(|| "token".to_string())
        });
        let provider = EnvatoProvider::new(&config).unwrap();
        provider.close();
        assert!(matches!(
            provider.download("https://example.com/item.zip").await,
            Err(FetchError::SessionClosed)
        ));
        assert!(matches!(
            provider.search("themes").await,
            Err(FetchError::SessionClosed)
        ));
    }
}
