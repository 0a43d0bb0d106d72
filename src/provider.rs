//! The adapter contract consumed by bot command handlers and REST
//! controllers.

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::Resource;

/// Provider-specific realization of the search/download contract, whether
/// scraped through a browser session or served by a real API.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Search the provider and return normalized records. Every returned
    /// record has a non-empty id and URL; an empty set means either no
    /// matches or an extraction soft-fail (diagnostics persisted).
    async fn search(&self, query: &str) -> Result<Vec<Resource>>;

    /// A handful of popular/featured items.
    async fn get_random(&self) -> Result<Vec<Resource>>;

    /// Resolve and fetch one item as raw bytes.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// Tear down any underlying session. Terminal and idempotent; later
    /// operations fail with `SessionClosed`.
    async fn close(&self) -> Result<()>;
}
