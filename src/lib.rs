//! Session-authenticated scraping adapters for stock-media providers.
//!
//! The core is the authenticated browser-session pipeline behind
//! [`FreepikProvider`]: one long-lived Chrome process, a login flow with a
//! staleness window, a FIFO throttle spacing every operation, and a DOM
//! extractor that maps live result markup into normalized [`Resource`]
//! records. [`EnvatoProvider`] is the token-auth realization of the same
//! [`Provider`] contract for sources with a real API.
//!
//! Construct providers once at process startup from a [`FetcherConfig`] and
//! call `close()` before exit so the browser process is not leaked.

pub mod auth;
pub mod config;
pub mod diagnostics;
pub mod envato;
pub mod error;
pub mod extract;
pub mod freepik;
pub mod provider;
pub mod resource;
pub mod session;
pub mod throttle;

pub use config::{Credentials, FetcherConfig};
pub use envato::EnvatoProvider;
pub use error::{FetchError, Result};
pub use freepik::{FreepikProvider, SessionState};
pub use provider::Provider;
pub use resource::{Author, Resource, ResourceKind};
