//! Command-line harness around the scraped-provider adapter.
//!
//! Runs one search (and optionally one download) against the configured
//! account. The provider is constructed here and passed down explicitly;
//! an interrupt always tears the session down so no Chrome process is
//! leaked.

use std::sync::Arc;

use dotenv::dotenv;
use tracing::{error, info};

use stock_fetcher::{FetcherConfig, FreepikProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = FetcherConfig::from_env();
    let provider = Arc::new(FreepikProvider::new(&config));

    let mut args = std::env::args().skip(1);
    let query = args.next().unwrap_or_else(|| "nature".to_string());
    let download_url = args.next();

    tokio::select! {
        outcome = run(Arc::clone(&provider), &query, download_url.as_deref()) => {
            if let Err(e) = outcome {
                error!(error = %e, "run failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    provider.close().await?;
    Ok(())
}

async fn run(
    provider: Arc<FreepikProvider>,
    query: &str,
    download_url: Option<&str>,
) -> anyhow::Result<()> {
    let results = provider.search(query).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);

    if let Some(url) = download_url {
        let bytes = provider.download(url).await?;
        info!(url, size = bytes.len(), "download complete");
    }
    Ok(())
}
