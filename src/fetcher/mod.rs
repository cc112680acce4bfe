//! Page fetching.
//!
//! The crawl only needs `open(url) -> html`, one navigation at a time. The
//! browser fetcher renders pages through Chrome; the HTTP fetcher is a plain
//! GET for sites that serve complete markup.

mod browser;
mod http;

pub use browser::{BrowserEngineConfig, BrowserEngineType, BrowserFetcher};
pub use http::HttpFetcher;

use async_trait::async_trait;

/// Navigation failures. All of them are fatal to a crawl run.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },
    #[error("Navigation timed out after {secs}s for {url}")]
    Timeout { url: String, secs: u64 },
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Fetcher unavailable: {0}")]
    Unavailable(String),
}

/// Opaque page-navigation capability.
#[async_trait]
pub trait Fetcher: Send {
    /// Navigate to `url` and return the rendered HTML.
    async fn open(&mut self, url: &str) -> Result<String, FetchError>;

    /// Release any underlying resources.
    async fn close(&mut self) {}
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    async fn open(&mut self, url: &str) -> Result<String, FetchError> {
        (**self).open(url).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}

/// Build the fetcher selected by the engine setting.
pub fn build_fetcher(config: &BrowserEngineConfig) -> Result<Box<dyn Fetcher>, FetchError> {
    match config.engine {
        BrowserEngineType::Http => Ok(Box::new(HttpFetcher::new(config)?)),
        BrowserEngineType::Stealth | BrowserEngineType::Standard => {
            Ok(Box::new(BrowserFetcher::new(config.clone())))
        }
    }
}
