//! Chrome-rendered fetching for the listing site.
//!
//! One browser lives for the whole run and every navigation gets a fresh
//! tab. With the stealth engine the evasion scripts are registered on the
//! tab before it navigates, so the site's own scripts never see the
//! automation flags.

mod config;
#[cfg(feature = "browser")]
mod page;
#[cfg(feature = "browser")]
mod stealth;

pub use config::{BrowserEngineConfig, BrowserEngineType};

#[cfg(not(feature = "browser"))]
use async_trait::async_trait;

#[cfg(not(feature = "browser"))]
use super::{FetchError, Fetcher};

#[cfg(feature = "browser")]
pub use self::session::BrowserFetcher;

#[cfg(feature = "browser")]
mod session {
    use std::time::Duration;

    use async_trait::async_trait;
    use chromiumoxide::handler::HandlerConfig;
    use chromiumoxide::{Browser, BrowserConfig, Handler};
    use futures::StreamExt;
    use tokio::task::JoinHandle;
    use tracing::{debug, info};

    use super::page;
    use super::BrowserEngineConfig;
    use crate::fetcher::{FetchError, Fetcher};

    /// Flags every launched Chrome gets, on top of `chrome_args`.
    const LAUNCH_ARGS: &[&str] = &[
        "--disable-blink-features=AutomationControlled",
        "--disable-infobars",
        "--disable-dev-shm-usage",
        "--no-first-run",
        "--lang=uk-UA",
        "--window-size=1920,1080",
        "--no-sandbox",
    ];

    pub struct BrowserFetcher {
        config: BrowserEngineConfig,
        browser: Option<Browser>,
        events: Option<JoinHandle<()>>,
    }

    impl BrowserFetcher {
        pub fn new(config: BrowserEngineConfig) -> Self {
            Self {
                config,
                browser: None,
                events: None,
            }
        }

        async fn browser(&mut self) -> Result<&Browser, FetchError> {
            if self.browser.is_none() {
                let (browser, handler) = match self.config.remote_url.clone() {
                    Some(url) => self.connect(&url).await?,
                    None => self.launch().await?,
                };
                self.events = Some(drive(handler));
                self.browser = Some(browser);
            }
            self.browser
                .as_ref()
                .ok_or_else(|| FetchError::Unavailable("browser not started".to_string()))
        }

        /// Start a local Chrome. chromiumoxide locates the executable.
        async fn launch(&self) -> Result<(Browser, Handler), FetchError> {
            info!("Launching Chrome (headless: {})", self.config.headless);
            let mut builder = BrowserConfig::builder()
                .request_timeout(Duration::from_secs(self.config.timeout))
                .args(LAUNCH_ARGS.iter().copied())
                .args(self.config.chrome_args.iter().cloned());
            if !self.config.headless {
                builder = builder.with_head();
            }
            if let Some(ref proxy) = self.config.proxy {
                builder = builder.arg(format!("--proxy-server={}", proxy));
            }

            let launch_config = builder.build().map_err(FetchError::Unavailable)?;
            Browser::launch(launch_config)
                .await
                .map_err(|e| FetchError::Unavailable(format!("Chrome launch failed: {}", e)))
        }

        /// Attach to a running Chrome. An `http://` DevTools address is
        /// resolved to its websocket through `/json/version`.
        async fn connect(&self, url: &str) -> Result<(Browser, Handler), FetchError> {
            let address = devtools_address(url);
            info!("Attaching to Chrome at {}", address);
            let handler_config = HandlerConfig {
                request_timeout: Duration::from_secs(self.config.timeout),
                ..Default::default()
            };
            Browser::connect_with_config(address.clone(), handler_config)
                .await
                .map_err(|e| FetchError::Unavailable(format!("Chrome at {}: {}", address, e)))
        }
    }

    /// Pump CDP events until the connection drops.
    fn drive(mut handler: Handler) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Chrome event loop stopped: {}", e);
                    break;
                }
            }
        })
    }

    /// `ws://host:port` without a target path cannot be dialed directly.
    pub(super) fn devtools_address(url: &str) -> String {
        if url.contains("/devtools/") {
            return url.to_string();
        }
        url.replacen("wss://", "https://", 1)
            .replacen("ws://", "http://", 1)
    }

    #[async_trait]
    impl Fetcher for BrowserFetcher {
        async fn open(&mut self, url: &str) -> Result<String, FetchError> {
            let config = self.config.clone();
            let browser = self.browser().await?;
            let tab = browser
                .new_page("about:blank")
                .await
                .map_err(|e| FetchError::Unavailable(format!("Failed to open tab: {}", e)))?;

            let result = page::render(&tab, url, &config).await;
            if let Err(e) = tab.close().await {
                debug!("Tab close failed: {}", e);
            }
            result
        }

        async fn close(&mut self) {
            if let Some(mut browser) = self.browser.take() {
                if let Err(e) = browser.close().await {
                    debug!("Chrome close failed: {}", e);
                }
            }
            if let Some(events) = self.events.take() {
                events.abort();
            }
        }
    }
}

/// Placeholder when Chrome support is compiled out.
#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher {
    engine: BrowserEngineType,
}

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            engine: config.engine,
        }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn open(&mut self, _url: &str) -> Result<String, FetchError> {
        Err(FetchError::Unavailable(format!(
            "engine {:?} needs Chrome support; rebuild with --features browser or set engine = \"http\"",
            self.engine
        )))
    }
}
