//! Per-tab setup and navigation.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use tracing::{debug, info, warn};

use super::stealth::STEALTH_SCRIPTS;
use super::{BrowserEngineConfig, BrowserEngineType};
use crate::fetcher::FetchError;

/// Desktop viewport the listing layout is rendered at.
const VIEWPORT: (i64, i64) = (1920, 1080);

/// Scroll once so lazily rendered cards are attached to the DOM.
const SCROLL_SCRIPT: &str = "window.scrollBy(0, 800); true";

const SELECTOR_POLL: Duration = Duration::from_millis(250);
const SETTLE: Duration = Duration::from_millis(500);

/// Prepare a blank tab, navigate it to `url` and return the rendered HTML.
pub(super) async fn render(
    page: &Page,
    url: &str,
    config: &BrowserEngineConfig,
) -> Result<String, FetchError> {
    let failed = |e: &dyn std::fmt::Display| FetchError::Navigation {
        url: url.to_string(),
        message: e.to_string(),
    };

    page.execute(SetDeviceMetricsOverrideParams::new(
        VIEWPORT.0, VIEWPORT.1, 1.0, false,
    ))
    .await
    .map_err(|e| failed(&e))?;

    let user_agent = SetUserAgentOverrideParams::builder()
        .user_agent(config.user_agent.clone())
        .accept_language(config.accept_language.clone())
        .build()
        .map_err(|e| failed(&e))?;
    page.execute(user_agent).await.map_err(|e| failed(&e))?;

    if config.engine == BrowserEngineType::Stealth {
        for script in STEALTH_SCRIPTS {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(*script))
                .await
                .map_err(|e| failed(&e))?;
        }
    }

    info!("Navigating to {}", url);
    tokio::time::timeout(Duration::from_secs(config.timeout), page.goto(url))
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            secs: config.timeout,
        })?
        .map_err(|e| failed(&e))?;

    if let Some(ref selector) = config.wait_for_selector {
        await_selector(page, selector, Duration::from_secs(config.timeout)).await;
    }

    if let Err(e) = page.evaluate(SCROLL_SCRIPT.to_string()).await {
        debug!("Scroll skipped: {}", e);
    }
    tokio::time::sleep(SETTLE).await;

    page.content().await.map_err(|e| failed(&e))
}

/// Poll until `selector` matches or `limit` passes. A missing selector is not
/// an error: the block detector judges the page afterwards.
async fn await_selector(page: &Page, selector: &str, limit: Duration) {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if page.find_element(selector).await.is_ok() {
            debug!("Selector {} present", selector);
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("Selector {} absent after {}s", selector, limit.as_secs());
            return;
        }
        tokio::time::sleep(SELECTOR_POLL).await;
    }
}
