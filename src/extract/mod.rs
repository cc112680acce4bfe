//! HTML extraction for listing and detail pages.
//!
//! Everything here is pure: HTML text in, typed values out. Nothing in this
//! module touches the network or the dedup store.

pub mod block;
pub mod detail;
pub mod fingerprint;
pub mod listing;
pub mod payload;

pub use block::{BlockDetector, BlockReason};
pub use detail::{DetailEnricher, DetailPage};
pub use fingerprint::{fingerprint, normalize_text, FingerprintSource};
pub use listing::{
    parse_area, parse_price, CardOutcome, CardRejection, ListingExtractor, ListingPage,
};
pub use payload::{PayloadError, StatePayload};

use scraper::{ElementRef, Selector};

/// Errors raised while building extractors from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Invalid CSS selector '{selector}': {message}")]
    Selector { selector: String, message: String },
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Invalid site origin '{origin}': {source}")]
    Origin {
        origin: String,
        #[source]
        source: url::ParseError,
    },
}

/// Compile a configured CSS selector.
pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Text content of an element with whitespace collapsed to single spaces.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
