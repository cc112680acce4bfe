//! Detail-page enrichment.
//!
//! Sources are merged in priority order: the structured-data block, then the
//! free-form parameter table, then the state payload. Later sources only fill
//! gaps and never overwrite an attribute that is already present.

use std::collections::BTreeMap;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

use super::listing::parse_price;
use super::payload::{decode_state_payload, state_pattern, PayloadError};
use super::{element_text, fingerprint, parse_selector, ExtractError, FingerprintSource};
use crate::config::SiteConfig;
use crate::models::{AdCandidate, AdDetail};

/// Everything a detail page yields on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub currency: Option<String>,
    pub district: Option<String>,
    pub author: Option<String>,
    pub parameters: BTreeMap<String, String>,
}

/// Parses detail pages and promotes candidates to enriched ads.
pub struct DetailEnricher {
    structured_data: Selector,
    parameter_row: Selector,
    state: Regex,
    fingerprint_source: FingerprintSource,
}

impl DetailEnricher {
    pub fn new(site: &SiteConfig, fingerprint_source: FingerprintSource) -> Result<Self, ExtractError> {
        Ok(Self {
            structured_data: parse_selector(&site.structured_data_selector)?,
            parameter_row: parse_selector(&site.parameter_selector)?,
            state: state_pattern(&site.state_variable)?,
            fingerprint_source,
        })
    }

    /// Parse a detail page. Malformed sections degrade to absent fields.
    pub fn parse(&self, html: &str) -> DetailPage {
        let document = Html::parse_document(html);
        let mut page = DetailPage::default();

        for script in document.select(&self.structured_data) {
            let raw: String = script.text().collect();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => {
                    if let Some(product) = structured_product(&value) {
                        apply_structured(&mut page, product);
                        break;
                    }
                }
                Err(e) => warn!("Malformed structured data block: {}", e),
            }
        }

        for row in document.select(&self.parameter_row) {
            let text = element_text(row);
            if let Some((label, value)) = text.split_once(':') {
                let (label, value) = (label.trim(), value.trim());
                if !label.is_empty() && !value.is_empty() {
                    page.parameters
                        .entry(label.to_string())
                        .or_insert_with(|| value.to_string());
                }
            }
        }

        match decode_state_payload(html, &self.state) {
            Ok(payload) => {
                debug!("State payload: {} params", payload.params.len());
                page.author = page.author.or(payload.author);
                page.district = page.district.or(payload.district);
                for (name, value) in payload.params {
                    page.parameters.entry(name).or_insert(value);
                }
            }
            Err(PayloadError::Missing) => debug!("No state payload on page"),
            Err(e) => warn!("Ignoring state payload: {}", e),
        }

        page
    }

    /// Promote a listing candidate using its detail page.
    pub fn enrich(&self, candidate: AdCandidate, html: &str) -> AdDetail {
        let page = self.parse(html);
        let mut candidate = candidate;

        if page.title.is_some() {
            candidate.title = page.title;
        }
        // Listing prices are already currency-normalized by the search filter.
        if candidate.price.is_none() {
            candidate.price = page.price;
        }
        candidate.price_per_area = AdCandidate::price_per_area(candidate.price, candidate.area);

        let source_text = match self.fingerprint_source {
            FingerprintSource::Title => candidate.title.as_deref(),
            FingerprintSource::Description => page.description.as_deref(),
        };
        let fingerprint = source_text.and_then(fingerprint);

        AdDetail {
            candidate,
            description: page.description,
            currency: page.currency,
            parameters: page.parameters,
            district: page.district,
            author: page.author,
            fingerprint,
            duplicate_of: None,
        }
    }
}

/// The first object in the block that looks like the ad itself.
fn structured_product(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) if map.contains_key("name") || map.contains_key("description") => {
            Some(value)
        }
        Value::Array(items) => items.iter().find_map(structured_product),
        _ => None,
    }
}

fn apply_structured(page: &mut DetailPage, product: &Value) {
    page.title = non_empty_str(product.get("name"));
    page.description = non_empty_str(product.get("description"));

    let offers = match product.get("offers") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    if let Some(offers) = offers {
        page.price = match offers.get("price") {
            Some(Value::Number(n)) => n.as_f64().filter(|v| *v >= 0.0).map(|v| v.floor() as u64),
            Some(Value::String(s)) => parse_price(s),
            _ => None,
        };
        page.currency = non_empty_str(offers.get("priceCurrency"));
        page.district = non_empty_str(offers.get("areaServed").and_then(|a| a.get("name")));
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
