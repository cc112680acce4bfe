//! Search-results page parsing.
//!
//! A card is turned into a candidate by a pure transform (`parse_card`) so
//! that the date-window, promotion and price rules can be tested on bare
//! HTML fragments.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{element_text, parse_selector, ExtractError};
use crate::config::{FilterConfig, SiteConfig};
use crate::crawl::RunContext;
use crate::models::AdCandidate;

/// Why an in-window card did not become a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum CardRejection {
    MissingLink,
    MissingPrice,
    BelowMinimum { price: u64, min: u64 },
}

/// Result of evaluating a single card.
#[derive(Debug, Clone, PartialEq)]
pub enum CardOutcome {
    /// Date text does not mention the target day.
    OutOfWindow,
    /// Published today; excluded from the window.
    Today,
    /// Promoted placement, not chronologically ordered.
    Promoted,
    Rejected(CardRejection),
    Accepted(AdCandidate),
}

impl CardOutcome {
    /// Whether the card matched the target day (accepted or not).
    pub fn in_window(&self) -> bool {
        matches!(self, CardOutcome::Rejected(_) | CardOutcome::Accepted(_))
    }
}

/// Candidates parsed from one listing page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub candidates: BTreeMap<String, AdCandidate>,
    /// True iff at least one card matched the target day, even if it was filtered out.
    pub found_in_window: bool,
    pub cards_seen: usize,
}

impl ListingPage {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Extracts candidate ads from listing pages.
pub struct ListingExtractor {
    card: Selector,
    price: Selector,
    anchor: Selector,
    span: Selector,
    paragraph: Selector,
    div: Selector,
    origin: Url,
    permalink_prefix: String,
    area_marker: String,
    promoted_label: String,
    today_marker: String,
    min_price: u64,
    price_required: bool,
}

impl ListingExtractor {
    pub fn new(site: &SiteConfig, filter: &FilterConfig) -> Result<Self, ExtractError> {
        let origin = Url::parse(&site.origin).map_err(|source| ExtractError::Origin {
            origin: site.origin.clone(),
            source,
        })?;

        Ok(Self {
            card: parse_selector(&site.card_selector)?,
            price: parse_selector(&site.price_selector)?,
            anchor: parse_selector("a[href]")?,
            span: parse_selector("span")?,
            paragraph: parse_selector("p")?,
            div: parse_selector("div")?,
            origin,
            permalink_prefix: site.permalink_prefix.clone(),
            area_marker: site.area_marker.clone(),
            promoted_label: site.promoted_label.to_lowercase(),
            today_marker: site.today_marker.to_lowercase(),
            min_price: filter.min_price,
            price_required: filter.price_required(),
        })
    }

    /// Parse every card on a listing page.
    pub fn extract(&self, html: &str, ctx: &RunContext) -> ListingPage {
        let document = Html::parse_document(html);
        let mut page = ListingPage::default();

        for card in document.select(&self.card) {
            page.cards_seen += 1;
            let outcome = self.parse_card(card, ctx);
            page.found_in_window |= outcome.in_window();

            match outcome {
                CardOutcome::Accepted(candidate) => {
                    // First occurrence wins; a link never yields two candidates.
                    page.candidates
                        .entry(candidate.link.clone())
                        .or_insert(candidate);
                }
                CardOutcome::Rejected(reason) => {
                    debug!("Dropped in-window card: {:?}", reason);
                }
                other => {
                    debug!("Skipped card: {:?}", other);
                }
            }
        }

        page
    }

    /// Evaluate a standalone card fragment.
    pub fn parse_card_html(&self, fragment: &str, ctx: &RunContext) -> CardOutcome {
        let html = Html::parse_fragment(fragment);
        self.parse_card(html.root_element(), ctx)
    }

    fn parse_card(&self, card: ElementRef<'_>, ctx: &RunContext) -> CardOutcome {
        let paragraphs: Vec<String> = card
            .select(&self.paragraph)
            .map(|p| element_text(p).to_lowercase())
            .collect();

        if paragraphs.iter().any(|p| p.contains(&self.today_marker)) {
            return CardOutcome::Today;
        }

        let marker = ctx.day_marker.to_lowercase();
        let Some(date_paragraph) = paragraphs
            .iter()
            .position(|p| contains_day_marker(p, &marker))
        else {
            return CardOutcome::OutOfWindow;
        };

        if self.is_promoted(card) {
            return CardOutcome::Promoted;
        }

        let Some(link) = self.card_link(card) else {
            return CardOutcome::Rejected(CardRejection::MissingLink);
        };

        let price = card
            .select(&self.price)
            .next()
            .and_then(|tag| parse_price(&element_text(tag)));
        match price {
            None if self.price_required => {
                return CardOutcome::Rejected(CardRejection::MissingPrice);
            }
            Some(price) if price < self.min_price => {
                return CardOutcome::Rejected(CardRejection::BelowMinimum {
                    price,
                    min: self.min_price,
                });
            }
            _ => {}
        }

        let area = card
            .select(&self.span)
            .map(element_text)
            .find(|text| text.contains(&self.area_marker))
            .and_then(|text| parse_area(&text));

        // Location text keeps its original case, so re-read the paragraph.
        let location = card
            .select(&self.paragraph)
            .nth(date_paragraph)
            .map(element_text)
            .and_then(|text| location_from_date_line(&text));

        CardOutcome::Accepted(AdCandidate {
            link,
            title: self.card_title(card),
            price,
            area,
            price_per_area: AdCandidate::price_per_area(price, area),
            location,
            discovered_at: ctx.started_at,
        })
    }

    fn is_promoted(&self, card: ElementRef<'_>) -> bool {
        card.select(&self.div)
            .any(|div| element_text(div).to_lowercase() == self.promoted_label)
    }

    fn permalinks<'a>(&'a self, card: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        card.select(&self.anchor).filter(move |a| {
            a.value()
                .attr("href")
                .is_some_and(|href| href.contains(&self.permalink_prefix))
        })
    }

    fn card_title(&self, card: ElementRef<'_>) -> Option<String> {
        self.permalinks(card)
            .map(element_text)
            .find(|text| !text.is_empty())
    }

    fn card_link(&self, card: ElementRef<'_>) -> Option<String> {
        let href = self
            .permalinks(card)
            .next()
            .or_else(|| card.select(&self.anchor).next())
            .and_then(|a| a.value().attr("href"))?;
        canonicalize_link(&self.origin, href)
    }
}

/// Match the day marker without letting "5 жовтня" match inside "15 жовтня".
fn contains_day_marker(text: &str, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    text.match_indices(marker).any(|(idx, _)| {
        !text[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

/// Location is the part of the date line before " - ".
fn location_from_date_line(text: &str) -> Option<String> {
    let (location, _) = text.split_once(" - ")?;
    let location = location.trim();
    if location.is_empty() {
        None
    } else {
        Some(location.to_string())
    }
}

/// Resolve an ad href against the site origin and drop tracking suffixes.
pub(crate) fn canonicalize_link(origin: &Url, href: &str) -> Option<String> {
    let mut url = origin.join(href.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);

    let mut link = url.to_string();
    if let Some(idx) = link.find(".html") {
        link.truncate(idx + ".html".len());
    }
    Some(link)
}

/// Keep digits and decimal points, then floor. `"1 234 $"` → 1234.
pub fn parse_price(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.floor() as u64)
}

/// Leading number of an area label. `"45 м²"` → 45.0, `"37,5 м²"` → 37.5.
pub fn parse_area(text: &str) -> Option<f64> {
    let number: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    number.parse().ok()
}
