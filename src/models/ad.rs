//! Listing and detail models for classified ads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ad discovered on a search-results page, before its detail page is visited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdCandidate {
    /// Canonical URL (query and fragment stripped). Unique within a run.
    pub link: String,
    pub title: Option<String>,
    /// Price floored to whole currency units.
    pub price: Option<u64>,
    /// Area in square metres.
    pub area: Option<f64>,
    /// `round(price / area)`, present only when both are known and area is positive.
    pub price_per_area: Option<u64>,
    /// Location text shown next to the publication date.
    pub location: Option<String>,
    /// When the run that found this ad started.
    pub discovered_at: DateTime<Utc>,
}

impl AdCandidate {
    /// Compute the derived price per square metre.
    pub fn price_per_area(price: Option<u64>, area: Option<f64>) -> Option<u64> {
        match (price, area) {
            (Some(price), Some(area)) if area > 0.0 => Some((price as f64 / area).round() as u64),
            _ => None,
        }
    }
}

/// An ad after its detail page has been parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdDetail {
    #[serde(flatten)]
    pub candidate: AdCandidate,
    pub description: Option<String>,
    pub currency: Option<String>,
    /// Attribute name to value, e.g. floor, heating, housing class.
    pub parameters: BTreeMap<String, String>,
    pub district: Option<String>,
    pub author: Option<String>,
    /// Hex SHA-256 of the normalized fingerprint source text.
    pub fingerprint: Option<String>,
    /// Link of the earlier ad this one probably re-lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

impl AdDetail {
    pub fn link(&self) -> &str {
        &self.candidate.link
    }

    /// Whether this ad was flagged as a probable re-listing.
    pub fn is_probable_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    /// First five words of the description, for summaries.
    pub fn description_preview(&self) -> Option<String> {
        let description = self.description.as_deref()?;
        let words: Vec<&str> = description.split_whitespace().take(5).collect();
        if words.is_empty() {
            return None;
        }
        Some(format!("{}...", words.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> AdCandidate {
        AdCandidate {
            link: "https://www.olx.ua/d/uk/obyavlenie/flat-IDabc.html".to_string(),
            title: Some("Продам квартиру".to_string()),
            price: Some(1234),
            area: Some(45.0),
            price_per_area: Some(27),
            location: None,
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_per_area_rounds() {
        assert_eq!(AdCandidate::price_per_area(Some(1234), Some(45.0)), Some(27));
        assert_eq!(AdCandidate::price_per_area(Some(50000), Some(40.0)), Some(1250));
    }

    #[test]
    fn test_price_per_area_requires_positive_area() {
        assert_eq!(AdCandidate::price_per_area(Some(1234), None), None);
        assert_eq!(AdCandidate::price_per_area(Some(1234), Some(0.0)), None);
        assert_eq!(AdCandidate::price_per_area(Some(1234), Some(-3.0)), None);
        assert_eq!(AdCandidate::price_per_area(None, Some(45.0)), None);
    }

    #[test]
    fn test_description_preview() {
        let mut detail = AdDetail {
            candidate: candidate(),
            description: Some("Затишна квартира з ремонтом у центрі міста поруч парк".to_string()),
            currency: None,
            parameters: BTreeMap::new(),
            district: None,
            author: None,
            fingerprint: None,
            duplicate_of: None,
        };
        assert_eq!(
            detail.description_preview().as_deref(),
            Some("Затишна квартира з ремонтом у...")
        );

        detail.description = Some("   ".to_string());
        assert_eq!(detail.description_preview(), None);
    }
}
