//! Anti-bot block detection for listing pages.
//!
//! Heuristic only, tuned to prefer false positives: a blocked page treated as
//! "no results" silently truncates the run, while a false block merely aborts it.

use crate::config::BlockConfig;

/// Why a page was classified as blocked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockReason {
    #[error("page too small ({len} < {floor} characters)")]
    TooSmall { len: usize, floor: usize },
    #[error("listing card marker missing")]
    MissingCardMarker,
    #[error("blocking phrase present: \"{0}\"")]
    Phrase(String),
}

/// Classifies fetched listing HTML as blocked or usable.
#[derive(Debug, Clone)]
pub struct BlockDetector {
    size_floor: usize,
    card_marker: String,
    phrases: Vec<String>,
}

impl BlockDetector {
    pub fn new(config: &BlockConfig) -> Self {
        Self {
            size_floor: config.size_floor,
            card_marker: config.card_marker.clone(),
            phrases: config.phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Classify a page. Rules are checked in priority order; the first match wins.
    pub fn classify(&self, html: &str) -> Option<BlockReason> {
        let len = html.chars().count();
        if len < self.size_floor {
            return Some(BlockReason::TooSmall {
                len,
                floor: self.size_floor,
            });
        }

        if !html.contains(&self.card_marker) {
            return Some(BlockReason::MissingCardMarker);
        }

        let lowered = html.to_lowercase();
        self.phrases
            .iter()
            .find(|phrase| lowered.contains(phrase.as_str()))
            .map(|phrase| BlockReason::Phrase(phrase.clone()))
    }

    /// Number of card markers in the raw markup.
    pub fn card_count(&self, html: &str) -> usize {
        if self.card_marker.is_empty() {
            return 0;
        }
        html.matches(&self.card_marker).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(body: &str) -> String {
        format!(
            "<html><body>{}<!-- {} --></body></html>",
            body,
            "x".repeat(50_000)
        )
    }

    #[test]
    fn test_short_page_is_blocked() {
        let detector = BlockDetector::new(&BlockConfig::default());
        let html = r#"<div data-cy="l-card">card</div>"#;
        assert_eq!(
            detector.classify(html),
            Some(BlockReason::TooSmall {
                len: html.chars().count(),
                floor: 50_000
            })
        );
    }

    #[test]
    fn test_size_is_counted_in_characters() {
        let config = BlockConfig {
            size_floor: 10,
            ..Default::default()
        };
        let detector = BlockDetector::new(&config);
        // 9 characters, 18 bytes
        assert!(matches!(
            detector.classify("жжжжжжжжж"),
            Some(BlockReason::TooSmall { len: 9, .. })
        ));
    }

    #[test]
    fn test_page_without_cards_is_blocked() {
        let detector = BlockDetector::new(&BlockConfig::default());
        let html = padded("<p>Нічого не знайдено</p>");
        assert_eq!(detector.classify(&html), Some(BlockReason::MissingCardMarker));
    }

    #[test]
    fn test_blocking_phrase_is_case_insensitive() {
        let detector = BlockDetector::new(&BlockConfig::default());
        let html = padded(r#"<div data-cy="l-card"></div><h1>Access Denied</h1>"#);
        assert_eq!(
            detector.classify(&html),
            Some(BlockReason::Phrase("access denied".to_string()))
        );
    }

    #[test]
    fn test_size_rule_wins_over_phrase() {
        let detector = BlockDetector::new(&BlockConfig::default());
        let html = "<h1>Please verify you are a human</h1>";
        assert!(matches!(
            detector.classify(html),
            Some(BlockReason::TooSmall { .. })
        ));
    }

    #[test]
    fn test_well_formed_page_is_not_blocked() {
        let detector = BlockDetector::new(&BlockConfig::default());
        let html = padded(r#"<div data-cy="l-card">a</div><div data-cy="l-card">b</div>"#);
        assert_eq!(detector.classify(&html), None);
        assert_eq!(detector.card_count(&html), 2);
    }
}
