//! Text fingerprints used as dedup keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which ad text the fingerprint is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintSource {
    #[default]
    Title,
    Description,
}

impl FingerprintSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
        }
    }
}

impl std::fmt::Display for FingerprintSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FingerprintSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "description" => Ok(Self::Description),
            _ => Err(format!(
                "Invalid fingerprint source '{}'. Valid options: title, description",
                s
            )),
        }
    }
}

/// Lowercase, drop whitespace, and keep only alphanumeric characters.
///
/// `char::is_alphanumeric` is Unicode-aware, so Cyrillic letters (including
/// і, ї, є, ґ) survive while punctuation and symbols are removed.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Hex SHA-256 of the normalized text, or `None` for empty text.
pub fn fingerprint(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    Some(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_case_space_and_punctuation() {
        assert_eq!(normalize_text("Продам 2-к Квартиру!"), "продам2кквартиру");
        assert_eq!(normalize_text("Їжак, ґанок; Єва"), "їжакґанокєва");
    }

    #[test]
    fn test_fingerprint_is_case_and_whitespace_invariant() {
        assert_eq!(
            fingerprint("Продам Квартиру"),
            fingerprint("продам  квартиру")
        );
        assert_eq!(
            fingerprint("Продам Квартиру"),
            fingerprint("  ПРОДАМ\tквартиру\n")
        );
    }

    #[test]
    fn test_fingerprint_distinguishes_text() {
        assert_ne!(fingerprint("1-к квартира"), fingerprint("2-к квартира"));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint("abc").unwrap();
        // sha256("abc")
        assert_eq!(
            fp,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_text_has_no_fingerprint() {
        assert_eq!(fingerprint(""), None);
        assert_eq!(fingerprint("   "), None);
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("Title".parse(), Ok(FingerprintSource::Title));
        assert_eq!(
            "description".parse::<FingerprintSource>().ok(),
            Some(FingerprintSource::Description)
        );
        assert!("body".parse::<FingerprintSource>().is_err());
    }
}
