//! Decoding of the string-escaped state payload embedded in detail pages.
//!
//! The page assigns a JSON document to a global as a *string literal*, so the
//! payload must be decoded twice: once to undo the literal's escaping, then
//! once more as JSON.

use regex::Regex;
use serde::Deserialize;

use super::ExtractError;

/// Failure at one of the two decode stages.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("state payload not present")]
    Missing,
    #[error("failed to unescape state literal: {0}")]
    Unescape(#[source] serde_json::Error),
    #[error("failed to parse state JSON: {0}")]
    Json(#[source] serde_json::Error),
}

/// Fields recovered from the state payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePayload {
    pub author: Option<String>,
    pub district: Option<String>,
    /// Attribute rows in page order.
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Default, Deserialize)]
struct PrerenderedState {
    #[serde(default)]
    ad: AdEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct AdEnvelope {
    #[serde(default)]
    ad: Option<AdState>,
}

#[derive(Debug, Default, Deserialize)]
struct AdState {
    #[serde(default)]
    user: Option<UserState>,
    #[serde(default)]
    params: Vec<ParamState>,
    #[serde(default)]
    location: Option<LocationState>,
}

#[derive(Debug, Deserialize)]
struct UserState {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParamState {
    name: Option<String>,
    value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LocationState {
    district: Option<NamedState>,
}

#[derive(Debug, Deserialize)]
struct NamedState {
    name: Option<String>,
}

/// Build the pattern that captures the escaped literal assigned to `variable`.
pub fn state_pattern(variable: &str) -> Result<Regex, ExtractError> {
    let pattern = format!(r#"(?s)window\.{}\s*=\s*"(.+?)";"#, regex::escape(variable));
    Ok(Regex::new(&pattern)?)
}

/// Stage one: undo the string-literal escaping.
pub fn unescape_literal(raw: &str) -> Result<String, PayloadError> {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).map_err(PayloadError::Unescape)
}

/// Run both decode stages on a page and map the result to typed fields.
pub fn decode_state_payload(html: &str, pattern: &Regex) -> Result<StatePayload, PayloadError> {
    let raw = pattern
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or(PayloadError::Missing)?;

    let json = unescape_literal(raw.as_str())?;
    let state: PrerenderedState = serde_json::from_str(&json).map_err(PayloadError::Json)?;
    let ad = state.ad.ad.unwrap_or_default();

    let params = ad
        .params
        .into_iter()
        .filter_map(|param| {
            let name = param.name.filter(|n| !n.trim().is_empty())?;
            let value = match param.value? {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => return None,
                other => other.to_string(),
            };
            if value.trim().is_empty() {
                None
            } else {
                Some((name, value))
            }
        })
        .collect();

    Ok(StatePayload {
        author: ad.user.and_then(|u| u.name).filter(|n| !n.is_empty()),
        district: ad
            .location
            .and_then(|l| l.district)
            .and_then(|d| d.name)
            .filter(|n| !n.is_empty()),
        params,
    })
}
