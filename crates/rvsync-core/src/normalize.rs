//! Canonical comparison keys for person names, institutions and ports.
//!
//! Everything here is a pure function. Normalized keys are only ever used for
//! equality comparison; they are never written to the catalog as display data.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::defaults::INITIAL_MAX_LEN;

static INSTITUTION_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,.\-]").unwrap());

/// A person name split into the parts the catalog stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    /// The name exactly as given upstream.
    pub original: String,
    /// Comparison key, `"Last, First[ Second]"`.
    pub normalized: String,
    /// Effective first name (empty when the name has no given part).
    pub first: String,
    /// Family name.
    pub last: String,
}

/// Parse an upstream `"Last, First [Middle...]"` name.
///
/// Variants such as `"Smith, Craig R."` and `"Smith, Craig"` collapse onto the
/// same normalized key. A leading single-letter token (`"Doe, J. Robert"`) is
/// skipped in favour of the following token, and a short trailing token (two
/// characters or fewer) is treated as an initial and dropped.
pub fn parse_pi_name(full_name: &str) -> ParsedName {
    let whole = |normalized: &str, last: &str| ParsedName {
        original: full_name.to_string(),
        normalized: normalized.to_string(),
        first: String::new(),
        last: last.to_string(),
    };

    let Some((last_part, given_part)) = full_name.split_once(',') else {
        return whole(full_name, full_name);
    };

    let last = last_part.trim();
    let words: Vec<&str> = given_part.split_whitespace().collect();

    let (first, normalized) = match words.as_slice() {
        [] => return whole(last, last),
        [only] => (*only, format!("{last}, {only}")),
        [lead, second, ..] if is_single_letter(lead) => (*second, format!("{last}, {second}")),
        [lead, second, ..] if is_initial(second, INITIAL_MAX_LEN) => {
            (*lead, format!("{last}, {lead}"))
        }
        [lead, second, ..] => (*lead, format!("{last}, {lead} {second}")),
    };

    ParsedName {
        original: full_name.to_string(),
        normalized,
        first: first.to_string(),
        last: last.to_string(),
    }
}

/// True when the token, ignoring trailing periods, has at most `max` characters.
fn is_initial(token: &str, max: usize) -> bool {
    token.trim_end_matches('.').chars().count() <= max
}

fn is_single_letter(token: &str) -> bool {
    token.trim_end_matches('.').chars().count() == 1
}

/// Institution comparison key.
///
/// Lower-cases, expands `&` to `and`, replaces commas, periods and hyphens
/// with spaces and collapses whitespace, so `"Texas A&M"` and
/// `"Texas A and M"` compare equal.
pub fn normalize_institution(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let lowered = name.to_lowercase().replace('&', " and ");
    let stripped = INSTITUTION_PUNCT.replace_all(&lowered, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Qualify an upstream port name with its country code.
///
/// `"San Diego, California"` with code `usa` becomes
/// `"San Diego, California, USA"`. Without a known code the name is returned
/// unchanged, and a name already ending in `", CODE"` is never suffixed twice.
pub fn normalize_port_name(port_name: &str, country_code: Option<&str>) -> String {
    let code = match country_code.map(str::trim) {
        Some(code) if !code.is_empty() && !port_name.is_empty() => code.to_uppercase(),
        _ => return port_name.to_string(),
    };

    let suffix = format!(", {code}");
    if port_name.ends_with(&suffix) {
        return port_name.to_string();
    }
    format!("{port_name}{suffix}")
}

/// Split a qualified port display name into `(base, suffix)` at its last
/// `", "` separator.
pub fn split_port_suffix(display_name: &str) -> Option<(&str, &str)> {
    display_name.rsplit_once(", ")
}
