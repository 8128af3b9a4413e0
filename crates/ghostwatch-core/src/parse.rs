//! Parsing for the abbreviated counts the profile UI renders (`1,234`, `12.5K`, `3M`).

use std::sync::LazyLock;

use regex::Regex;

static COUNT_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*([km])?\b").expect("count pattern compiles")
});

/// Parses a single count token.
///
/// Accepts thousands separators (`1,234`), and `K`/`M` suffixes in either
/// case (`1.2k`, `3M`). Returns `None` for anything else, including negative
/// or empty input.
#[must_use]
pub fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    let (number, multiplier) = match cleaned.chars().last() {
        Some('k' | 'K') => (&cleaned[..cleaned.len() - 1], 1_000.0),
        Some('m' | 'M') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };

    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (value * multiplier).round() as u64;
    Some(count)
}

/// Finds the first count embedded in free text such as a dialog title
/// (`"1,204 followers"`, `"Followers 12.5K"`).
#[must_use]
pub fn find_count_in_text(text: &str) -> Option<u64> {
    let caps = COUNT_IN_TEXT.captures(text)?;
    let number = caps.get(1)?.as_str();
    let suffix = caps.get(2).map_or("", |m| m.as_str());
    parse_count(&format!("{number}{suffix}"))
}
