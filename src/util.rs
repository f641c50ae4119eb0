// Utility helpers for text cleanup, number parsing and formatting.
//
// Survey exports are hand-edited spreadsheets, so every module goes through
// these helpers instead of trusting raw CSV cells.
use num_format::{Locale, ToFormattedString};

/// Values that spreadsheet tooling writes for "no answer".
const NULL_SENTINELS: [&str; 2] = ["nan", "none"];

/// `true` for blank cells and the textual null markers (`nan`, `none`),
/// compared case-insensitively after trimming.
pub fn is_null_like(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || NULL_SENTINELS.iter().any(|n| t.eq_ignore_ascii_case(n))
}

/// Trim and collapse internal whitespace runs (spaces, tabs, newlines) to a
/// single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean a raw cell: `None` for null-like values, otherwise the
/// whitespace-collapsed text.
pub fn clean_cell(s: &str) -> Option<String> {
    if is_null_like(s) {
        None
    } else {
        Some(collapse_whitespace(s))
    }
}

/// Normalize a period value so that `"2026.0"` and `"2026"` compare equal.
///
/// Only whole-number floats made of digits and dots are collapsed to their
/// integer form. Anything else (`"2025.7"`, `"1.2.3"`, `"FY2024"`) is returned
/// trimmed but otherwise untouched.
pub fn normalize_period(s: &str) -> String {
    let t = s.trim();
    if t.contains('.') && t.chars().all(|c| c.is_ascii_digit() || c == '.') {
        if let Ok(v) = t.parse::<f64>() {
            if v.is_finite() && v.fract() == 0.0 {
                return (v as i64).to_string();
            }
        }
    }
    t.to_string()
}

/// Parse a count-like cell. Accepts `"12"`, `"12.0"` and `"1,200"`; negative
/// or unparseable values yield `None`.
pub fn parse_count(s: Option<&str>) -> Option<usize> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let v: f64 = s.replace(',', "").parse().ok()?;
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    Some(v.round() as usize)
}

/// Round to a fixed number of decimals (half away from zero).
pub fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (v * factor).round() / factor
}

/// Percentage `part / whole * 100` rounded to one decimal, `0` for an empty
/// denominator.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

/// Title-case a label word by word.
///
/// - all-uppercase words of at most five characters are kept (acronyms such
///   as `ILO` or `UN`),
/// - slash-joined words are cased on each side (`guidance/tools` becomes
///   `Guidance/Tools`),
/// - every other word gets an uppercase first letter and lowercase rest.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            if word.contains('/') {
                word.split('/').map(title_word).collect::<Vec<_>>().join("/")
            } else {
                title_word(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_word(word: &str) -> String {
    if is_acronym(word) {
        return word.to_string();
    }
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    // Letters whose uppercase is several chars (`ß` -> `SS`) stay as they are,
    // otherwise a second pass would lowercase the tail of the expansion.
    let mut upper = first.to_uppercase();
    let head = match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => first,
    };
    std::iter::once(head).chain(chars.flat_map(char::to_lowercase)).collect()
}

fn is_acronym(word: &str) -> bool {
    word.chars().count() <= 5
        && word.chars().any(char::is_alphabetic)
        && !word.chars().any(char::is_lowercase)
}

/// Integer with `,` thousands separators.
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Rate as shown in tables: `50.0%`, `33.3%`.
pub fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate)
}
