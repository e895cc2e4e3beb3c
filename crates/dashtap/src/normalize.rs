//! Locale-tolerant conversion of raw payload values to integers.
//!
//! Dashboards render numbers with either `.` or `,` as the thousands
//! separator, wrap them in currency or percent decoration, and abbreviate
//! thousands with a suffix ("49,2 mil"). Everything here is pure; callers
//! decide what to do with a [`NormalizationError`].

use crate::error::NormalizationError;
use crate::types::RawValue;

/// Characters stripped before any separator analysis.
const DECORATION: &[char] = &['(', ')', '%', '$', '€', '£'];

/// Suffixes meaning "×1000", checked against the lower-cased text.
const THOUSANDS_SUFFIXES: &[&str] = &["mil", "k"];

/// Distance under which a scaled value is snapped to the nearest integer,
/// so `4,1 mil` is 4100 and not 4099.
const SNAP_EPSILON: f64 = 1e-6;

/// Normalize any raw value to an integer by truncation.
pub fn normalize(value: &RawValue) -> Result<i64, NormalizationError> {
    match value {
        RawValue::Int(i) => Ok(*i),
        RawValue::Float(x) => truncate(*x).ok_or_else(|| NormalizationError::new(x.to_string())),
        RawValue::Text(s) => normalize_text(s),
    }
}

/// Normalize a locale-formatted numeric string.
pub fn normalize_text(raw: &str) -> Result<i64, NormalizationError> {
    let fail = || NormalizationError::new(raw);

    let cleaned = raw
        .chars()
        .filter(|c| !DECORATION.contains(c))
        .collect::<String>()
        .trim()
        .to_lowercase();

    if let Some(head) = strip_thousands_suffix(&cleaned) {
        let value = parse_float(&resolve_separators(head)).ok_or_else(fail)?;
        return truncate(snap(value * 1000.0)).ok_or_else(fail);
    }

    let value = parse_float(&resolve_separators(&cleaned)).ok_or_else(fail)?;
    truncate(value).ok_or_else(fail)
}

fn strip_thousands_suffix(text: &str) -> Option<&str> {
    THOUSANDS_SUFFIXES
        .iter()
        .find_map(|suffix| text.strip_suffix(suffix))
        .map(str::trim_end)
}

/// Rewrite `text` so that `.` is the only decimal mark and no grouping remains,
/// then keep only digits, `.` and `-`.
fn resolve_separators(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    let unified = match (compact.find('.'), compact.find(',')) {
        // The earlier separator groups thousands, the later one is the decimal mark.
        (Some(dot), Some(comma)) if dot < comma => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(_), None) => resolve_lone_separator(&compact, '.'),
        (None, Some(_)) => resolve_lone_separator(&compact, ','),
        (None, None) => compact,
    };

    unified
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// One kind of separator present. Repeated, or a single one followed by
/// exactly three digits, means grouping; otherwise it is the decimal mark.
fn resolve_lone_separator(text: &str, sep: char) -> String {
    if text.matches(sep).count() > 1 {
        return text.replace(sep, "");
    }

    let Some(pos) = text.find(sep) else {
        return text.to_string();
    };
    let digits_after = text[pos + sep.len_utf8()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();

    if digits_after == 3 {
        text.replace(sep, "")
    } else {
        text.replace(sep, ".")
    }
}

fn parse_float(digits: &str) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok()
}

/// Undo binary float error introduced by scaling a decimal.
fn snap(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        value
    }
}

/// Drop the fractional part; `None` for non-finite or out-of-range values.
fn truncate(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let whole = value.trunc();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    Some(whole as i64)
}
