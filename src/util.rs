// Utility helpers for coercing dirty scalar values.
//
// This module centralizes all the "dirty" number/date handling so the
// rest of the code can assume clean, typed values. Coercion never
// returns an error: a value either resolves to a number, to an explicit
// zero (sentinel words like "FREE"), or to `Missing`.
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use serde_json::Value;

/// Sentinel words that mean "present but worth nothing" rather than
/// "absent". Compared case-insensitively after cleaning; the empty
/// string belongs to the set as well.
const ZERO_SENTINELS: [&str; 3] = ["FREE", "INVALID", "NONE"];

/// Outcome of coercing a raw scalar.
///
/// A three-way result on purpose: an explicit zero (a line marked FREE)
/// is a real value and keeps its row, while `Missing` means the field
/// cannot be trusted and the record is dropped. Collapsing the two into
/// one `Option` would lose that distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerced<T> {
    Value(T),
    Zero,
    Missing,
}

impl<T: Default> Coerced<T> {
    /// Resolve to a concrete number, mapping `Zero` to the numeric zero
    /// of `T` and `Missing` to `None`.
    pub fn resolve(self) -> Option<T> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Zero => Some(T::default()),
            Coerced::Missing => None,
        }
    }
}

/// Extract an integer identifier from a raw JSON scalar.
///
/// - An integer passes through unchanged.
/// - A float truncates toward zero.
/// - A string yields the first contiguous run of digits found anywhere
///   in the text (`"ORD-93b"` -> `93`).
/// - Anything else (bool, null, arrays, objects) yields `None`.
pub fn extract_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().map(|f| f as i64)
            }
        }
        Value::String(s) => {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<i64>().ok()
        }
        _ => None,
    }
}

/// Coerce a raw price into a float.
///
/// Text input is cleaned of the currency symbol `$` and thousands
/// separators before parsing; the sentinel words (and the empty string)
/// coerce to an explicit zero.
pub fn parse_price(raw: Option<&Value>) -> Coerced<f64> {
    let Some(value) = raw else {
        return Coerced::Missing;
    };
    match value {
        Value::Null => Coerced::Missing,
        Value::Number(n) => n.as_f64().map_or(Coerced::Missing, Coerced::Value),
        Value::String(s) => {
            let clean = s.replace('$', "").replace(',', "");
            let clean = clean.trim();
            if clean.is_empty() || ZERO_SENTINELS.contains(&clean.to_uppercase().as_str()) {
                return Coerced::Zero;
            }
            clean.parse::<f64>().map_or(Coerced::Missing, Coerced::Value)
        }
        _ => Coerced::Missing,
    }
}

/// Coerce a raw quantity into an integer. Same contract as
/// [`parse_price`], but integer-valued and without currency cleaning.
pub fn parse_quantity(raw: Option<&Value>) -> Coerced<i64> {
    let Some(value) = raw else {
        return Coerced::Missing;
    };
    match value {
        Value::Null => Coerced::Missing,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Coerced::Value(i)
            } else {
                // Fractional quantities truncate toward zero.
                n.as_f64().map_or(Coerced::Missing, |f| Coerced::Value(f as i64))
            }
        }
        Value::String(s) => {
            let clean = s.trim().to_uppercase();
            if clean.is_empty() || ZERO_SENTINELS.contains(&clean.as_str()) {
                return Coerced::Zero;
            }
            clean.parse::<i64>().map_or(Coerced::Missing, Coerced::Value)
        }
        _ => Coerced::Missing,
    }
}

// Formats tried in order when parsing a raw date string. RFC 3339 is
// handled separately because it carries an offset.
const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse a raw timestamp and reject implausible values.
///
/// Unparsable input, dates strictly after `now`, and dates before 1900
/// all resolve to `None` (never an error). Each rejection is logged with
/// `subject` so the offending record can be located.
pub fn sanitize_date(raw: &Value, now: NaiveDateTime, subject: &str) -> Option<NaiveDateTime> {
    let parsed = match raw {
        Value::String(s) => parse_datetime(s),
        _ => None,
    };
    let Some(dt) = parsed else {
        tracing::warn!(%subject, raw = %raw, "unparsable date, treating as missing");
        return None;
    };
    if dt > now {
        tracing::warn!(%subject, date = %dt, "date is in the future, treating as missing");
        return None;
    }
    if dt.year() < 1900 {
        tracing::warn!(%subject, date = %dt, "date is before 1900, treating as missing");
        return None;
    }
    Some(dt)
}

/// Treat a JSON null the same as an absent field.
pub fn present(field: Option<&Value>) -> Option<&Value> {
    match field {
        Some(Value::Null) | None => None,
        other => other,
    }
}

/// Render a raw scalar as display text (strings unquoted, everything
/// else via its JSON form). Used for names and for skip-log context.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Raw field rendering for skip records; absent fields become "".
pub fn raw_snippet(field: Option<&Value>) -> String {
    field.map(text_of).unwrap_or_default()
}

/// Round to 2 decimal places, the precision used for all emitted money
/// and percentage columns.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in the quality report
    // (e.g., `9,855 records`).
    n.to_formatted_string(&Locale::en)
}

pub fn format_pct(n: f64) -> String {
    format!("{:.2}%", n)
}
