//! Field normalization before comparison.
//!
//! Database columns are read as text while the index holds whatever the
//! indexer produced, so the same value can differ in representation:
//! - Text: CRLF vs LF, HTML entities, surrounding whitespace
//! - Keyword: surrounding whitespace
//! - DateTime: `2024-01-02 03:04:05` vs `2024-01-02T03:04:05Z`, zero dates
//! - Integer: `"42"` vs `42` vs `42.0`
//!
//! Every normalizer maps NULL and blank values to `None`, so a NULL column
//! matches an absent or empty index field.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::core::{FieldKind, FieldValue};

/// Canonical datetime layout, to the second.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Canonical form of a value, `None` for NULL or blank.
pub fn normalize(kind: FieldKind, value: &FieldValue) -> Option<String> {
    match kind {
        FieldKind::Text => normalize_text(value),
        FieldKind::Keyword => normalize_keyword(value),
        FieldKind::DateTime => normalize_datetime(value),
        FieldKind::Integer => normalize_integer(value),
    }
}

/// Whether two values are equal after normalization.
pub fn values_match(kind: FieldKind, primary: &FieldValue, index: &FieldValue) -> bool {
    normalize(kind, primary) == normalize(kind, index)
}

fn non_blank(value: &FieldValue) -> Option<String> {
    value.as_text().filter(|text| !text.trim().is_empty())
}

fn normalize_text(value: &FieldValue) -> Option<String> {
    let text = non_blank(value)?;
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let decoded = decode_entities(&text);
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_keyword(value: &FieldValue) -> Option<String> {
    non_blank(value).map(|text| text.trim().to_string())
}

fn normalize_datetime(value: &FieldValue) -> Option<String> {
    let text = non_blank(value)?;
    let text = text.trim();

    // MySQL zero dates mean "no date".
    if text.starts_with("0000-00-00") {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc().format(DATETIME_FORMAT).to_string());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.format(DATETIME_FORMAT).to_string());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Some(midnight.format(DATETIME_FORMAT).to_string());
        }
    }

    Some(text.to_string())
}

fn normalize_integer(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Null => None,
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some((*f as i64).to_string()),
        other => {
            let text = non_blank(other)?;
            let text = text.trim();
            if let Ok(i) = text.parse::<i64>() {
                return Some(i.to_string());
            }
            match text.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f.is_finite() => Some((f as i64).to_string()),
                _ => Some(text.to_string()),
            }
        }
    }
}

/// Decode the named and numeric HTML entities WordPress stores in titles.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        match candidate.find(';').filter(|end| *end <= 10) {
            Some(end) => match decode_entity(&candidate[1..end]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &candidate[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &candidate[1..];
                }
            },
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn test_text_normalization() {
        assert_eq!(
            normalize(FieldKind::Text, &text("  Fish &amp; Chips\r\n")),
            Some("Fish & Chips".to_string())
        );
        assert_eq!(
            normalize(FieldKind::Text, &text("It&#8217;s &#x41;")),
            Some("It\u{2019}s A".to_string())
        );
        assert_eq!(
            normalize(FieldKind::Text, &text("AT&T rocks")),
            Some("AT&T rocks".to_string())
        );
    }

    #[test]
    fn test_blank_matches_null() {
        for kind in [FieldKind::Text, FieldKind::Keyword, FieldKind::DateTime, FieldKind::Integer] {
            assert!(values_match(kind, &text("   "), &FieldValue::Null), "{:?}", kind);
        }
    }

    #[test]
    fn test_keyword_is_case_sensitive() {
        assert!(values_match(FieldKind::Keyword, &text("publish "), &text("publish")));
        assert!(!values_match(FieldKind::Keyword, &text("Publish"), &text("publish")));
    }

    #[test]
    fn test_datetime_layouts() {
        let expected = Some("2024-01-02T03:04:05".to_string());
        assert_eq!(normalize(FieldKind::DateTime, &text("2024-01-02 03:04:05")), expected);
        assert_eq!(normalize(FieldKind::DateTime, &text("2024-01-02T03:04:05")), expected);
        assert_eq!(normalize(FieldKind::DateTime, &text("2024-01-02T03:04:05Z")), expected);
        assert_eq!(normalize(FieldKind::DateTime, &text("2024-01-02T05:04:05+02:00")), expected);
        assert_eq!(normalize(FieldKind::DateTime, &text("2024-01-02 03:04:05.250")), expected);
        assert_eq!(
            normalize(FieldKind::DateTime, &text("2024-01-02")),
            Some("2024-01-02T00:00:00".to_string())
        );
    }

    #[test]
    fn test_zero_date_is_null() {
        assert!(values_match(
            FieldKind::DateTime,
            &text("0000-00-00 00:00:00"),
            &FieldValue::Null
        ));
    }

    #[test]
    fn test_unparseable_datetime_kept_verbatim() {
        assert_eq!(
            normalize(FieldKind::DateTime, &text(" yesterday ")),
            Some("yesterday".to_string())
        );
    }

    #[test]
    fn test_integer_forms_match() {
        assert!(values_match(FieldKind::Integer, &text("42"), &FieldValue::Integer(42)));
        assert!(values_match(FieldKind::Integer, &text("42"), &FieldValue::Float(42.0)));
        assert!(values_match(FieldKind::Integer, &text(" 007 "), &FieldValue::Integer(7)));
        assert!(!values_match(FieldKind::Integer, &text("42"), &FieldValue::Integer(43)));
    }
}
