//! Scalar attribute parsing.
//!
//! Every function here takes an element and an attribute name and returns a
//! typed value or an [`AttrError`]. Fallback policy is the caller's job;
//! nothing in this module invents a domain default.

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;

use crate::xml::Element;

/// ISO 8601 duration subset: no negative values, no week component.
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:([0-9]*)Y)?(?:([0-9]*)M)?(?:([0-9]*)D)?(?:T(?:([0-9]*)H)?(?:([0-9]*)M)?(?:([0-9.]*)S)?)?$")
        .unwrap()
});

static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)-([0-9]+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttrError {
    #[error("attribute `{name}` is missing")]
    Missing { name: String },

    #[error("attribute `{name}` is not a valid {expected}: `{value}`")]
    Invalid {
        name: String,
        value: String,
        expected: &'static str,
    },
}

/// An inclusive byte range, e.g. parsed from `indexRange="0-1000"`.
///
/// `begin <= end` is a convention of the format, not something this codec
/// enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub begin: u64,
    pub end: u64,
}

fn raw<'a>(elem: &'a Element, name: &str) -> Result<&'a str, AttrError> {
    elem.attr(name).ok_or_else(|| AttrError::Missing {
        name: name.to_string(),
    })
}

fn invalid(name: &str, value: &str, expected: &'static str) -> AttrError {
    AttrError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// Returns the attribute verbatim.
pub fn string(elem: &Element, name: &str) -> Result<String, AttrError> {
    raw(elem, name).map(str::to_string)
}

/// Parses an XML duration string (e.g. `PT1H3M43.2S`) into whole seconds.
///
/// Years and months are treated as exactly 365 and 30 days; empty components
/// count as zero; fractional seconds are truncated toward zero.
pub fn duration_secs(elem: &Element, name: &str) -> Result<u64, AttrError> {
    let value = raw(elem, name)?;
    let captures = DURATION_RE
        .captures(value)
        .ok_or_else(|| invalid(name, value, "duration"))?;

    let component = |index: usize| -> Result<u64, AttrError> {
        match captures.get(index) {
            Some(m) if !m.as_str().is_empty() => m
                .as_str()
                .parse::<u64>()
                .map_err(|_| invalid(name, value, "duration")),
            _ => Ok(0),
        }
    };

    // A value that fits the pattern can still overflow the sum; that is an
    // invalid duration, not a panic.
    let mut seconds = 0u64;
    for (index, scale) in [
        (1, 60 * 60 * 24 * 365),
        (2, 60 * 60 * 24 * 30),
        (3, 60 * 60 * 24),
        (4, 60 * 60),
        (5, 60),
    ] {
        let term = component(index)?
            .checked_mul(scale)
            .ok_or_else(|| invalid(name, value, "duration"))?;
        seconds = seconds
            .checked_add(term)
            .ok_or_else(|| invalid(name, value, "duration"))?;
    }

    if let Some(m) = captures.get(6)
        && !m.as_str().is_empty()
    {
        let fractional = m
            .as_str()
            .parse::<f64>()
            .map_err(|_| invalid(name, value, "duration"))?;
        seconds = seconds
            .checked_add(fractional.trunc() as u64)
            .ok_or_else(|| invalid(name, value, "duration"))?;
    }

    Ok(seconds)
}

/// Parses a UTC date-time string into signed seconds since the epoch.
pub fn date_secs(elem: &Element, name: &str) -> Result<i64, AttrError> {
    let value = raw(elem, name)?;
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .map_err(|_| invalid(name, value, "date-time"))
}

/// Parses a `"begin-end"` byte range string.
pub fn byte_range(elem: &Element, name: &str) -> Result<ByteRange, AttrError> {
    let value = raw(elem, name)?;
    let captures = RANGE_RE
        .captures(value)
        .ok_or_else(|| invalid(name, value, "byte range"))?;

    let parse = |index: usize| -> Result<u64, AttrError> {
        captures[index]
            .parse::<u64>()
            .map_err(|_| invalid(name, value, "byte range"))
    };

    Ok(ByteRange {
        begin: parse(1)?,
        end: parse(2)?,
    })
}

/// Parses a strictly positive integer.
pub fn positive_u64(elem: &Element, name: &str) -> Result<u64, AttrError> {
    let value = raw(elem, name)?;
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(invalid(name, value, "positive integer")),
    }
}

/// Parses a non-negative integer.
pub fn non_negative_u64(elem: &Element, name: &str) -> Result<u64, AttrError> {
    let value = raw(elem, name)?;
    value
        .parse::<u64>()
        .map_err(|_| invalid(name, value, "non-negative integer"))
}

/// Parses a strictly positive integer that must fit in 32 bits
/// (pixel dimensions and the like).
pub fn positive_u32(elem: &Element, name: &str) -> Result<u32, AttrError> {
    let value = raw(elem, name)?;
    match value.parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(invalid(name, value, "positive integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn element(xml: &str) -> Element {
        parse_document(xml).unwrap()
    }

    #[test]
    fn duration_hours_minutes_seconds() {
        let root = element(r#"<Root duration="PT2H12M52S"/>"#);
        assert_eq!(duration_secs(&root, "duration"), Ok(7972));
    }

    #[test]
    fn duration_full_form_and_fractions() {
        let root = element(r#"<Root a="P1Y2M3DT4H5M6.9S" b="PT0.5S" c="P"/>"#);
        let expected =
            365 * 86400 + 2 * 30 * 86400 + 3 * 86400 + 4 * 3600 + 5 * 60 + 6;
        assert_eq!(duration_secs(&root, "a"), Ok(expected));
        assert_eq!(duration_secs(&root, "b"), Ok(0));
        assert_eq!(duration_secs(&root, "c"), Ok(0));
    }

    #[test]
    fn duration_rejects_garbage_and_absence() {
        let root = element(r#"<Root bad="1H3M" worse="PT-1S"/>"#);
        assert!(duration_secs(&root, "bad").is_err());
        assert!(duration_secs(&root, "worse").is_err());
        assert!(matches!(
            duration_secs(&root, "missing"),
            Err(AttrError::Missing { .. })
        ));
    }

    #[test]
    fn duration_overflow_is_invalid() {
        let root = element(
            r#"<Root days="P18446744073709551615D" sum="P18446744073709551615DT1S"/>"#,
        );
        assert!(matches!(
            duration_secs(&root, "days"),
            Err(AttrError::Invalid { .. })
        ));
        assert!(matches!(
            duration_secs(&root, "sum"),
            Err(AttrError::Invalid { .. })
        ));
    }

    #[test]
    fn date_to_epoch_seconds() {
        let root = element(r#"<Root birthday="1984-10-21T05:00:00.000Z"/>"#);
        assert_eq!(date_secs(&root, "birthday"), Ok(467182800));
        assert!(date_secs(&root, "missing").is_err());
    }

    #[test]
    fn date_rejects_bad_format() {
        let root = element(r#"<Root when="october 21st"/>"#);
        assert!(date_secs(&root, "when").is_err());
    }

    #[test]
    fn byte_range_pair() {
        let root = element(r#"<Root range="0-1000" bad="1000"/>"#);
        assert_eq!(
            byte_range(&root, "range"),
            Ok(ByteRange { begin: 0, end: 1000 })
        );
        assert!(byte_range(&root, "bad").is_err());
        assert!(byte_range(&root, "missing").is_err());
    }

    #[test]
    fn integer_domains() {
        let root = element(r#"<Root meaning="42" freeze="-173" void="0"/>"#);
        assert_eq!(positive_u64(&root, "meaning"), Ok(42));
        assert!(positive_u64(&root, "void").is_err());
        assert!(positive_u64(&root, "freeze").is_err());

        assert_eq!(non_negative_u64(&root, "meaning"), Ok(42));
        assert_eq!(non_negative_u64(&root, "void"), Ok(0));
        assert!(non_negative_u64(&root, "freeze").is_err());

        assert_eq!(positive_u32(&root, "meaning"), Ok(42));
    }

    #[test]
    fn string_passthrough() {
        let root = element(r#"<Root monkey="business"/>"#);
        assert_eq!(string(&root, "monkey"), Ok("business".to_string()));
        assert!(string(&root, "monkey-bar").is_err());
    }
}
