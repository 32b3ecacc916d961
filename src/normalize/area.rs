//! Area parsing and conversion to square feet (spec §4.2, "Area parsing").

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9.]+").unwrap());

/// A recognized area unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AreaUnit {
    Sqft,
    Sqm,
    Acres,
}

impl AreaUnit {
    pub fn label(&self) -> &'static str {
        match self {
            AreaUnit::Sqft => "sqft",
            AreaUnit::Sqm => "m\u{b2}",
            AreaUnit::Acres => "acres",
        }
    }

    /// Conversion factor to square feet (spec §4.2).
    fn sqft_factor(&self) -> Decimal {
        match self {
            AreaUnit::Sqft => Decimal::from(1),
            AreaUnit::Sqm => Decimal::from_str("10.7639").unwrap(),
            AreaUnit::Acres => Decimal::from(43560),
        }
    }
}

/// Tokens recognized for each unit, checked against the lowercased text.
/// Longer/more specific tokens are listed first so e.g. `sq.ft` doesn't get
/// mis-split by a shorter token first.
const SQFT_TOKENS: &[&str] = &["sq.ft", "sqft", "ft2"];
const SQM_TOKENS: &[&str] = &["m\u{b2}", "sqm", "m2"];
const ACRE_TOKENS: &[&str] = &["acres", "acre"];

fn detect_unit(lower: &str) -> Option<AreaUnit> {
    for token in SQFT_TOKENS {
        if lower.contains(token) {
            return Some(AreaUnit::Sqft);
        }
    }
    for token in SQM_TOKENS {
        if lower.contains(token) {
            return Some(AreaUnit::Sqm);
        }
    }
    for token in ACRE_TOKENS {
        if lower.contains(token) {
            return Some(AreaUnit::Acres);
        }
    }
    None
}

/// The result of parsing a free-text area string.
#[derive(Clone, Copy, Debug)]
pub struct ParsedArea {
    pub value: Option<Decimal>,
    pub unit: Option<AreaUnit>,
}

/// Parse a free-form area string per spec §4.2.
pub fn parse_area(text: &str) -> ParsedArea {
    let lower = text.to_ascii_lowercase();
    let unit = detect_unit(&lower);

    let mut stripped = lower;
    for token in SQFT_TOKENS.iter().chain(SQM_TOKENS).chain(ACRE_TOKENS) {
        stripped = stripped.replace(token, "");
    }
    let stripped = stripped.replace(',', "");

    let value = DIGITS
        .find(&stripped)
        .and_then(|m| Decimal::from_str(m.as_str()).ok());

    ParsedArea { value, unit }
}

/// Convert `value` in `unit` to square feet.
pub fn convert_to_sqft(value: Option<Decimal>, unit: Option<AreaUnit>) -> Option<Decimal> {
    match (value, unit) {
        (Some(value), Some(unit)) => Some(value * unit.sqft_factor()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sqft_variants() {
        assert_eq!(parse_area("900 sqft").unit, Some(AreaUnit::Sqft));
        assert_eq!(parse_area("900 sq.ft").unit, Some(AreaUnit::Sqft));
        assert_eq!(parse_area("900 ft2").unit, Some(AreaUnit::Sqft));
    }

    #[test]
    fn detects_sqm_variants() {
        assert_eq!(parse_area("84 m\u{b2}").unit, Some(AreaUnit::Sqm));
        assert_eq!(parse_area("84 sqm").unit, Some(AreaUnit::Sqm));
        assert_eq!(parse_area("84 m2").unit, Some(AreaUnit::Sqm));
    }

    #[test]
    fn acre_conversion_matches_spec_roundtrip_law() {
        let parsed = parse_area("1 acres");
        assert_eq!(
            convert_to_sqft(parsed.value, parsed.unit),
            Some(Decimal::from(43560))
        );
    }

    #[test]
    fn strips_thousands_separators() {
        let parsed = parse_area("1,200 sqft");
        assert_eq!(parsed.value, Some(Decimal::from(1200)));
    }

    #[test]
    fn unknown_unit_is_absent() {
        let parsed = parse_area("900 hectares");
        assert_eq!(parsed.unit, None);
    }
}
