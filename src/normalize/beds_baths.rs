//! Bedroom/bathroom count parsing (spec §4.2, "Bedrooms" / "Bathrooms").

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static STUDIO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)studio").unwrap());
static BEDROOMS_WITH_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(bed|br|bedroom)").unwrap());
static BARE_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static BATHROOMS_WITH_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9.]+)\s*(bath|ba|bathroom)").unwrap());
static BARE_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9.]+").unwrap());

/// Parse a bedroom count per spec §4.2. `"studio"` (any case) always wins
/// and yields `0`, matching the spec's fixed choice for Open Question (a).
pub fn parse_bedrooms(text: &str) -> Option<i32> {
    if STUDIO.is_match(text) {
        return Some(0);
    }
    if let Some(captures) = BEDROOMS_WITH_UNIT.captures(text) {
        return captures.get(1)?.as_str().parse().ok();
    }
    if let Some(matched) = BARE_INTEGER.find(text) {
        return matched.as_str().parse().ok();
    }
    None
}

/// Parse a bathroom count per spec §4.2. Half-steps (e.g. `2.5`) are
/// preserved.
pub fn parse_bathrooms(text: &str) -> Option<Decimal> {
    if let Some(captures) = BATHROOMS_WITH_UNIT.captures(text) {
        return Decimal::from_str(captures.get(1)?.as_str()).ok();
    }
    if let Some(matched) = BARE_DECIMAL.find(text) {
        return Decimal::from_str(matched.as_str()).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn studio_is_zero_bedrooms() {
        assert_eq!(parse_bedrooms("Studio"), Some(0));
        assert_eq!(parse_bedrooms("STUDIO apartment"), Some(0));
    }

    #[test]
    fn counts_beds_with_unit_word() {
        assert_eq!(parse_bedrooms("3 Beds"), Some(3));
        assert_eq!(parse_bedrooms("2br"), Some(2));
        assert_eq!(parse_bedrooms("4 bedroom house"), Some(4));
    }

    #[test]
    fn falls_back_to_bare_integer() {
        assert_eq!(parse_bedrooms("3"), Some(3));
    }

    #[test]
    fn bedrooms_absent_when_no_number() {
        assert_eq!(parse_bedrooms("spacious"), None);
    }

    #[test]
    fn parses_half_step_bathrooms() {
        assert_eq!(
            parse_bathrooms("1.5 Bathrooms"),
            Some(Decimal::from_str("1.5").unwrap())
        );
    }

    #[test]
    fn falls_back_to_bare_decimal_bathrooms() {
        assert_eq!(parse_bathrooms("2.5"), Some(Decimal::from_str("2.5").unwrap()));
    }
}
