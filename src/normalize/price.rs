//! Price parsing and USD conversion (spec §4.2, "Price parsing").

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9.]+").unwrap());
static PER_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/month|per month").unwrap());
static THOUSANDS_SEP: char = ',';

/// Currency codes/symbols we know how to detect, checked in this exact
/// order ("scanning for, in order, the symbols `$ € £` and the codes
/// `USD EUR CAD GBP`"). `Cad` is matched only by its three-letter code,
/// never by a symbol, since it shares the `$` glyph with USD.
const SYMBOL_ORDER: &[(&str, &str)] = &[("$", "USD"), ("€", "EUR"), ("£", "GBP")];
const CODE_ORDER: &[&str] = &["USD", "EUR", "CAD", "GBP"];

/// Known tokens to strip out before extracting digits.
const STRIP_TOKENS: &[&str] = &["$", "€", "£", "USD", "EUR", "CAD", "GBP"];

/// The result of parsing a free-text price string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParsedPrice {
    pub amount: Option<PriceAmount>,
    pub currency: Option<Currency>,
}

/// A parsed decimal amount. Wraps `Decimal` so this module can derive
/// `PartialEq`/`Eq` without pulling them onto every caller.
#[derive(Clone, Copy, Debug)]
pub struct PriceAmount(pub Decimal);

impl PartialEq for PriceAmount {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for PriceAmount {}

/// A recognized currency code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Currency {
    Usd,
    Eur,
    Cad,
    Gbp,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Cad => "CAD",
            Currency::Gbp => "GBP",
        }
    }

    fn from_code(code: &str) -> Option<Currency> {
        match code.to_ascii_uppercase().as_str() {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "CAD" => Some(Currency::Cad),
            "GBP" => Some(Currency::Gbp),
            _ => None,
        }
    }

    /// Fixed conversion rate to USD (spec §4.2).
    fn rate_to_usd(&self) -> Decimal {
        match self {
            Currency::Usd => Decimal::new(100, 2),
            Currency::Eur => Decimal::new(108, 2),
            Currency::Cad => Decimal::new(73, 2),
            Currency::Gbp => Decimal::new(126, 2),
        }
    }
}

/// Detect the currency in `text`, checking symbols then codes, in the fixed
/// priority order from spec §4.2. Case-insensitive for codes.
fn detect_currency(text: &str) -> Option<Currency> {
    for (symbol, code) in SYMBOL_ORDER {
        if text.contains(symbol) {
            return Currency::from_code(code);
        }
    }
    let upper = text.to_ascii_uppercase();
    for code in CODE_ORDER {
        if upper.contains(code) {
            return Currency::from_code(code);
        }
    }
    None
}

/// Strip known currency tokens, "/month" / "per month", and thousands
/// separators from `text`, leaving whitespace-trimmed remainder.
fn strip_known_tokens(text: &str) -> String {
    let mut cleaned = PER_MONTH.replace_all(text, "").into_owned();
    for token in STRIP_TOKENS {
        // Case-insensitive removal of each known token.
        cleaned = replace_case_insensitive(&cleaned, token);
    }
    cleaned = cleaned.replace(THOUSANDS_SEP, "");
    cleaned.trim().to_owned()
}

fn replace_case_insensitive(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return haystack.to_owned();
    }
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();
    let mut result = String::with_capacity(haystack.len());
    let mut start = 0;
    while let Some(relative) = lower_haystack[start..].find(&lower_needle) {
        let match_start = start + relative;
        let match_end = match_start + needle.len();
        result.push_str(&haystack[start..match_start]);
        start = match_end;
    }
    result.push_str(&haystack[start..]);
    result
}

/// Parse a free-form price string per spec §4.2.
pub fn parse_price(text: &str) -> ParsedPrice {
    let currency = detect_currency(text);
    let cleaned = strip_known_tokens(text);
    let amount = DIGITS
        .find(&cleaned)
        .and_then(|m| Decimal::from_str(m.as_str()).ok())
        .map(PriceAmount);

    ParsedPrice { amount, currency }
}

/// Convert `amount` in `currency` to USD, per the fixed rate table in spec
/// §4.2. Returns `None` if either input is missing.
pub fn convert_to_usd(amount: Option<Decimal>, currency: Option<Currency>) -> Option<Decimal> {
    match (amount, currency) {
        (Some(amount), Some(currency)) => Some(amount * currency.rate_to_usd()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dollar_amount_with_thousands_separator() {
        let parsed = parse_price("$1,500.50");
        assert_eq!(parsed.currency, Some(Currency::Usd));
        assert_eq!(
            parsed.amount.map(|a| a.0),
            Some(Decimal::from_str("1500.50").unwrap())
        );
    }

    #[test]
    fn convert_to_usd_is_identity_for_usd() {
        let amount = Decimal::from_str("1500.50").unwrap();
        assert_eq!(convert_to_usd(Some(amount), Some(Currency::Usd)), Some(amount));
    }

    #[test]
    fn strips_per_month_suffix() {
        let parsed = parse_price("$2,000/month");
        assert_eq!(parsed.currency, Some(Currency::Usd));
        assert_eq!(parsed.amount.map(|a| a.0), Some(Decimal::from_str("2000").unwrap()));
    }

    #[test]
    fn strips_per_month_phrase_case_insensitive() {
        let parsed = parse_price("1850 EUR Per Month");
        assert_eq!(parsed.currency, Some(Currency::Eur));
        assert_eq!(parsed.amount.map(|a| a.0), Some(Decimal::from_str("1850").unwrap()));
    }

    #[test]
    fn cad_is_matched_only_by_code_not_symbol() {
        let parsed = parse_price("$1,200 CAD");
        // `$` is scanned first and wins, per the fixed priority order.
        assert_eq!(parsed.currency, Some(Currency::Usd));

        let parsed = parse_price("1,200 CAD");
        assert_eq!(parsed.currency, Some(Currency::Cad));
    }

    #[test]
    fn unknown_currency_is_absent() {
        let parsed = parse_price("1200 zorkmids");
        assert_eq!(parsed.currency, None);
        assert_eq!(parsed.amount.map(|a| a.0), Some(Decimal::from_str("1200").unwrap()));
    }

    #[test]
    fn no_digits_means_amount_absent() {
        let parsed = parse_price("call for price");
        assert_eq!(parsed.amount, None);
    }

    #[test]
    fn missing_amount_or_currency_means_no_usd_conversion() {
        assert_eq!(convert_to_usd(None, Some(Currency::Usd)), None);
        assert_eq!(convert_to_usd(Some(Decimal::from(100)), None), None);
    }
}
