//! Date coercion (spec §4.2, "Dates").

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Formats we'll accept for a source-provided `date_posted`, tried in
/// order. Scrapers vary wildly in what they hand us, so we accept a small,
/// explicit set of common shapes rather than a single format.
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y"];
const NAIVE_DATETIME_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a source-provided `date_posted` string. Returns the value coerced
/// to ISO-8601 UTC, or `None` if it doesn't parse as a date at all (spec
/// §4.2: "If the raw `date_posted` parses as a date, emit ISO-8601 UTC;
/// otherwise absent").
pub fn parse_date_posted(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }

    for format in NAIVE_DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, format) {
            let datetime = parsed.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&datetime));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn parses_rfc3339() {
        let parsed = parse_date_posted("2024-03-05T12:00:00Z").unwrap();
        assert_eq!(parsed.year(), 2024);
    }

    #[test]
    fn parses_iso_date_only() {
        let parsed = parse_date_posted("2024-03-05").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 3, 5));
    }

    #[test]
    fn parses_us_style_date() {
        let parsed = parse_date_posted("03/05/2024").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 3, 5));
    }

    #[test]
    fn unparseable_text_is_absent() {
        assert_eq!(parse_date_posted("a few days ago"), None);
        assert_eq!(parse_date_posted(""), None);
    }
}
