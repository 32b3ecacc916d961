//! Input hygiene: defaults and cleanup applied regardless of how sloppy the
//! source scraper was (spec §4.2, "Hygiene").

use chrono::Utc;
use rand::Rng;
use std::collections::BTreeSet;

/// Default title when a scraper didn't supply one.
pub const DEFAULT_TITLE: &str = "Untitled Listing";

/// `title` defaults to `"Untitled Listing"` when absent or blank.
pub fn hygiene_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_owned(),
        _ => DEFAULT_TITLE.to_owned(),
    }
}

/// `source_url` defaults to a synthetic, globally-unique value so the
/// uniqueness invariant (spec §3, invariant 1) is never violated by a
/// scraper that forgot to send one.
pub fn hygiene_source_url(source_url: Option<&str>) -> String {
    match source_url.map(str::trim) {
        Some(url) if !url.is_empty() => url.to_owned(),
        _ => synthetic_source_url(),
    }
}

fn synthetic_source_url() -> String {
    let timestamp = Utc::now().timestamp_millis();
    let random: u64 = rand::thread_rng().gen();
    format!("missing_url_{}_{:x}", timestamp, random)
}

/// Amenities are stored as a set: a scalar string is comma-split and
/// trimmed, empty elements are dropped, and order is not significant (spec
/// §3, §4.2). We return a sorted `Vec` so callers get a deterministic order
/// without needing to know it's backed by a set.
pub fn hygiene_amenities(items: Vec<String>) -> Vec<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for item in items {
        for part in item.split(',') {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                set.insert(trimmed.to_lowercase());
            }
        }
    }
    set.into_iter().collect()
}

/// `property_type` is trimmed; empty becomes absent.
pub fn hygiene_property_type(property_type: Option<&str>) -> Option<String> {
    property_type
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

/// `images` is coerced to an ordered sequence of strings, dropping blanks
/// but preserving source order and duplicates (images are not a set).
pub fn hygiene_images(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_defaults_when_missing_or_blank() {
        assert_eq!(hygiene_title(None), DEFAULT_TITLE);
        assert_eq!(hygiene_title(Some("   ")), DEFAULT_TITLE);
        assert_eq!(hygiene_title(Some("Sunny 2BR")), "Sunny 2BR");
    }

    #[test]
    fn source_url_synthesizes_when_missing() {
        let a = hygiene_source_url(None);
        let b = hygiene_source_url(None);
        assert!(a.starts_with("missing_url_"));
        assert_ne!(a, b, "synthetic URLs must be unique");
    }

    #[test]
    fn amenities_comma_splits_and_drops_empty() {
        let amenities = hygiene_amenities(vec!["Pool, Gym, ,".to_owned()]);
        assert_eq!(amenities, vec!["gym".to_owned(), "pool".to_owned()]);
    }

    #[test]
    fn amenities_dedupes_across_inputs() {
        let amenities =
            hygiene_amenities(vec!["Pool".to_owned(), "pool".to_owned(), "Gym".to_owned()]);
        assert_eq!(amenities, vec!["gym".to_owned(), "pool".to_owned()]);
    }

    #[test]
    fn empty_property_type_is_absent() {
        assert_eq!(hygiene_property_type(Some("   ")), None);
        assert_eq!(hygiene_property_type(Some("Condo")), Some("condo".to_owned()));
    }

    #[test]
    fn images_preserve_order_and_drop_blanks() {
        let images = hygiene_images(vec!["a.jpg".to_owned(), "  ".to_owned(), "b.jpg".to_owned()]);
        assert_eq!(images, vec!["a.jpg".to_owned(), "b.jpg".to_owned()]);
    }
}
