//! Normalization Engine (C2): pure conversion of a [`RawListingMessage`]
//! into a [`Listing`] ready for enrichment. Every submodule here is a pure
//! function over text with no I/O, so the engine as a whole is trivially
//! unit-testable (spec §4, §8).

pub mod area;
pub mod beds_baths;
pub mod dates;
pub mod hygiene;
pub mod price;

use crate::message::RawListingMessage;
use crate::model::{Listing, ListingStatus};
use chrono::Utc;

/// Normalize a raw queue message into a master listing record. This never
/// fails: every field has a defined fallback, per spec §4.2's "Hygiene"
/// rules, so a malformed or sparse message still produces a valid
/// [`Listing`] rather than an error. The only thing that can reject a
/// message upstream is invalid JSON (spec §4.1), which is caught before
/// this function is ever called.
pub fn normalize(raw: &RawListingMessage) -> Listing {
    let parsed_price = raw.price_text().map(price::parse_price).unwrap_or_default();
    let normalized_price_usd =
        price::convert_to_usd(parsed_price.amount.map(|a| a.0), parsed_price.currency);

    let parsed_area = raw
        .area_text()
        .map(area::parse_area)
        .unwrap_or(area::ParsedArea { value: None, unit: None });
    let normalized_area_sqft = area::convert_to_sqft(parsed_area.value, parsed_area.unit);

    let bedrooms = raw.bedrooms_text.as_deref().and_then(beds_baths::parse_bedrooms);
    let bathrooms = raw.bathrooms_text.as_deref().and_then(beds_baths::parse_bathrooms);

    let date_posted = raw.date_posted.as_deref().and_then(dates::parse_date_posted);

    let images = raw
        .images
        .clone()
        .map(|s| s.into_vec())
        .unwrap_or_default();
    let amenities = raw
        .amenities
        .clone()
        .map(|s| s.into_vec())
        .unwrap_or_default();

    Listing {
        id: None,
        source_url: hygiene::hygiene_source_url(raw.source_url.as_deref()),
        source_name: raw.source_name.clone().unwrap_or_default(),

        title: hygiene::hygiene_title(raw.title.as_deref()),
        description: raw.description.clone(),
        images: hygiene::hygiene_images(images),

        price_original_numeric: parsed_price.amount.map(|a| a.0),
        price_original_text: raw.price_text().map(ToOwned::to_owned),
        currency_original: parsed_price.currency.map(|c| c.code().to_owned()),
        normalized_price_usd,

        address_raw: raw.location_text().map(ToOwned::to_owned),
        location_text: raw.location_text().map(ToOwned::to_owned),
        latitude: None,
        longitude: None,
        geocoded_payload: None,

        bedrooms,
        bathrooms,
        area_value: parsed_area.value,
        area_unit: parsed_area.unit.map(|u| u.label().to_owned()),
        normalized_area_sqft,

        property_type: hygiene::hygiene_property_type(raw.property_type.as_deref()),
        amenities: hygiene::hygiene_amenities(amenities),

        date_posted,
        scrape_timestamp: Utc::now(),
        created_at: None,
        updated_at: None,

        status: ListingStatus::Active,
        duplicate_of_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_a_well_formed_message() {
        let raw = RawListingMessage {
            title: Some("Sunny 2BR".to_owned()),
            price_text: Some("$1,500.50".to_owned()),
            location_text: Some("Seattle, WA".to_owned()),
            bedrooms_text: Some("2 Beds".to_owned()),
            bathrooms_text: Some("1.5 Bathrooms".to_owned()),
            area_text: Some("900 sqft".to_owned()),
            source_url: Some("https://example.com/1".to_owned()),
            source_name: Some("example".to_owned()),
            ..Default::default()
        };

        let listing = normalize(&raw);
        assert_eq!(listing.title, "Sunny 2BR");
        assert_eq!(listing.bedrooms, Some(2));
        assert_eq!(listing.bathrooms.unwrap().to_string(), "1.5");
        assert_eq!(listing.currency_original.as_deref(), Some("USD"));
        assert!(listing.normalized_price_usd.is_some());
        assert!(listing.normalized_area_sqft.is_some());
        assert_eq!(listing.status, ListingStatus::Active);
        assert!(listing.coordinates_are_consistent());
        assert!(listing.price_invariant_holds());
    }

    #[test]
    fn normalizes_an_empty_message_without_failing() {
        let raw = RawListingMessage::default();
        let listing = normalize(&raw);
        assert_eq!(listing.title, hygiene::DEFAULT_TITLE);
        assert!(listing.source_url.starts_with("missing_url_"));
        assert!(listing.coordinates_are_consistent());
        assert!(listing.price_invariant_holds());
    }
}
