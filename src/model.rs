//! The master listing record and its search-index projection (spec §3).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Lifecycle status of a master record (spec §3, invariant 3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "listing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    PotentialDuplicate,
    Merged,
    Inactive,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::PotentialDuplicate => "potential_duplicate",
            ListingStatus::Merged => "merged",
            ListingStatus::Inactive => "inactive",
        }
    }
}

/// A point returned by the geocoder, kept alongside the raw payload it came
/// from so operators can inspect what the geocoder actually said.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// The de-duplicated master record for a single property observation (spec
/// §3). This is the row shape of the `properties` table and the source of
/// truth that the search index is a derived, eventually-consistent
/// projection of.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Listing {
    pub id: Option<i64>,
    pub source_url: String,
    pub source_name: String,

    pub title: String,
    pub description: Option<String>,
    pub images: Vec<String>,

    pub price_original_numeric: Option<Decimal>,
    pub price_original_text: Option<String>,
    pub currency_original: Option<String>,
    pub normalized_price_usd: Option<Decimal>,

    pub address_raw: Option<String>,
    pub location_text: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocoded_payload: Option<serde_json::Value>,

    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub area_value: Option<Decimal>,
    pub area_unit: Option<String>,
    pub normalized_area_sqft: Option<Decimal>,

    pub property_type: Option<String>,
    pub amenities: Vec<String>,

    pub date_posted: Option<DateTime<Utc>>,
    pub scrape_timestamp: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    pub status: ListingStatus,
    pub duplicate_of_id: Option<i64>,
}

impl Listing {
    /// `(latitude, longitude)` should always be both-present or
    /// both-absent (spec §3, invariant 2). This checks that invariant for a
    /// record we're about to write.
    pub fn coordinates_are_consistent(&self) -> bool {
        self.latitude.is_some() == self.longitude.is_some()
    }

    /// `normalized_price_usd` implies both `price_original_numeric` and
    /// `currency_original` are present (spec §3, invariant 5).
    pub fn price_invariant_holds(&self) -> bool {
        if self.normalized_price_usd.is_some() {
            self.price_original_numeric.is_some() && self.currency_original.is_some()
        } else {
            true
        }
    }

    pub fn coordinates(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        }
    }
}

/// The document body written to the search index, keyed by `source_url`
/// (spec §3, "Search document"). This mirrors [`Listing`] plus a derived
/// geo-point field; everything else is a straight projection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: Option<i64>,
    pub source_url: String,
    pub source_name: String,

    pub title: String,
    pub description: Option<String>,
    pub images: Vec<String>,

    pub price_original_numeric: Option<Decimal>,
    pub price_original_text: Option<String>,
    pub currency_original: Option<String>,
    pub normalized_price_usd: Option<Decimal>,

    pub address_raw: Option<String>,
    pub location_text: Option<String>,
    pub location_coordinates: Option<GeoPoint>,

    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub area_original_value: Option<Decimal>,
    pub area_unit_original: Option<String>,
    pub normalized_area_sqft: Option<Decimal>,

    pub property_type: Option<String>,
    pub amenities: Vec<String>,

    pub date_posted: Option<DateTime<Utc>>,
    pub scrape_timestamp: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    pub status: ListingStatus,
    pub duplicate_of_property_id: Option<i64>,
}

impl From<&Listing> for SearchDocument {
    fn from(listing: &Listing) -> Self {
        SearchDocument {
            id: listing.id,
            source_url: listing.source_url.clone(),
            source_name: listing.source_name.clone(),
            title: listing.title.clone(),
            description: listing.description.clone(),
            images: listing.images.clone(),
            price_original_numeric: listing.price_original_numeric,
            price_original_text: listing.price_original_text.clone(),
            currency_original: listing.currency_original.clone(),
            normalized_price_usd: listing.normalized_price_usd,
            address_raw: listing.address_raw.clone(),
            location_text: listing.location_text.clone(),
            location_coordinates: listing.coordinates(),
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            area_original_value: listing.area_value,
            area_unit_original: listing.area_unit.clone(),
            normalized_area_sqft: listing.normalized_area_sqft,
            property_type: listing.property_type.clone(),
            amenities: listing.amenities.clone(),
            date_posted: listing.date_posted,
            scrape_timestamp: listing.scrape_timestamp,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
            status: listing.status,
            duplicate_of_property_id: listing.duplicate_of_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_listing() -> Listing {
        Listing {
            id: None,
            source_url: "https://example.com/1".to_owned(),
            source_name: "S1".to_owned(),
            title: "Sunny 2BR".to_owned(),
            description: None,
            images: vec![],
            price_original_numeric: None,
            price_original_text: None,
            currency_original: None,
            normalized_price_usd: None,
            address_raw: None,
            location_text: None,
            latitude: None,
            longitude: None,
            geocoded_payload: None,
            bedrooms: None,
            bathrooms: None,
            area_value: None,
            area_unit: None,
            normalized_area_sqft: None,
            property_type: None,
            amenities: vec![],
            date_posted: None,
            scrape_timestamp: Utc::now(),
            created_at: None,
            updated_at: None,
            status: ListingStatus::Active,
            duplicate_of_id: None,
        }
    }

    #[test]
    fn coordinates_must_be_both_present_or_both_absent() {
        let mut listing = base_listing();
        assert!(listing.coordinates_are_consistent());

        listing.latitude = Some(47.6);
        assert!(!listing.coordinates_are_consistent());

        listing.longitude = Some(-122.3);
        assert!(listing.coordinates_are_consistent());
    }

    #[test]
    fn normalized_price_requires_numeric_and_currency() {
        let mut listing = base_listing();
        assert!(listing.price_invariant_holds());

        listing.normalized_price_usd = Some(Decimal::new(200000, 2));
        assert!(!listing.price_invariant_holds());

        listing.price_original_numeric = Some(Decimal::new(200000, 2));
        listing.currency_original = Some("USD".to_owned());
        assert!(listing.price_invariant_holds());
    }

    #[test]
    fn search_document_projects_coordinates_as_geo_point() {
        let mut listing = base_listing();
        listing.latitude = Some(47.6);
        listing.longitude = Some(-122.3);

        let doc = SearchDocument::from(&listing);
        let point = doc.location_coordinates.expect("coordinates should project");
        assert_eq!(point.latitude, 47.6);
        assert_eq!(point.longitude, -122.3);
    }
}
