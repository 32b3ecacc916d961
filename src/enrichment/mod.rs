//! Enrichment & Deduplication (C3): geocoding and near-duplicate detection
//! against the master store (spec §4.3).

pub mod dedup;
pub mod geocoder;

use tracing::warn;

use crate::config::DedupThresholds;
use crate::model::Listing;
use dedup::DuplicateSource;
use geocoder::Geocoder;

/// Enrich `listing` in place: geocode its address if present, then run
/// duplicate search using the resulting coordinates. Never fails — both
/// sub-steps degrade to "absent"/"active" on error, per spec §4.3's failure
/// policy, so the pipeline always has something to write.
pub async fn enrich(
    listing: &mut Listing,
    geocoder: &dyn Geocoder,
    duplicate_source: &dyn DuplicateSource,
    thresholds: DedupThresholds,
) {
    if let Some(address) = listing.address_raw.clone() {
        match geocoder.geocode(&address).await {
            Ok(candidates) => {
                if let Some(best) = candidates.into_iter().next() {
                    listing.latitude = Some(best.latitude);
                    listing.longitude = Some(best.longitude);
                    listing.geocoded_payload = Some(best.payload);
                }
            }
            Err(err) => {
                warn!(error = ?err, "geocoding failed, leaving coordinates absent");
            }
        }
    }

    let outcome = dedup::resolve(listing, duplicate_source, thresholds).await;
    listing.status = outcome.status;
    listing.duplicate_of_id = outcome.duplicate_of_id;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ListingStatus;
    use async_trait::async_trait;
    use anyhow::Result;
    use chrono::Utc;
    use geocoder::GeocodeCandidate;

    struct StubGeocoder;

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn geocode(&self, _address: &str) -> Result<Vec<GeocodeCandidate>> {
            Ok(vec![GeocodeCandidate {
                latitude: 47.6,
                longitude: -122.3,
                payload: serde_json::json!({"match": "exact"}),
            }])
        }
    }

    struct NoDuplicates;

    #[async_trait]
    impl DuplicateSource for NoDuplicates {
        async fn find_duplicate_candidates(
            &self,
            _query: dedup::DuplicateQuery<'_>,
        ) -> Result<Vec<dedup::DuplicateCandidate>> {
            Ok(vec![])
        }
    }

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
            address_raw: Some("123 Main St, Seattle, WA".to_owned()),
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

    #[tokio::test]
    async fn geocodes_and_publishes_active_without_duplicates() {
        let mut listing = base_listing();
        enrich(&mut listing, &StubGeocoder, &NoDuplicates, DedupThresholds::default()).await;
        assert_eq!(listing.latitude, Some(47.6));
        assert_eq!(listing.longitude, Some(-122.3));
        assert_eq!(listing.status, ListingStatus::Active);
        assert!(listing.coordinates_are_consistent());
    }

    #[tokio::test]
    async fn skips_geocoding_when_address_absent() {
        let mut listing = base_listing();
        listing.address_raw = None;
        enrich(&mut listing, &StubGeocoder, &NoDuplicates, DedupThresholds::default()).await;
        assert_eq!(listing.latitude, None);
        assert_eq!(listing.longitude, None);
    }
}
