//! Near-duplicate detection against the master store (spec §4.3, "Duplicate
//! search"). The query itself lives behind a trait so this module stays a
//! pure decision function over whatever candidates come back — the
//! relational store (C4) is the only thing that knows how to run a
//! trigram-similarity query.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use anyhow::Result;
use tracing::warn;

use crate::config::DedupThresholds;
use crate::model::{Listing, ListingStatus};

/// What we need from the candidate listing itself to run the search.
#[derive(Clone, Debug)]
pub struct DuplicateQuery<'a> {
    pub source_name: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub title: &'a str,
    pub thresholds: DedupThresholds,
}

/// A candidate match returned by the store, already filtered to
/// `status = active` and `source_name != new.source_name` (spec §4.3).
#[derive(Clone, Debug)]
pub struct DuplicateCandidate {
    pub id: i64,
    pub scrape_timestamp: DateTime<Utc>,
}

/// Queries the master store for duplicate candidates. Implemented by the
/// relational store (C4); kept as a trait here so C3 doesn't depend on C4's
/// concrete type, matching the leaves-first dependency order in spec §1.
#[async_trait]
pub trait DuplicateSource: Send + Sync {
    /// Candidates ordered by descending similarity, then descending
    /// `scrape_timestamp`, as required by spec §4.3.
    async fn find_duplicate_candidates(
        &self,
        query: DuplicateQuery<'_>,
    ) -> Result<Vec<DuplicateCandidate>>;
}

/// The outcome of running dedup on a listing: the status and duplicate
/// reference to write into the master record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DedupOutcome {
    pub status: ListingStatus,
    pub duplicate_of_id: Option<i64>,
}

/// Run duplicate search for `listing` (spec §4.3). Skips the search
/// entirely if coordinates or title are absent, matching the spec exactly.
/// Store failures are logged and treated as "no candidates" (spec §4.3,
/// "Failure policy"), so this function never fails the pipeline.
pub async fn resolve(
    listing: &Listing,
    source: &dyn DuplicateSource,
    thresholds: DedupThresholds,
) -> DedupOutcome {
    let (latitude, longitude) = match (listing.latitude, listing.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return DedupOutcome { status: ListingStatus::Active, duplicate_of_id: None },
    };
    if listing.title.trim().is_empty() {
        return DedupOutcome { status: ListingStatus::Active, duplicate_of_id: None };
    }

    let query = DuplicateQuery {
        source_name: &listing.source_name,
        latitude,
        longitude,
        title: &listing.title,
        thresholds,
    };

    let candidates = match source.find_duplicate_candidates(query).await {
        Ok(candidates) => candidates,
        Err(err) => {
            warn!(error = ?err, "duplicate search failed, publishing as active");
            Vec::new()
        }
    };

    match candidates.first() {
        Some(best) => {
            DedupOutcome { status: ListingStatus::PotentialDuplicate, duplicate_of_id: Some(best.id) }
        }
        None => DedupOutcome { status: ListingStatus::Active, duplicate_of_id: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubSource {
        candidates: Vec<DuplicateCandidate>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl DuplicateSource for StubSource {
        async fn find_duplicate_candidates(
            &self,
            _query: DuplicateQuery<'_>,
        ) -> Result<Vec<DuplicateCandidate>> {
            if self.fail.load(Ordering::SeqCst) {
                Err(anyhow::format_err!("store unavailable"))
            } else {
                Ok(self.candidates.clone())
            }
        }
    }

    fn listing_with(latitude: Option<f64>, longitude: Option<f64>, title: &str) -> Listing {
        Listing {
            id: None,
            source_url: "https://example.com/1".to_owned(),
            source_name: "S1".to_owned(),
            title: title.to_owned(),
            description: None,
            images: vec![],
            price_original_numeric: None,
            price_original_text: None,
            currency_original: None,
            normalized_price_usd: None,
            address_raw: None,
            location_text: None,
            latitude,
            longitude,
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
    async fn skips_search_without_coordinates() {
        let source = StubSource { candidates: vec![], fail: AtomicBool::new(false) };
        let listing = listing_with(None, None, "Sunny 2BR");
        let outcome = resolve(&listing, &source, DedupThresholds::default()).await;
        assert_eq!(outcome, DedupOutcome { status: ListingStatus::Active, duplicate_of_id: None });
    }

    #[tokio::test]
    async fn marks_potential_duplicate_when_candidate_found() {
        let source = StubSource {
            candidates: vec![DuplicateCandidate { id: 42, scrape_timestamp: Utc::now() }],
            fail: AtomicBool::new(false),
        };
        let listing = listing_with(Some(47.6), Some(-122.3), "Sunny 2BR");
        let outcome = resolve(&listing, &source, DedupThresholds::default()).await;
        assert_eq!(
            outcome,
            DedupOutcome { status: ListingStatus::PotentialDuplicate, duplicate_of_id: Some(42) }
        );
    }

    #[tokio::test]
    async fn store_failure_publishes_as_active() {
        let source = StubSource { candidates: vec![], fail: AtomicBool::new(true) };
        let listing = listing_with(Some(47.6), Some(-122.3), "Sunny 2BR");
        let outcome = resolve(&listing, &source, DedupThresholds::default()).await;
        assert_eq!(outcome, DedupOutcome { status: ListingStatus::Active, duplicate_of_id: None });
    }
}
