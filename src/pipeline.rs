//! Per-message ingest orchestration: C2 → C3 → C4, synchronously in
//! sequence (spec §4.1, step 2). This is the body of a single queue
//! delivery's processing; the queue adapter (C1) is responsible for parsing
//! the payload, calling this, and deciding ack/nack from the result.

use std::sync::Arc;

use tracing::instrument;

use crate::config::DedupThresholds;
use crate::enrichment::{self, dedup::DuplicateSource, geocoder::Geocoder};
use crate::errors::IngestError;
use crate::message::RawListingMessage;
use crate::model::Listing;
use crate::normalize;
use crate::store::relational::RelationalStore;
use crate::store::search_index::SearchIndex;

/// Everything a single ingest needs, bundled so `ingest_one` doesn't grow
/// an unwieldy parameter list and so it can be shared across worker tasks
/// via a single `Arc`.
pub struct IngestContext {
    pub geocoder: Box<dyn Geocoder>,
    pub relational: RelationalStore,
    pub search_index: SearchIndex,
    pub dedup_thresholds: DedupThresholds,
}

/// Run C2 → C3 → C4 for one raw message. Returns the master id on success.
#[instrument(skip(raw, ctx), fields(source_url))]
pub async fn ingest_one(raw: &RawListingMessage, ctx: &Arc<IngestContext>) -> Result<i64, IngestError> {
    let mut listing: Listing = normalize::normalize(raw);
    tracing::Span::current().record("source_url", &listing.source_url.as_str());

    let duplicate_source: &dyn DuplicateSource = &ctx.relational;
    enrichment::enrich(&mut listing, ctx.geocoder.as_ref(), duplicate_source, ctx.dedup_thresholds)
        .await;

    let id = ctx
        .relational
        .upsert(&listing)
        .await
        .map_err(IngestError::RelationalWrite)?;
    listing.id = Some(id);

    let document = crate::model::SearchDocument::from(&listing);
    ctx.search_index
        .index_document(&document)
        .await
        .map_err(IngestError::SearchWrite)?;

    Ok(id)
}
