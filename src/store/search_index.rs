//! The search index (spec §4.4, "Search index upsert"; §6.3).
//!
//! Documents are keyed by `source_url`, not the numeric master id, so
//! re-indexing the same listing is a pure overwrite (spec: "append-idempotent
//! per `source_url`").

use anyhow::{Context, Result};
use elasticsearch::http::transport::Transport;
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use elasticsearch::{Elasticsearch, SearchParts};
use serde_json::{json, Value};
use url::Url;

use crate::model::SearchDocument;

/// A handle to the search index.
#[derive(Clone)]
pub struct SearchIndex {
    client: Elasticsearch,
    index: String,
}

impl SearchIndex {
    pub fn connect(elasticsearch_url: &Url, index: &str) -> Result<SearchIndex> {
        let transport = Transport::single_node(elasticsearch_url.as_str())
            .context("failed to build elasticsearch transport")?;
        Ok(SearchIndex { client: Elasticsearch::new(transport), index: index.to_owned() })
    }

    /// Create the index and its mapping if it doesn't already exist (spec
    /// §4.4: "at startup C4 ensures the index and its mapping"). Idempotent.
    pub async fn ensure_index(&self) -> Result<()> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&self.index]))
            .send()
            .await
            .context("failed to check whether the search index exists")?;
        if exists.status_code().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index))
            .body(mapping())
            .send()
            .await
            .context("failed to create the search index")?;
        if !response.status_code().is_success() {
            anyhow::bail!("failed to create search index: {}", response.status_code());
        }
        Ok(())
    }

    /// Upsert `document`, keyed by `source_url` (spec §4.4).
    pub async fn index_document(&self, document: &SearchDocument) -> Result<()> {
        let response = self
            .client
            .index(elasticsearch::IndexParts::IndexId(&self.index, &document.source_url))
            .body(document)
            .send()
            .await
            .context("search index write failed")?;
        if !response.status_code().is_success() {
            anyhow::bail!("search index write returned {}", response.status_code());
        }
        Ok(())
    }

    /// Run a raw query-DSL search, returning the parsed JSON response body.
    /// The query builder lives in `api::query`; this is a thin transport.
    pub async fn search(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .body(body)
            .send()
            .await
            .context("search query failed")?;
        let status = response.status_code();
        let parsed: Value = response.json().await.context("search response was not valid JSON")?;
        if !status.is_success() {
            anyhow::bail!("search query returned {}: {}", status, parsed);
        }
        Ok(parsed)
    }
}

/// The mapping enumerated in spec §6.3.
fn mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "currency_original": { "type": "keyword" },
                "property_type": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "amenities": { "type": "keyword" },
                "source_url": { "type": "keyword" },
                "source_name": { "type": "keyword" },
                "price_original_text": { "type": "keyword" },
                "area_unit_original": { "type": "keyword" },
                "images": { "type": "keyword" },
                "status": { "type": "keyword" },

                "title": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } }
                },
                "location_text": { "type": "text" },
                "address_raw": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "description": { "type": "text" },

                "price_original_numeric": { "type": "float" },
                "normalized_price_usd": { "type": "float" },
                "area_original_value": { "type": "float" },
                "normalized_area_sqft": { "type": "float" },
                "bedrooms": { "type": "integer" },
                "bathrooms": { "type": "half_float" },
                "duplicate_of_property_id": { "type": "integer" },

                "date_posted": { "type": "date" },
                "scrape_timestamp": { "type": "date" },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" },

                "location_coordinates": { "type": "geo_point" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_declares_geo_point_field() {
        let mapped = mapping();
        assert_eq!(
            mapped["mappings"]["properties"]["location_coordinates"]["type"],
            "geo_point"
        );
    }

    #[test]
    fn mapping_gives_title_a_bounded_keyword_subfield() {
        let mapped = mapping();
        assert_eq!(
            mapped["mappings"]["properties"]["title"]["fields"]["keyword"]["ignore_above"],
            256
        );
    }
}
