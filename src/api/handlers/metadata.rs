//! `GET /properties/filters/metadata` (spec §4.5): a facet bundle over
//! active listings.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::cache::{cache_key, CacheNamespace};
use crate::api::state::AppState;
use crate::errors::ApiError;

/// How many term buckets to return per facet.
const TERMS_SIZE: usize = 20;

pub async fn handle(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let key = cache_key(&Value::Null);
    if let Some(cached) = state.cache.get(CacheNamespace::Metadata, &key).await {
        return Ok(Json(cached));
    }

    let body = json!({
        "query": { "bool": { "filter": [{ "term": { "status": "active" } }] } },
        "size": 0,
        "aggs": {
            "price": { "stats": { "field": "normalized_price_usd" } },
            "bedrooms": { "stats": { "field": "bedrooms" } },
            "bathrooms": { "stats": { "field": "bathrooms" } },
            "area": { "stats": { "field": "normalized_area_sqft" } },
            "property_type": { "terms": { "field": "property_type.keyword", "size": TERMS_SIZE } },
            "amenities": { "terms": { "field": "amenities", "size": TERMS_SIZE } },
            "location": { "terms": { "field": "location_text.keyword", "size": TERMS_SIZE } },
        }
    });

    let response = state.search_index.search(body).await.map_err(ApiError::SearchUnavailable)?;
    let aggs = response["aggregations"].clone();

    let result = json!({
        "price": stats(&aggs, "price"),
        "bedrooms": stats(&aggs, "bedrooms"),
        "bathrooms": stats(&aggs, "bathrooms"),
        "area": stats(&aggs, "area"),
        "property_type": buckets(&aggs, "property_type"),
        "amenities": buckets(&aggs, "amenities"),
        "location": buckets(&aggs, "location"),
    });

    state.cache.set(CacheNamespace::Metadata, &key, &result).await;

    Ok(Json(result))
}

fn stats(aggs: &Value, name: &str) -> Value {
    json!({
        "min": aggs[name]["min"],
        "max": aggs[name]["max"],
    })
}

fn buckets(aggs: &Value, name: &str) -> Value {
    let buckets = aggs[name]["buckets"].as_array().cloned().unwrap_or_default();
    let entries: Vec<Value> = buckets
        .into_iter()
        .map(|bucket| json!({ "key": bucket["key"], "count": bucket["doc_count"] }))
        .collect();
    Value::Array(entries)
}
