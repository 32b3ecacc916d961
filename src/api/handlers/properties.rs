//! `GET /properties` (spec §4.5).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::api::cache::{cache_key, CacheNamespace};
use crate::api::query::{self, RawQueryParams};
use crate::api::state::AppState;
use crate::errors::ApiError;

#[derive(Debug, Serialize)]
pub struct PropertiesResponse {
    pub items: Vec<Value>,
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<RawQueryParams>,
) -> Result<Json<Value>, ApiError> {
    let key = cache_key(&raw);
    if let Some(cached) = state.cache.get(CacheNamespace::Properties, &key).await {
        return Ok(Json(cached));
    }

    let search_query = query::validate(raw)?;
    let body = query::build_es_query(&search_query);

    let response = state
        .search_index
        .search(body)
        .await
        .map_err(ApiError::SearchUnavailable)?;

    let total_items = response["hits"]["total"]["value"].as_i64().unwrap_or(0);
    let items: Vec<Value> = response["hits"]["hits"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|hit| hit["_source"].clone())
        .collect();

    let total_pages = if total_items == 0 {
        0
    } else {
        (total_items + search_query.limit - 1) / search_query.limit
    };
    let next_page =
        if search_query.page < total_pages { Some(search_query.page + 1) } else { None };
    let prev_page = if search_query.page > 1 { Some(search_query.page - 1) } else { None };

    let result = serde_json::to_value(PropertiesResponse {
        items,
        page: search_query.page,
        limit: search_query.limit,
        total_items,
        total_pages,
        next_page,
        prev_page,
    })
    .map_err(|err| ApiError::Internal(err.into()))?;

    state.cache.set(CacheNamespace::Properties, &key, &result).await;

    Ok(Json(result))
}
