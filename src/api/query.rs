//! Query parameter parsing, validation, and Elasticsearch query-DSL
//! construction for `GET /properties` (spec §4.5). This is the densest
//! part of the API: everything the endpoint does is either parsing a query
//! string into a validated shape or compiling that shape into a query body.

use serde::Deserialize;
use serde_json::{json, Value};
use strum_macros::EnumString;

use crate::errors::ApiError;

/// Raw, unvalidated query-string parameters, as axum's `Query` extractor
/// deserializes them.
#[derive(Debug, Default, Deserialize, serde::Serialize)]
pub struct RawQueryParams {
    pub q: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub property_type: Option<String>,
    pub min_beds: Option<i32>,
    pub max_beds: Option<i32>,
    pub min_baths: Option<f64>,
    pub max_baths: Option<f64>,
    pub min_area_sqft: Option<f64>,
    pub max_area_sqft: Option<f64>,
    pub amenities: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// A validated geo-disc filter; `lat`/`lon`/`radius_km` are required
/// together (spec §4.5).
#[derive(Clone, Copy, Debug)]
pub struct GeoFilter {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SortBy {
    Price,
    Date,
    Area,
    Relevance,
    Distance,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_es(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// A fully validated, defaulted search query (spec §4.5, "Behavior").
#[derive(Clone, Debug)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub geo: Option<GeoFilter>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub property_types: Vec<String>,
    pub min_beds: Option<i32>,
    pub max_beds: Option<i32>,
    pub min_baths: Option<f64>,
    pub max_baths: Option<f64>,
    pub min_area_sqft: Option<f64>,
    pub max_area_sqft: Option<f64>,
    pub amenities: Vec<String>,
    pub sort_by: SortBy,
    pub order: SortOrder,
    pub page: i64,
    pub limit: i64,
}

fn comma_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(|item| item.trim().to_lowercase())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Validate and default raw parameters into a [`SearchQuery`] (spec §4.5,
/// "Behavior" rules 1-5).
pub fn validate(raw: RawQueryParams) -> Result<SearchQuery, ApiError> {
    let geo = match (raw.lat, raw.lon, raw.radius_km) {
        (None, None, None) => None,
        (Some(lat), Some(lon), Some(radius_km)) => {
            if radius_km <= 0.0 {
                return Err(ApiError::BadRequest("radius_km must be positive".to_owned()));
            }
            Some(GeoFilter { lat, lon, radius_km })
        }
        _ => {
            return Err(ApiError::BadRequest(
                "lat, lon, and radius_km must be supplied together".to_owned(),
            ))
        }
    };

    let page = raw.page.unwrap_or(1);
    if page <= 0 {
        return Err(ApiError::BadRequest("page must be positive".to_owned()));
    }
    let limit = raw.limit.unwrap_or(10);
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be positive".to_owned()));
    }

    let sort_by = match &raw.sort_by {
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("unknown sort_by: {:?}", value)))?,
        None => default_sort(&raw.q, &geo),
    };

    let order = match &raw.order {
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("unknown order: {:?}", value)))?,
        None if sort_by == SortBy::Distance => SortOrder::Asc,
        None => SortOrder::Desc,
    };

    Ok(SearchQuery {
        q: raw.q.filter(|s| !s.trim().is_empty()),
        geo,
        min_price: raw.min_price,
        max_price: raw.max_price,
        property_types: comma_list(&raw.property_type),
        min_beds: raw.min_beds,
        max_beds: raw.max_beds,
        min_baths: raw.min_baths,
        max_baths: raw.max_baths,
        min_area_sqft: raw.min_area_sqft,
        max_area_sqft: raw.max_area_sqft,
        amenities: comma_list(&raw.amenities),
        sort_by,
        order,
        page,
        limit,
    })
}

/// Default sort per spec §4.5, rule 2: "if `q` present → relevance; else if
/// geo active → distance; else date desc".
fn default_sort(q: &Option<String>, geo: &Option<GeoFilter>) -> SortBy {
    if q.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false) {
        SortBy::Relevance
    } else if geo.is_some() {
        SortBy::Distance
    } else {
        SortBy::Date
    }
}

/// The fields and boosts used for the free-text match (spec §4.5: "title
/// (boost 3), location_text (2), address_raw (2), description, source_name,
/// property_type, amenities; fuzziness auto, OR-combined").
const MATCH_FIELDS: &[&str] = &[
    "title^3",
    "location_text^2",
    "address_raw^2",
    "description",
    "source_name",
    "property_type",
    "amenities",
];

/// Compile a validated query into an Elasticsearch request body.
pub fn build_es_query(query: &SearchQuery) -> Value {
    let mut must = Vec::new();
    if let Some(q) = &query.q {
        must.push(json!({
            "multi_match": {
                "query": q,
                "fields": MATCH_FIELDS,
                "fuzziness": "AUTO",
                "operator": "or",
            }
        }));
    }

    let mut filter = vec![json!({ "term": { "status": "active" } })];

    if let Some(geo) = &query.geo {
        filter.push(json!({
            "geo_distance": {
                "distance": format!("{}km", geo.radius_km),
                "location_coordinates": { "lat": geo.lat, "lon": geo.lon },
            }
        }));
    }

    if let Some(range) = range_filter(query.min_price, query.max_price) {
        filter.push(json!({ "range": { "normalized_price_usd": range } }));
    }
    if let Some(range) = range_filter(query.min_beds.map(|v| v as f64), query.max_beds.map(|v| v as f64)) {
        filter.push(json!({ "range": { "bedrooms": range } }));
    }
    if let Some(range) = range_filter(query.min_baths, query.max_baths) {
        filter.push(json!({ "range": { "bathrooms": range } }));
    }
    if let Some(range) = range_filter(query.min_area_sqft, query.max_area_sqft) {
        filter.push(json!({ "range": { "normalized_area_sqft": range } }));
    }

    if !query.property_types.is_empty() {
        filter.push(json!({ "terms": { "property_type.keyword": query.property_types } }));
    }
    // Amenities are AND-combined: every requested item must be present.
    for amenity in &query.amenities {
        filter.push(json!({ "term": { "amenities": amenity } }));
    }

    let from = (query.page - 1) * query.limit;

    json!({
        "query": {
            "bool": {
                "must": must,
                "filter": filter,
            }
        },
        "sort": build_sort(query),
        "from": from,
        "size": query.limit,
    })
}

fn range_filter(min: Option<f64>, max: Option<f64>) -> Option<Value> {
    if min.is_none() && max.is_none() {
        return None;
    }
    let mut range = serde_json::Map::new();
    if let Some(min) = min {
        range.insert("gte".to_owned(), json!(min));
    }
    if let Some(max) = max {
        range.insert("lte".to_owned(), json!(max));
    }
    Some(Value::Object(range))
}

/// Build the sort clause, including the tie-breaks from spec §4.5, rule 3:
/// "date desc, then relevance score desc".
fn build_sort(query: &SearchQuery) -> Vec<Value> {
    let mut sort = Vec::new();
    let order = query.order.as_es();

    match query.sort_by {
        SortBy::Price => sort.push(json!({ "normalized_price_usd": { "order": order } })),
        SortBy::Date => sort.push(json!({ "date_posted": { "order": order } })),
        SortBy::Area => sort.push(json!({ "normalized_area_sqft": { "order": order } })),
        SortBy::Relevance => sort.push(json!({ "_score": { "order": order } })),
        SortBy::Distance => {
            if let Some(geo) = &query.geo {
                sort.push(json!({
                    "_geo_distance": {
                        "location_coordinates": { "lat": geo.lat, "lon": geo.lon },
                        "order": order,
                        "unit": "km",
                    }
                }));
            }
        }
    }

    if query.sort_by != SortBy::Date {
        sort.push(json!({ "date_posted": { "order": "desc" } }));
    }
    if query.sort_by != SortBy::Relevance {
        sort.push(json!({ "_score": { "order": "desc" } }));
    }
    sort
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_triple_must_be_all_or_nothing() {
        let mut raw = RawQueryParams::default();
        raw.lat = Some(47.6);
        let err = validate(raw).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn negative_radius_is_rejected() {
        let raw = RawQueryParams {
            lat: Some(47.6),
            lon: Some(-122.3),
            radius_km: Some(-1.0),
            ..Default::default()
        };
        let err = validate(raw).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn nonpositive_page_is_rejected() {
        let raw = RawQueryParams { page: Some(0), ..Default::default() };
        assert!(validate(raw).is_err());
    }

    #[test]
    fn default_sort_prefers_relevance_then_distance_then_date() {
        assert_eq!(default_sort(&Some("condo".to_owned()), &None), SortBy::Relevance);
        let geo = Some(GeoFilter { lat: 1.0, lon: 1.0, radius_km: 1.0 });
        assert_eq!(default_sort(&None, &geo), SortBy::Distance);
        assert_eq!(default_sort(&None, &None), SortBy::Date);
    }

    #[test]
    fn distance_sort_defaults_to_ascending() {
        let raw = RawQueryParams {
            lat: Some(1.0),
            lon: Some(1.0),
            radius_km: Some(5.0),
            sort_by: Some("distance".to_owned()),
            ..Default::default()
        };
        let query = validate(raw).unwrap();
        assert_eq!(query.order, SortOrder::Asc);
    }

    #[test]
    fn amenities_are_lowercased_and_split() {
        let raw = RawQueryParams { amenities: Some("Pool, Gym".to_owned()), ..Default::default() };
        let query = validate(raw).unwrap();
        assert_eq!(query.amenities, vec!["pool".to_owned(), "gym".to_owned()]);
    }

    #[test]
    fn status_filter_is_always_applied() {
        let query = validate(RawQueryParams::default()).unwrap();
        let body = build_es_query(&query);
        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert!(filters.iter().any(|f| f["term"]["status"] == "active"));
    }
}
