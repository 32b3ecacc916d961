//! The relational master store (spec §4.4, "Relational upsert"; §6.2).
//!
//! We use runtime-checked `sqlx::query`/`query_as` rather than the
//! compile-time `query!` macros, since those require a live `DATABASE_URL`
//! at build time, which this workspace never assumes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::config::DedupThresholds;
use crate::enrichment::dedup::{DuplicateCandidate, DuplicateQuery, DuplicateSource};
use crate::model::{Listing, ListingStatus};

/// A handle to the Postgres master store, backed by a connection pool.
#[derive(Clone)]
pub struct RelationalStore {
    pool: PgPool,
}

impl RelationalStore {
    pub async fn connect(database_url: &str) -> Result<RelationalStore> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to the relational store")?;
        Ok(RelationalStore { pool })
    }

    /// Run pending migrations. Safe to call on every startup (spec §6.5
    /// doesn't require a separate migrate step, but the `migrate`
    /// subcommand exists for deployments that want to run it out of band).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.context("migration failed")
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert-or-update `listing` keyed by `source_url`, bumping
    /// `updated_at` to now on update (spec §4.4, "Relational upsert").
    /// Returns the master id.
    pub async fn upsert(&self, listing: &Listing) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO properties (
                source_url, source_name, title, description, images,
                price_original_numeric, price_original_text, currency_original, normalized_price_usd,
                address_raw, location_text, latitude, longitude, geocoded_payload,
                bedrooms, bathrooms, area_value, area_unit, normalized_area_sqft,
                property_type, amenities, date_posted, scrape_timestamp,
                status, duplicate_of_id
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23, $24, $25
            )
            ON CONFLICT (source_url) DO UPDATE SET
                source_name = EXCLUDED.source_name,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                images = EXCLUDED.images,
                price_original_numeric = EXCLUDED.price_original_numeric,
                price_original_text = EXCLUDED.price_original_text,
                currency_original = EXCLUDED.currency_original,
                normalized_price_usd = EXCLUDED.normalized_price_usd,
                address_raw = EXCLUDED.address_raw,
                location_text = EXCLUDED.location_text,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                geocoded_payload = EXCLUDED.geocoded_payload,
                bedrooms = EXCLUDED.bedrooms,
                bathrooms = EXCLUDED.bathrooms,
                area_value = EXCLUDED.area_value,
                area_unit = EXCLUDED.area_unit,
                normalized_area_sqft = EXCLUDED.normalized_area_sqft,
                property_type = EXCLUDED.property_type,
                amenities = EXCLUDED.amenities,
                date_posted = EXCLUDED.date_posted,
                scrape_timestamp = EXCLUDED.scrape_timestamp,
                status = EXCLUDED.status,
                duplicate_of_id = EXCLUDED.duplicate_of_id,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(&listing.source_url)
        .bind(&listing.source_name)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.images)
        .bind(listing.price_original_numeric)
        .bind(&listing.price_original_text)
        .bind(&listing.currency_original)
        .bind(listing.normalized_price_usd)
        .bind(&listing.address_raw)
        .bind(&listing.location_text)
        .bind(listing.latitude)
        .bind(listing.longitude)
        .bind(&listing.geocoded_payload)
        .bind(listing.bedrooms)
        .bind(listing.bathrooms)
        .bind(listing.area_value)
        .bind(&listing.area_unit)
        .bind(listing.normalized_area_sqft)
        .bind(&listing.property_type)
        .bind(&listing.amenities)
        .bind(listing.date_posted)
        .bind(listing.scrape_timestamp)
        .bind(listing.status)
        .bind(listing.duplicate_of_id)
        .fetch_one(&self.pool)
        .await
        .context("relational upsert failed")?;

        Ok(row.0)
    }

    /// Fetch a single listing by id, used by the API to resolve
    /// `duplicate_of_id` references and by tests.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>("SELECT * FROM properties WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch listing by id")?;
        Ok(row.map(Listing::from))
    }
}

#[async_trait]
impl DuplicateSource for RelationalStore {
    async fn find_duplicate_candidates(
        &self,
        query: DuplicateQuery<'_>,
    ) -> Result<Vec<DuplicateCandidate>> {
        let DedupThresholds { lat, lon, title_similarity } = query.thresholds;
        let rows: Vec<(i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, scrape_timestamp
            FROM properties
            WHERE status = 'active'
              AND source_name <> $1
              AND latitude IS NOT NULL AND longitude IS NOT NULL
              AND abs(latitude - $2) <= $3
              AND abs(longitude - $4) <= $5
              AND similarity(title, $6) >= $7
            ORDER BY similarity(title, $6) DESC, scrape_timestamp DESC
            "#,
        )
        .bind(query.source_name)
        .bind(query.latitude)
        .bind(lat)
        .bind(query.longitude)
        .bind(lon)
        .bind(query.title)
        .bind(title_similarity)
        .fetch_all(&self.pool)
        .await
        .context("duplicate candidate query failed")?;

        Ok(rows
            .into_iter()
            .map(|(id, scrape_timestamp)| DuplicateCandidate { id, scrape_timestamp })
            .collect())
    }
}

/// Row shape for `SELECT * FROM properties`, mirroring the `properties`
/// table defined in `migrations/`.
#[derive(FromRow)]
struct ListingRow {
    id: i64,
    source_url: String,
    source_name: String,
    title: String,
    description: Option<String>,
    images: Vec<String>,
    price_original_numeric: Option<Decimal>,
    price_original_text: Option<String>,
    currency_original: Option<String>,
    normalized_price_usd: Option<Decimal>,
    address_raw: Option<String>,
    location_text: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    geocoded_payload: Option<serde_json::Value>,
    bedrooms: Option<i32>,
    bathrooms: Option<Decimal>,
    area_value: Option<Decimal>,
    area_unit: Option<String>,
    normalized_area_sqft: Option<Decimal>,
    property_type: Option<String>,
    amenities: Vec<String>,
    date_posted: Option<DateTime<Utc>>,
    scrape_timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status: ListingStatus,
    duplicate_of_id: Option<i64>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Listing {
            id: Some(row.id),
            source_url: row.source_url,
            source_name: row.source_name,
            title: row.title,
            description: row.description,
            images: row.images,
            price_original_numeric: row.price_original_numeric,
            price_original_text: row.price_original_text,
            currency_original: row.currency_original,
            normalized_price_usd: row.normalized_price_usd,
            address_raw: row.address_raw,
            location_text: row.location_text,
            latitude: row.latitude,
            longitude: row.longitude,
            geocoded_payload: row.geocoded_payload,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            area_value: row.area_value,
            area_unit: row.area_unit,
            normalized_area_sqft: row.normalized_area_sqft,
            property_type: row.property_type,
            amenities: row.amenities,
            date_posted: row.date_posted,
            scrape_timestamp: row.scrape_timestamp,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
            status: row.status,
            duplicate_of_id: row.duplicate_of_id,
        }
    }
}
