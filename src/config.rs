//! Process-start configuration surface (spec §6.4).
//!
//! Every value has a default and can be set from the environment or, for the
//! values that make sense on a command line, from a `clap` flag — the same
//! "env-backed flag" idiom the teacher uses for `Opt` fields like
//! `--max-addresses-per-second`.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Read an environment variable, falling back to `default` if it is unset.
fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_string_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Which geocoder backend to use.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeocoderProvider {
    /// Call out to Smarty's street-address API.
    Smarty,
    /// Never geocode; every listing keeps absent coordinates. Useful for
    /// tests and for sources that never provide a usable address.
    None,
}

impl std::str::FromStr for GeocoderProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "smarty" => Ok(GeocoderProvider::Smarty),
            "none" => Ok(GeocoderProvider::None),
            other => Err(anyhow::format_err!("unknown geocoder provider {:?}", other)),
        }
    }
}

/// Dedup thresholds (spec §4.3), kept together because they're always read
/// and passed around as a unit.
#[derive(Clone, Copy, Debug)]
pub struct DedupThresholds {
    /// Maximum `|lat - lat|` for a dedup candidate.
    pub lat: f64,
    /// Maximum `|lon - lon|` for a dedup candidate.
    pub lon: f64,
    /// Minimum trigram title similarity for a dedup candidate.
    pub title_similarity: f64,
}

impl Default for DedupThresholds {
    fn default() -> Self {
        DedupThresholds {
            lat: 1e-4,
            lon: 1e-4,
            title_similarity: 0.6,
        }
    }
}

/// Geocoder configuration.
#[derive(Clone, Debug)]
pub struct GeocoderConfig {
    pub provider: GeocoderProvider,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u8,
}

/// Cache TTLs for the two cached endpoints.
#[derive(Clone, Copy, Debug)]
pub struct CacheTtls {
    pub properties: Duration,
    pub metadata: Duration,
}

/// Token-bucket rate-limit configuration (spec §4.5).
#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    pub points: usize,
    pub duration: Duration,
}

/// Full process configuration, assembled once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub amqp_url: String,
    pub amqp_queue_name: String,

    pub database_url: String,

    pub elasticsearch_url: Url,
    pub elasticsearch_index: String,

    pub redis_url: String,
    pub cache_ttls: CacheTtls,

    pub rate_limit: RateLimitConfig,

    pub dedup_thresholds: DedupThresholds,

    pub geocoder: GeocoderConfig,

    pub listen_address: String,
    pub worker_concurrency: usize,
}

impl Config {
    /// Load configuration from the environment, applying the defaults named
    /// in spec §6.4.
    pub fn from_env() -> Result<Config> {
        let elasticsearch_url = env_string_or("ELASTICSEARCH_URL", "http://localhost:9200");
        let elasticsearch_url = Url::parse(&elasticsearch_url)
            .with_context(|| format!("invalid ELASTICSEARCH_URL: {:?}", elasticsearch_url))?;

        let provider: GeocoderProvider = env::var("GEOCODER_PROVIDER")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(GeocoderProvider::None);

        Ok(Config {
            amqp_url: env_string_or("AMQP_URL", "amqp://127.0.0.1:5672/%2f"),
            amqp_queue_name: env_string_or("AMQP_QUEUE_NAME", "listings.raw"),

            database_url: env_string_or(
                "DATABASE_URL",
                "postgres://localhost/realty_pipeline",
            ),

            elasticsearch_url,
            elasticsearch_index: env_string_or("ELASTICSEARCH_INDEX", "properties"),

            redis_url: env_string_or("REDIS_URL", "redis://127.0.0.1/"),
            cache_ttls: CacheTtls {
                properties: Duration::from_secs(env_or("CACHE_TTL_PROPERTIES_SECS", 300)),
                metadata: Duration::from_secs(env_or("CACHE_TTL_METADATA_SECS", 600)),
            },

            rate_limit: RateLimitConfig {
                points: env_or("RATE_LIMIT_POINTS", 100),
                duration: Duration::from_secs(env_or("RATE_LIMIT_DURATION_SECS", 60)),
            },

            dedup_thresholds: DedupThresholds {
                lat: env_or("DEDUP_LAT_THRESHOLD", 1e-4),
                lon: env_or("DEDUP_LON_THRESHOLD", 1e-4),
                title_similarity: env_or("DEDUP_TITLE_SIMILARITY_THRESHOLD", 0.6),
            },

            geocoder: GeocoderConfig {
                provider,
                api_key: env::var("GEOCODER_API_KEY").ok(),
                timeout: Duration::from_millis(env_or("GEOCODER_TIMEOUT_MS", 2000)),
                max_retries: env_or("GEOCODER_MAX_RETRIES", 2),
            },

            listen_address: env_string_or("LISTEN_ADDRESS", "0.0.0.0:8080"),
            worker_concurrency: env_or("WORKER_CONCURRENCY", 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_thresholds_default_matches_spec() {
        let thresholds = DedupThresholds::default();
        assert_eq!(thresholds.lat, 1e-4);
        assert_eq!(thresholds.lon, 1e-4);
        assert_eq!(thresholds.title_similarity, 0.6);
    }

    #[test]
    fn geocoder_provider_parses_known_names() {
        assert_eq!(
            "smarty".parse::<GeocoderProvider>().unwrap(),
            GeocoderProvider::Smarty
        );
        assert_eq!(
            "NONE".parse::<GeocoderProvider>().unwrap(),
            GeocoderProvider::None
        );
        assert!("bogus".parse::<GeocoderProvider>().is_err());
    }
}
