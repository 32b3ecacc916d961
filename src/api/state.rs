//! Shared state for the query API (C5): everything a request handler might
//! need to suspend on (spec §5, "The API is a parallel request-handler
//! pool; per-request handlers are independent").

use std::sync::Arc;

use anyhow::{Context, Result};
use bb8_redis::RedisConnectionManager;
use dashmap::DashMap;
use std::net::IpAddr;

use crate::api::cache::ResponseCache;
use crate::config::{Config, RateLimitConfig};
use crate::store::search_index::SearchIndex;

pub type RedisPool = bb8::Pool<RedisConnectionManager>;

/// Per-IP token buckets (spec §4.5, "Rate limiting"). A `DashMap` gives us
/// lock-free reads for the common case of an IP that's already been seen.
pub type RateLimiterMap = DashMap<IpAddr, Arc<leaky_bucket::RateLimiter>>;

pub struct AppState {
    pub search_index: SearchIndex,
    pub cache: ResponseCache,
    pub rate_limiters: RateLimiterMap,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub async fn from_config(config: &Config) -> Result<AppState> {
        let manager = RedisConnectionManager::new(config.redis_url.clone())
            .context("invalid REDIS_URL")?;
        let redis_pool = bb8::Pool::builder()
            .build(manager)
            .await
            .context("failed to build the redis connection pool")?;

        let search_index = SearchIndex::connect(&config.elasticsearch_url, &config.elasticsearch_index)?;

        Ok(AppState {
            search_index,
            cache: ResponseCache::new(redis_pool, config.cache_ttls),
            rate_limiters: DashMap::new(),
            rate_limit: config.rate_limit,
        })
    }

    /// Get or create the token bucket for `ip` (spec §4.5: "Token-bucket per
    /// client IP").
    pub fn rate_limiter_for(&self, ip: IpAddr) -> Arc<leaky_bucket::RateLimiter> {
        self.rate_limiters
            .entry(ip)
            .or_insert_with(|| {
                Arc::new(
                    leaky_bucket::RateLimiter::builder()
                        .initial(self.rate_limit.points)
                        .max(self.rate_limit.points)
                        .refill(self.rate_limit.points)
                        .interval(self.rate_limit.duration)
                        .fair(false)
                        .build(),
                )
            })
            .clone()
    }
}
