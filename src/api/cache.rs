//! Response cache, keyed by a stable hash of the query parameters (spec
//! §4.5, "Caching").

use std::time::Duration;

use bb8_redis::redis::AsyncCommands;
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::api::state::RedisPool;
use crate::config::CacheTtls;

/// Which cached endpoint this key belongs to; each has its own TTL (spec
/// §4.5: "TTLs are independent: properties ..., metadata ...").
#[derive(Clone, Copy, Debug)]
pub enum CacheNamespace {
    Properties,
    Metadata,
}

impl CacheNamespace {
    fn prefix(&self) -> &'static str {
        match self {
            CacheNamespace::Properties => "properties",
            CacheNamespace::Metadata => "metadata",
        }
    }
}

pub struct ResponseCache {
    pool: RedisPool,
    ttls: CacheTtls,
}

impl ResponseCache {
    pub fn new(pool: RedisPool, ttls: CacheTtls) -> ResponseCache {
        ResponseCache { pool, ttls }
    }

    fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        match namespace {
            CacheNamespace::Properties => self.ttls.properties,
            CacheNamespace::Metadata => self.ttls.metadata,
        }
    }

    /// Look up a cached response. Any backend failure is treated as a miss
    /// and logged, since the cache is best-effort (spec §5: "The cache is
    /// best-effort and may be absent without loss of correctness").
    pub async fn get(&self, namespace: CacheNamespace, key: &str) -> Option<Value> {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = ?err, "cache backend unavailable on read");
                return None;
            }
        };
        let cache_key = format!("{}:{}", namespace.prefix(), key);
        match conn.get::<_, Option<String>>(cache_key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(err) => {
                warn!(error = ?err, "cache read failed");
                None
            }
        }
    }

    /// Store a response. Failures are logged and otherwise ignored.
    pub async fn set(&self, namespace: CacheNamespace, key: &str, value: &Value) {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = ?err, "cache backend unavailable on write");
                return;
            }
        };
        let cache_key = format!("{}:{}", namespace.prefix(), key);
        let Ok(serialized) = serde_json::to_string(value) else {
            return;
        };
        let ttl_secs = self.ttl_for(namespace).as_secs();
        if let Err(err) = conn.set_ex::<_, _, ()>(cache_key, serialized, ttl_secs as usize).await {
            warn!(error = ?err, "cache write failed");
        }
    }
}

/// Hash `params`' JSON serialization into a stable cache key. Serializing a
/// `BTreeMap` (rather than a `HashMap`) guarantees lexicographic key order,
/// so two parameter maps equal as maps always hash identically (spec §8:
/// "Cache key generation is order-insensitive across parameters").
pub fn cache_key<T: Serialize>(params: &T) -> String {
    let normalized: std::collections::BTreeMap<String, Value> =
        match serde_json::to_value(params) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => Default::default(),
        };
    let canonical = serde_json::to_string(&normalized).unwrap_or_default();

    let mut hasher = Md5::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_is_order_insensitive() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn cache_key_differs_for_different_values() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(cache_key(&a), cache_key(&b));
    }
}
