//! Geocoding adapter (spec §4.3, "Geocoding").
//!
//! Mirrors the teacher's `Geocoder` trait: a small async interface with one
//! real backend and one that's always available for tests and for
//! deployments without a geocoding budget.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::{GeocoderConfig, GeocoderProvider};

/// A single geocoded candidate: coordinates plus the opaque provider
/// response they came from (spec §3, `geocoded_payload`).
#[derive(Clone, Debug)]
pub struct GeocodeCandidate {
    pub latitude: f64,
    pub longitude: f64,
    pub payload: Value,
}

/// Something that can turn a free-text address into coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Look up `address`, returning candidates best-match first. An empty
    /// vec means "no match", not an error.
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeCandidate>>;
}

/// Build the configured geocoder.
pub fn build(config: &GeocoderConfig) -> Box<dyn Geocoder> {
    match config.provider {
        GeocoderProvider::Smarty => Box::new(Smarty::new(config.clone())),
        GeocoderProvider::None => Box::new(NullGeocoder),
    }
}

/// Never geocodes. Every listing keeps absent coordinates, matching spec
/// §4.3's "on failure or empty result, leave coordinates absent; do not
/// fail the pipeline".
pub struct NullGeocoder;

#[async_trait]
impl Geocoder for NullGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Vec<GeocodeCandidate>> {
        Ok(Vec::new())
    }
}

/// Smarty's US street-address API, called with a bounded timeout and a
/// small number of retries (spec §4.3: "best-effort (bounded retry inside
/// its adapter)").
pub struct Smarty {
    client: reqwest::Client,
    api_key: Option<String>,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Debug, Deserialize, Serialize)]
struct SmartyCandidate {
    #[serde(default)]
    metadata: Option<SmartyMetadata>,
}

#[derive(Debug, Deserialize, Serialize)]
struct SmartyMetadata {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl Smarty {
    const ENDPOINT: &'static str = "https://us-street.api.smarty.com/street-address";

    pub fn new(config: GeocoderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client config is valid");
        Smarty {
            client,
            api_key: config.api_key,
            timeout: config.timeout,
            max_retries: config.max_retries,
        }
    }

    async fn geocode_once(&self, address: &str) -> Result<Vec<GeocodeCandidate>> {
        let mut request = self.client.get(Self::ENDPOINT).query(&[("street", address)]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("auth-token", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .context("smarty request failed")?
            .error_for_status()
            .context("smarty returned an error status")?;
        let candidates: Vec<SmartyCandidate> =
            response.json().await.context("smarty response was not valid JSON")?;

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let payload = serde_json::to_value(&candidate).unwrap_or(Value::Null);
            if let Some(metadata) = candidate.metadata {
                if let (Some(latitude), Some(longitude)) = (metadata.latitude, metadata.longitude)
                {
                    results.push(GeocodeCandidate { latitude, longitude, payload });
                }
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl Geocoder for Smarty {
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeCandidate>> {
        let mut attempt = 0;
        loop {
            let result = tokio::time::timeout(self.timeout, self.geocode_once(address)).await;
            match result {
                Ok(Ok(candidates)) => return Ok(candidates),
                Ok(Err(err)) if attempt < self.max_retries => {
                    warn!(attempt, error = ?err, "geocoder call failed, retrying");
                }
                Ok(Err(err)) => return Err(err),
                Err(_elapsed) if attempt < self.max_retries => {
                    warn!(attempt, "geocoder call timed out, retrying");
                }
                Err(_elapsed) => {
                    return Err(anyhow::format_err!("geocoder call timed out after retries"))
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_geocoder_always_returns_no_candidates() {
        let candidates = NullGeocoder.geocode("123 Main St").await.unwrap();
        assert!(candidates.is_empty());
    }
}
