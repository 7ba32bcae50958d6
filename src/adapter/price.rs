//! HTTP client for the floor price source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::FloorConfig;
use crate::domain::GroupId;
use crate::error::SourceError;
use crate::port::PriceSource;

#[derive(Debug, Deserialize)]
struct FloorResponse {
    price: Option<Decimal>,
}

/// HTTP client for the per-edition floor price endpoint.
pub struct PriceClient {
    http: HttpClient,
    base_url: String,
}

impl PriceClient {
    /// Build a client from floor price configuration. Every call made
    /// through this client carries the configured timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &FloorConfig) -> crate::error::Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.price_api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for PriceClient {
    async fn floor_price(&self, group_id: &GroupId) -> Result<Option<Decimal>, SourceError> {
        let url = format!("{}/v1/floor/{}", self.base_url, group_id);

        let response = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        let parsed: FloorResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        Ok(parsed.price)
    }
}
