//! HTTP client for the ledger event API.
//!
//! Implements [`EventSource`] against a REST surface exposing sealed
//! block height and typed event queries over a height range, and
//! [`BuyerResolver`] via the deposit-event heuristic: a sale deposits the
//! item into the buyer's account within a few blocks of the completion
//! event.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceConfig;
use crate::domain::{EventKind, ItemId, RawEvent};
use crate::error::SourceError;
use crate::port::{BuyerResolver, EventSource};

/// How many blocks past the sale height the deposit heuristic scans.
const DEPOSIT_SCAN_HEIGHTS: u64 = 10;

#[derive(Debug, Deserialize)]
struct HeightResponse {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct DepositEvent {
    item_id: String,
    recipient: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DepositsResponse {
    #[serde(default)]
    events: Vec<DepositEvent>,
}

/// HTTP client for the ledger event API.
pub struct LedgerClient {
    http: HttpClient,
    base_url: String,
}

impl LedgerClient {
    /// Build a client from source configuration.
    ///
    /// The per-call timeout must be shorter than the poll interval so a
    /// hung upstream call cannot stall the next scheduled poll; config
    /// validation enforces that, and every call made through this
    /// client carries the timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &SourceConfig) -> crate::error::Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))
    }
}

#[async_trait]
impl EventSource for LedgerClient {
    async fn current_height(&self) -> Result<u64, SourceError> {
        let url = format!("{}/v1/blocks/sealed", self.base_url);
        let response: HeightResponse = self.get_json(&url).await?;
        Ok(response.height)
    }

    async fn fetch_events(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, SourceError> {
        if from > to {
            return Err(SourceError::InvalidRange { from, to });
        }

        let url = format!(
            "{}/v1/events?type={}&from={}&to={}",
            self.base_url, kind, from, to
        );
        let response: EventsResponse = self.get_json(&url).await?;

        debug!(kind = %kind, from, to, count = response.events.len(), "Fetched events");
        Ok(response.events)
    }
}

#[async_trait]
impl BuyerResolver for LedgerClient {
    async fn resolve(
        &self,
        item_id: &ItemId,
        height: u64,
    ) -> Result<Option<String>, SourceError> {
        let url = format!(
            "{}/v1/events?type=Deposit&from={}&to={}",
            self.base_url,
            height,
            height + DEPOSIT_SCAN_HEIGHTS
        );
        let response: DepositsResponse = self.get_json(&url).await?;

        Ok(response
            .events
            .into_iter()
            .find(|ev| ev.item_id == item_id.as_str())
            .and_then(|ev| ev.recipient))
    }
}
