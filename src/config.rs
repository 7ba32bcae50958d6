//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file; every section has sensible
//! defaults so a minimal file only needs the upstream URLs. Sensitive or
//! host-specific values can be supplied via the environment (`.env` is
//! loaded by the binary through dotenvy).

use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use crate::engine::EngineSettings;
use crate::error::{ConfigError, Result};
use crate::runtime::{BackoffPolicy, PollerSettings, SweepSettings};

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub floor: FloorConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ledger event API settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the ledger event API.
    pub api_url: String,
    /// Per-call HTTP timeout. Must stay shorter than the poll interval
    /// so a hung upstream call cannot stall the next scheduled poll.
    pub timeout_ms: u64,
    /// Blocks behind the current height to start from when no
    /// checkpoint exists yet.
    pub start_offset: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://ledger.example.net".into(),
            timeout_ms: 3_000,
            start_offset: 50,
        }
    }
}

/// Floor price cache and price source settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FloorConfig {
    pub price_api_url: String,
    pub timeout_ms: u64,
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            price_api_url: "https://prices.example.net".into(),
            timeout_ms: 3_000,
            ttl_secs: 300,
            capacity: 512,
        }
    }
}

impl FloorConfig {
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs as i64)
    }
}

/// Poller cadence and backoff settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
    pub max_batch_heights: u64,
    pub heartbeat_every: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: f64,
    pub backoff_widen_after: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            max_batch_heights: 200,
            heartbeat_every: 60,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 30_000,
            backoff_multiplier: 2.0,
            backoff_widen_after: 5,
        }
    }
}

impl PollerConfig {
    #[must_use]
    pub fn settings(&self, start_offset: u64) -> PollerSettings {
        PollerSettings {
            interval: std::time::Duration::from_millis(self.interval_ms),
            max_batch_heights: self.max_batch_heights,
            start_offset,
            heartbeat_every: self.heartbeat_every,
            backoff: BackoffPolicy {
                initial: std::time::Duration::from_millis(self.backoff_initial_ms),
                max: std::time::Duration::from_millis(self.backoff_max_ms),
                multiplier: self.backoff_multiplier,
                widen_after: self.backoff_widen_after,
            },
        }
    }
}

/// Verification sweep settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub interval_secs: u64,
    pub min_age_secs: i64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            min_age_secs: 600,
            batch_size: 4,
            batch_delay_ms: 500,
        }
    }
}

impl SweepConfig {
    #[must_use]
    pub fn settings(&self, retention: chrono::Duration) -> SweepSettings {
        SweepSettings {
            interval: std::time::Duration::from_secs(self.interval_secs),
            min_age: chrono::Duration::seconds(self.min_age_secs),
            batch_size: self.batch_size,
            batch_delay: std::time::Duration::from_millis(self.batch_delay_ms),
            retention,
        }
    }
}

/// Listing store settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_url: String,
    /// Days sold/unlisted records are kept before the sweep purges them.
    pub retention_days: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "floorwatch.db".into(),
            retention_days: 14,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }
}

/// Reconciliation engine settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timing-guard tolerance for completed/removed events. Tuned to
    /// observed clock/ordering skew, not an upstream invariant.
    pub completed_tolerance_secs: i64,
    pub working_set_capacity: usize,
    pub terminal_capacity: usize,
    pub write_retries: u32,
    pub feed_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = EngineSettings::default();
        Self {
            completed_tolerance_secs: defaults.completed_tolerance.num_seconds(),
            working_set_capacity: defaults.working_set_capacity,
            terminal_capacity: defaults.terminal_capacity,
            write_retries: defaults.write_retries,
            feed_capacity: defaults.feed_capacity,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            completed_tolerance: chrono::Duration::seconds(self.completed_tolerance_secs),
            working_set_capacity: self.working_set_capacity,
            terminal_capacity: self.terminal_capacity,
            write_retries: self.write_retries,
            feed_capacity: self.feed_capacity,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or
    /// fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate_url("source.api_url", &self.source.api_url)?;
        validate_url("floor.price_api_url", &self.floor.price_api_url)?;

        if self.store.database_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "store.database_url",
            }
            .into());
        }
        if self.poller.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poller.interval_ms",
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.poller.max_batch_heights == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poller.max_batch_heights",
                reason: "must be positive".into(),
            }
            .into());
        }
        // A hung upstream call must not stall the next scheduled poll.
        if self.source.timeout_ms >= self.poller.interval_ms {
            return Err(ConfigError::InvalidValue {
                field: "source.timeout_ms",
                reason: format!(
                    "per-call timeout ({}ms) must be shorter than the poll interval ({}ms)",
                    self.source.timeout_ms, self.poller.interval_ms
                ),
            }
            .into());
        }
        if self.sweep.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep.batch_size",
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.engine.completed_tolerance_secs < 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.completed_tolerance_secs",
                reason: "must be non-negative".into(),
            }
            .into());
        }
        Ok(())
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ConfigError::MissingField { field }.into());
    }
    Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = Config::parse_toml(
            r#"
            [source]
            api_url = "https://ledger.example.net"
            "#,
        )
        .unwrap();

        assert_eq!(config.poller.interval_ms, 5_000);
        assert_eq!(config.engine.completed_tolerance_secs, 120);
        assert_eq!(config.store.retention_days, 14);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn invalid_url_is_rejected() {
        let result = Config::parse_toml(
            r#"
            [source]
            api_url = "not a url"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn timeout_longer_than_interval_is_rejected() {
        let result = Config::parse_toml(
            r#"
            [source]
            api_url = "https://ledger.example.net"
            timeout_ms = 10000

            [poller]
            interval_ms = 5000
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let result = Config::parse_toml(
            r#"
            [source]
            api_url = "https://ledger.example.net"

            [poller]
            interval_ms = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn settings_conversions_carry_values() {
        let config = Config::parse_toml(
            r#"
            [source]
            api_url = "https://ledger.example.net"
            start_offset = 25

            [poller]
            interval_ms = 2000

            [engine]
            completed_tolerance_secs = 60
            "#,
        )
        .unwrap();

        let poller = config.poller.settings(config.source.start_offset);
        assert_eq!(poller.interval, std::time::Duration::from_millis(2000));
        assert_eq!(poller.start_offset, 25);

        let engine = config.engine.settings();
        assert_eq!(engine.completed_tolerance, chrono::Duration::seconds(60));
    }
}
