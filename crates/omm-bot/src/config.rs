//! Application configuration.
//!
//! Loaded from a TOML file; every field carries a default so a minimal
//! (or missing) file still produces a runnable configuration for the
//! default symbol.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use omm_account::AccountStreamConfig;
use omm_book::VenueBookConfig;
use omm_feed::ReferenceFeedConfig;
use omm_mm::StrategyConfig;

use crate::error::{AppError, AppResult};

/// Traded instrument and its venue grid.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    /// Symbol on the quoted venue.
    #[serde(default = "default_venue_symbol")]
    pub venue_symbol: String,
    /// Symbol on the reference exchange (lowercase stream style).
    #[serde(default = "default_reference_symbol")]
    pub reference_symbol: String,
    #[serde(default = "default_tick_size")]
    pub tick_size: Decimal,
    #[serde(default = "default_lot_size")]
    pub lot_size: Decimal,
}

fn default_venue_symbol() -> String {
    "BTCUSD".to_string()
}

fn default_reference_symbol() -> String {
    "btcusdt".to_string()
}

fn default_tick_size() -> Decimal {
    dec!(0.01)
}

fn default_lot_size() -> Decimal {
    dec!(0.001)
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            venue_symbol: default_venue_symbol(),
            reference_symbol: default_reference_symbol(),
            tick_size: default_tick_size(),
            lot_size: default_lot_size(),
        }
    }
}

/// WebSocket endpoints and resilience timings.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "default_reference_ws_base")]
    pub reference_ws_base: String,
    #[serde(default = "default_venue_ws_url")]
    pub venue_ws_url: String,
    #[serde(default = "default_account_ws_url")]
    pub account_ws_url: String,
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: u64,
    #[serde(default = "default_stale_check_interval_ms")]
    pub stale_check_interval_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_snapshot_retry_delay_ms")]
    pub snapshot_retry_delay_ms: u64,
}

fn default_reference_ws_base() -> String {
    "wss://stream.binance.com:9443/ws".to_string()
}

fn default_venue_ws_url() -> String {
    "wss://api.venue.example/ws/market".to_string()
}

fn default_account_ws_url() -> String {
    "wss://api.venue.example/ws/account".to_string()
}

fn default_stale_threshold_ms() -> u64 {
    60_000
}

fn default_stale_check_interval_ms() -> u64 {
    10_000
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_snapshot_retry_delay_ms() -> u64 {
    1_000
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            reference_ws_base: default_reference_ws_base(),
            venue_ws_url: default_venue_ws_url(),
            account_ws_url: default_account_ws_url(),
            stale_threshold_ms: default_stale_threshold_ms(),
            stale_check_interval_ms: default_stale_check_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            snapshot_retry_delay_ms: default_snapshot_retry_delay_ms(),
        }
    }
}

/// Venue REST endpoint and credentials.
///
/// The API key may be omitted from the file and supplied via the
/// `OMM_API_KEY` environment variable instead.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_rest_base_url() -> String {
    "https://api.venue.example".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl VenueConfig {
    /// Config value first, environment second.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OMM_API_KEY").ok())
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub symbol: SymbolConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
    #[serde(default)]
    pub venue: VenueConfig,
    /// Authoritative position/order reconcile cadence.
    #[serde(default = "default_order_sync_interval_secs")]
    pub order_sync_interval_secs: u64,
    /// Periodic status log cadence.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

fn default_order_sync_interval_secs() -> u64 {
    30
}

fn default_status_interval_secs() -> u64 {
    60
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file does
    /// not exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(%path, "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read config: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse config: {e}")))
    }

    pub fn reference_feed_config(&self) -> ReferenceFeedConfig {
        let mut cfg = ReferenceFeedConfig::new(format!(
            "{}/{}@bookTicker",
            self.streams.reference_ws_base, self.symbol.reference_symbol
        ));
        cfg.stale_threshold = Duration::from_millis(self.streams.stale_threshold_ms);
        cfg.stale_check_interval = Duration::from_millis(self.streams.stale_check_interval_ms);
        cfg.reconnect_delay = Duration::from_millis(self.streams.reconnect_delay_ms);
        cfg
    }

    pub fn venue_book_config(&self) -> VenueBookConfig {
        VenueBookConfig {
            ws_url: self.streams.venue_ws_url.clone(),
            symbol: self.symbol.venue_symbol.clone(),
            stale_threshold: Duration::from_millis(self.streams.stale_threshold_ms),
            stale_check_interval: Duration::from_millis(self.streams.stale_check_interval_ms),
            reconnect_delay: Duration::from_millis(self.streams.reconnect_delay_ms),
            snapshot_retry_delay: Duration::from_millis(self.streams.snapshot_retry_delay_ms),
        }
    }

    pub fn account_stream_config(&self) -> AccountStreamConfig {
        AccountStreamConfig {
            ws_url: self.streams.account_ws_url.clone(),
            stale_threshold: Duration::from_millis(self.streams.stale_threshold_ms),
            stale_check_interval: Duration::from_millis(self.streams.stale_check_interval_ms),
            reconnect_delay: Duration::from_millis(self.streams.reconnect_delay_ms),
        }
    }
}
