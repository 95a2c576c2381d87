//! Strategy parameters.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Quoting parameters, deserialized from the `[strategy]` config
/// section. Every field has a default so a minimal config file works.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Half-spread in basis points applied on each side of fair.
    #[serde(default = "default_spread_bps")]
    pub spread_bps: Decimal,
    /// Target notional per quote.
    #[serde(default = "default_order_size_usd")]
    pub order_size_usd: Decimal,
    /// Absolute position notional at which quoting flips to Closing.
    #[serde(default = "default_close_threshold_usd")]
    pub close_threshold_usd: Decimal,
    /// Distance from fair for the reduce-only quote in Closing mode.
    #[serde(default = "default_take_profit_bps")]
    pub take_profit_bps: Decimal,
    /// Minimum time between quote updates.
    #[serde(default = "default_update_throttle_ms")]
    pub update_throttle_ms: u64,
    /// Trailing window for offset samples.
    #[serde(default = "default_fair_window_ms")]
    pub fair_window_ms: u64,
    /// Wall time before the estimator may price.
    #[serde(default = "default_fair_warmup_secs")]
    pub fair_warmup_secs: u64,
    /// Position drift beyond this logs a warning at reconcile.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: Decimal,
}

fn default_spread_bps() -> Decimal {
    dec!(5)
}

fn default_order_size_usd() -> Decimal {
    dec!(100)
}

fn default_close_threshold_usd() -> Decimal {
    dec!(10)
}

fn default_take_profit_bps() -> Decimal {
    dec!(2)
}

fn default_update_throttle_ms() -> u64 {
    100
}

fn default_fair_window_ms() -> u64 {
    300_000
}

fn default_fair_warmup_secs() -> u64 {
    60
}

fn default_drift_tolerance() -> Decimal {
    dec!(0.0001)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            spread_bps: default_spread_bps(),
            order_size_usd: default_order_size_usd(),
            close_threshold_usd: default_close_threshold_usd(),
            take_profit_bps: default_take_profit_bps(),
            update_throttle_ms: default_update_throttle_ms(),
            fair_window_ms: default_fair_window_ms(),
            fair_warmup_secs: default_fair_warmup_secs(),
            drift_tolerance: default_drift_tolerance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_section_uses_defaults() {
        let cfg: StrategyConfig = toml_from_str("");
        assert_eq!(cfg.spread_bps, dec!(5));
        assert_eq!(cfg.order_size_usd, dec!(100));
        assert_eq!(cfg.update_throttle_ms, 100);
    }

    #[test]
    fn test_partial_override() {
        let cfg: StrategyConfig = toml_from_str("spread_bps = 8\nupdate_throttle_ms = 250\n");
        assert_eq!(cfg.spread_bps, dec!(8));
        assert_eq!(cfg.update_throttle_ms, 250);
        assert_eq!(cfg.close_threshold_usd, dec!(10));
    }

    fn toml_from_str(s: &str) -> StrategyConfig {
        toml::from_str(s).unwrap()
    }
}
