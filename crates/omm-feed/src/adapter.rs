//! bookTicker stream handler publishing the latest reference price.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;

use omm_core::{now_ms, Price, PriceSample};
use omm_stream::{KeepalivePolicy, StreamError, StreamHandler, StreamPolicy, StreamResult};

use crate::error::FeedError;

/// Reference venue keepalive and staleness defaults.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);
pub const PONG_TIMEOUT: Duration = Duration::from_secs(10);
pub const STALE_THRESHOLD: Duration = Duration::from_secs(60);
pub const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(10);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Connection settings for the reference feed.
#[derive(Debug, Clone)]
pub struct ReferenceFeedConfig {
    /// Full stream URL, e.g. `wss://stream.example.com/ws/btcusdt@bookTicker`.
    pub ws_url: String,
    pub stale_threshold: Duration,
    pub stale_check_interval: Duration,
    pub reconnect_delay: Duration,
}

impl ReferenceFeedConfig {
    pub fn new(ws_url: String) -> Self {
        Self {
            ws_url,
            stale_threshold: STALE_THRESHOLD,
            stale_check_interval: STALE_CHECK_INTERVAL,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn stream_policy(&self) -> StreamPolicy {
        StreamPolicy {
            url: self.ws_url.clone(),
            name: "reference-feed".to_string(),
            stale_threshold: self.stale_threshold,
            stale_check_interval: self.stale_check_interval,
            reconnect_delay: self.reconnect_delay,
            keepalive: Some(KeepalivePolicy {
                ping_interval: PING_INTERVAL,
                pong_timeout: PONG_TIMEOUT,
            }),
        }
    }
}

/// Raw bookTicker payload; prices arrive as decimal strings.
#[derive(Debug, Deserialize)]
struct BookTickerMsg<'a> {
    #[serde(rename = "b")]
    bid: &'a str,
    #[serde(rename = "a")]
    ask: &'a str,
}

/// Publishes the latest reference top-of-book via `watch`.
pub struct ReferenceFeedAdapter {
    tx: watch::Sender<Option<PriceSample>>,
}

impl ReferenceFeedAdapter {
    pub fn new() -> (Self, watch::Receiver<Option<PriceSample>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    fn parse(text: &str) -> Result<PriceSample, FeedError> {
        let msg: BookTickerMsg<'_> = serde_json::from_str(text)?;
        let bid: Price = msg.bid.parse()?;
        let ask: Price = msg.ask.parse()?;
        PriceSample::from_book_ticker(bid, ask, now_ms())
            .ok_or_else(|| FeedError::MalformedPayload(format!("bid {} / ask {}", bid, ask)))
    }
}

impl StreamHandler for ReferenceFeedAdapter {
    fn subscriptions(&self) -> Vec<String> {
        // The bookTicker endpoint is a raw stream; the URL is the subscription.
        Vec::new()
    }

    async fn on_connected(&mut self, _generation: u64) {}

    async fn on_message(&mut self, text: &str) -> StreamResult<()> {
        match Self::parse(text) {
            Ok(sample) => {
                let _ = self.tx.send(Some(sample));
                Ok(())
            }
            Err(e) => Err(StreamError::ParseError(e.to_string())),
        }
    }

    fn on_disconnected(&mut self) {
        // Stale reference prices must not feed the estimator.
        let _ = self.tx.send(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_book_ticker() {
        let raw = r#"{"u":400900217,"s":"BTCUSDT","b":"25.35190000","B":"31.21","a":"25.36520000","A":"40.66"}"#;
        let sample = ReferenceFeedAdapter::parse(raw).unwrap();
        assert_eq!(sample.bid, Price::new(dec!(25.3519)));
        assert_eq!(sample.ask, Price::new(dec!(25.3652)));
        assert_eq!(sample.mid, Price::new(dec!(25.35855)));
    }

    #[test]
    fn test_parse_rejects_crossed_book() {
        let raw = r#"{"b":"26.0","a":"25.0"}"#;
        assert!(ReferenceFeedAdapter::parse(raw).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ReferenceFeedAdapter::parse("not json").is_err());
        assert!(ReferenceFeedAdapter::parse(r#"{"b":"x","a":"1"}"#).is_err());
    }

    #[tokio::test]
    async fn test_disconnect_resets_to_none() {
        let (mut adapter, rx) = ReferenceFeedAdapter::new();
        adapter
            .on_message(r#"{"b":"100.0","a":"100.5"}"#)
            .await
            .unwrap();
        assert!(rx.borrow().is_some());

        adapter.on_disconnected();
        assert!(rx.borrow().is_none());
    }
}
