//! Venue depth-stream handler.
//!
//! Owns the [`BookSync`] machine behind a mutex shared with the
//! snapshot-fetch task, and publishes the live BBO through a `watch`
//! channel. `None` is published whenever the book is not provably
//! continuous.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use omm_core::{Bbo, BookSnapshotClient, Price, Size};
use omm_stream::{StreamError, StreamHandler, StreamPolicy, StreamResult};

use crate::error::BookError;
use crate::sync::{BookSync, Delta, DeltaAction, SnapshotResult};

/// Connection settings for the venue depth stream.
#[derive(Debug, Clone)]
pub struct VenueBookConfig {
    pub ws_url: String,
    pub symbol: String,
    pub stale_threshold: Duration,
    pub stale_check_interval: Duration,
    pub reconnect_delay: Duration,
    /// Delay between snapshot fetch retries after a failure.
    pub snapshot_retry_delay: Duration,
}

impl VenueBookConfig {
    pub fn stream_policy(&self) -> StreamPolicy {
        StreamPolicy {
            url: self.ws_url.clone(),
            name: "venue-book".to_string(),
            stale_threshold: self.stale_threshold,
            stale_check_interval: self.stale_check_interval,
            reconnect_delay: self.reconnect_delay,
            keepalive: None,
        }
    }
}

/// Incremental depth payload; `U`/`u` bound the sequence range and
/// levels arrive as decimal-string pairs.
#[derive(Debug, Deserialize)]
struct DepthMsg {
    #[serde(rename = "U")]
    first_seq: u64,
    #[serde(rename = "u")]
    last_seq: u64,
    #[serde(rename = "b", default)]
    bids: Vec<(String, String)>,
    #[serde(rename = "a", default)]
    asks: Vec<(String, String)>,
}

struct Shared {
    sync: Mutex<BookSync>,
    bbo_tx: watch::Sender<Option<Bbo>>,
    generation: AtomicU64,
    fetch_inflight: AtomicBool,
}

/// Stream handler for the venue L2 feed.
pub struct VenueBookHandler<C> {
    config: VenueBookConfig,
    snapshot_client: Arc<C>,
    shared: Arc<Shared>,
}

impl<C: BookSnapshotClient + 'static> VenueBookHandler<C> {
    pub fn new(
        config: VenueBookConfig,
        snapshot_client: Arc<C>,
    ) -> (Self, watch::Receiver<Option<Bbo>>) {
        let (bbo_tx, bbo_rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            sync: Mutex::new(BookSync::new()),
            bbo_tx,
            generation: AtomicU64::new(0),
            fetch_inflight: AtomicBool::new(false),
        });
        (
            Self {
                config,
                snapshot_client,
                shared,
            },
            bbo_rx,
        )
    }

    fn parse_delta(text: &str) -> Result<Delta, BookError> {
        let msg: DepthMsg = serde_json::from_str(text)?;
        let parse_side = |levels: Vec<(String, String)>| -> Result<Vec<(Price, Size)>, BookError> {
            levels
                .into_iter()
                .map(|(p, s)| Ok((p.parse::<Price>()?, s.parse::<Size>()?)))
                .collect()
        };
        Ok(Delta {
            first_seq: msg.first_seq,
            last_seq: msg.last_seq,
            bids: parse_side(msg.bids)?,
            asks: parse_side(msg.asks)?,
        })
    }

    /// Fetch a snapshot in the background and feed it to the machine.
    /// At most one fetch runs at a time; results from a previous
    /// connection generation are discarded.
    fn spawn_snapshot_fetch(&self, generation: u64) {
        Self::spawn_fetch_task(
            self.shared.clone(),
            self.snapshot_client.clone(),
            self.config.snapshot_retry_delay,
            generation,
        );
    }

    fn spawn_fetch_task(
        shared: Arc<Shared>,
        client: Arc<C>,
        retry_delay: Duration,
        generation: u64,
    ) {
        if shared
            .fetch_inflight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        tokio::spawn(async move {
            loop {
                if shared.generation.load(Ordering::Acquire) != generation {
                    break;
                }
                match client.fetch_snapshot().await {
                    Ok(snapshot) => {
                        let result = {
                            let mut sync = shared.sync.lock();
                            if shared.generation.load(Ordering::Acquire) != generation {
                                break;
                            }
                            sync.snapshot_requested();
                            let result = sync.on_snapshot(snapshot);
                            let _ = shared.bbo_tx.send(sync.bbo());
                            result
                        };
                        match result {
                            SnapshotResult::Live => break,
                            SnapshotResult::Gap => {
                                // Deltas keep flowing into the buffer; try again
                                // once the stream has had a moment to catch up.
                                tokio::time::sleep(retry_delay).await;
                                continue;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "snapshot fetch failed, retrying");
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
            shared.fetch_inflight.store(false, Ordering::Release);
            // A reconnect that raced this fetch lost the inflight gate,
            // so its snapshot is still owed; pick it up here.
            let current = shared.generation.load(Ordering::Acquire);
            if current != generation {
                Self::spawn_fetch_task(shared, client, retry_delay, current);
            }
        });
    }
}

impl<C: BookSnapshotClient + 'static> StreamHandler for VenueBookHandler<C> {
    fn subscriptions(&self) -> Vec<String> {
        vec![format!(
            r#"{{"method":"SUBSCRIBE","params":["{}@depth"],"id":1}}"#,
            self.config.symbol.to_lowercase()
        )]
    }

    async fn on_connected(&mut self, generation: u64) {
        self.shared.generation.store(generation, Ordering::Release);
        {
            let mut sync = self.shared.sync.lock();
            sync.start_sync();
        }
        let _ = self.shared.bbo_tx.send(None);
        self.spawn_snapshot_fetch(generation);
    }

    async fn on_message(&mut self, text: &str) -> StreamResult<()> {
        let delta = match Self::parse_delta(text) {
            Ok(delta) => delta,
            Err(e) => {
                // Subscribe acks and other non-delta frames land here.
                debug!(error = %e, "non-delta frame");
                return Err(StreamError::ParseError(e.to_string()));
            }
        };

        let (action, bbo) = {
            let mut sync = self.shared.sync.lock();
            let action = sync.on_delta(delta);
            (action, sync.bbo())
        };

        match action {
            DeltaAction::Applied => {
                let _ = self.shared.bbo_tx.send(bbo);
            }
            DeltaAction::ResyncNeeded => {
                let _ = self.shared.bbo_tx.send(None);
                let generation = self.shared.generation.load(Ordering::Acquire);
                self.spawn_snapshot_fetch(generation);
            }
            DeltaAction::Buffered | DeltaAction::Ignored => {}
        }
        Ok(())
    }

    fn on_disconnected(&mut self) {
        let _ = self.shared.bbo_tx.send(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omm_core::{BookSnapshot, GatewayError};
    use rust_decimal_macros::dec;

    struct FixedSnapshot(BookSnapshot);

    impl BookSnapshotClient for FixedSnapshot {
        async fn fetch_snapshot(&self) -> Result<BookSnapshot, GatewayError> {
            Ok(self.0.clone())
        }
    }

    fn test_config() -> VenueBookConfig {
        VenueBookConfig {
            ws_url: "wss://venue.invalid/ws".to_string(),
            symbol: "BTCUSD".to_string(),
            stale_threshold: Duration::from_secs(30),
            stale_check_interval: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(3),
            snapshot_retry_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_parse_delta() {
        let raw = r#"{"U":101,"u":102,"b":[["99.5","1.2"],["99.0","0"]],"a":[["100.5","0.8"]]}"#;
        let delta = VenueBookHandler::<FixedSnapshot>::parse_delta(raw).unwrap();
        assert_eq!(delta.first_seq, 101);
        assert_eq!(delta.last_seq, 102);
        assert_eq!(delta.bids[0], (Price::new(dec!(99.5)), Size::new(dec!(1.2))));
        assert_eq!(delta.bids[1].1, Size::ZERO);
        assert_eq!(delta.asks.len(), 1);
    }

    #[test]
    fn test_subscription_message() {
        let client = Arc::new(FixedSnapshot(BookSnapshot {
            seq: 1,
            bids: vec![],
            asks: vec![],
        }));
        let (handler, _rx) = VenueBookHandler::new(test_config(), client);
        let subs = handler.subscriptions();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].contains("btcusd@depth"));
    }

    #[tokio::test]
    async fn test_connect_syncs_and_goes_live() {
        let client = Arc::new(FixedSnapshot(BookSnapshot {
            seq: 100,
            bids: vec![(Price::new(dec!(99)), Size::new(dec!(1)))],
            asks: vec![(Price::new(dec!(101)), Size::new(dec!(1)))],
        }));
        let (mut handler, mut rx) = VenueBookHandler::new(test_config(), client);

        handler.on_connected(1).await;
        // Snapshot task runs on the spawned future.
        rx.changed().await.ok();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let bbo = rx.borrow_and_update().clone();
        let bbo = match bbo {
            Some(b) => b,
            None => {
                // First publish may be the reset; wait for the live one.
                rx.changed().await.ok();
                rx.borrow().clone().unwrap()
            }
        };
        assert_eq!(bbo.bid, Price::new(dec!(99)));
        assert_eq!(bbo.ask, Price::new(dec!(101)));
        assert_eq!(bbo.seq, 100);
    }

    struct GatedSnapshot {
        snapshot: BookSnapshot,
        gate: Arc<tokio::sync::Semaphore>,
    }

    impl BookSnapshotClient for GatedSnapshot {
        async fn fetch_snapshot(&self) -> Result<BookSnapshot, GatewayError> {
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
            Ok(self.snapshot.clone())
        }
    }

    #[tokio::test]
    async fn test_reconnect_during_inflight_fetch_still_goes_live() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let client = Arc::new(GatedSnapshot {
            snapshot: BookSnapshot {
                seq: 100,
                bids: vec![(Price::new(dec!(99)), Size::new(dec!(1)))],
                asks: vec![(Price::new(dec!(101)), Size::new(dec!(1)))],
            },
            gate: gate.clone(),
        });
        let (mut handler, mut rx) = VenueBookHandler::new(test_config(), client);

        // First connection's fetch parks on the gate.
        handler.on_connected(1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Reconnect while that fetch is still in flight, then let the
        // snapshot endpoint answer.
        handler.on_disconnected();
        handler.on_connected(2).await;
        gate.add_permits(10);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        let bbo = loop {
            if let Some(bbo) = *rx.borrow_and_update() {
                break bbo;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "book never went live after the reconnect"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert_eq!(bbo.seq, 100);
        assert_eq!(bbo.bid, Price::new(dec!(99)));
        assert_eq!(bbo.ask, Price::new(dec!(101)));
    }

    #[tokio::test]
    async fn test_disconnect_clears_bbo() {
        let client = Arc::new(FixedSnapshot(BookSnapshot {
            seq: 100,
            bids: vec![(Price::new(dec!(99)), Size::new(dec!(1)))],
            asks: vec![(Price::new(dec!(101)), Size::new(dec!(1)))],
        }));
        let (mut handler, rx) = VenueBookHandler::new(test_config(), client);

        handler.on_connected(1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        handler.on_disconnected();
        assert!(rx.borrow().is_none());
    }
}
