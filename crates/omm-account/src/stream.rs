//! Private account stream handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use omm_core::{ExchangeGateway, OrderSide, Price, Size};
use omm_stream::{StreamError, StreamHandler, StreamPolicy, StreamResult};

use crate::error::AccountError;
use crate::orders::OrderTable;
use crate::position::PositionTracker;

/// Connection settings for the private stream. The URL is expected to
/// carry the session/listen key; no subscribe message is needed.
#[derive(Debug, Clone)]
pub struct AccountStreamConfig {
    pub ws_url: String,
    pub stale_threshold: Duration,
    pub stale_check_interval: Duration,
    pub reconnect_delay: Duration,
}

impl AccountStreamConfig {
    pub fn stream_policy(&self) -> StreamPolicy {
        StreamPolicy {
            url: self.ws_url.clone(),
            name: "account".to_string(),
            stale_threshold: self.stale_threshold,
            stale_check_interval: self.stale_check_interval,
            reconnect_delay: self.reconnect_delay,
            keepalive: None,
        }
    }
}

/// Fill notification forwarded to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillEvent {
    pub oid: u64,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "e", rename_all = "camelCase")]
enum AccountMsg {
    OrderUpdate {
        oid: u64,
        side: OrderSide,
        price: String,
        size: String,
        status: OrderStatus,
    },
    Fill {
        oid: u64,
        side: OrderSide,
        price: String,
        size: String,
        full: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OrderStatus {
    Open,
    Cancelled,
    Filled,
    Rejected,
}

/// Applies private-stream events to the order table and forwards fills.
///
/// On every (re)connect the table and position are refetched wholesale
/// through the gateway; events that raced the refetch are reconciled by
/// the next periodic sync.
pub struct AccountStreamHandler<G> {
    gateway: Arc<G>,
    orders: Arc<OrderTable>,
    position: Arc<PositionTracker>,
    fill_tx: mpsc::UnboundedSender<FillEvent>,
    generation: Arc<AtomicU64>,
}

impl<G: ExchangeGateway + 'static> AccountStreamHandler<G> {
    pub fn new(
        gateway: Arc<G>,
        orders: Arc<OrderTable>,
        position: Arc<PositionTracker>,
    ) -> (Self, mpsc::UnboundedReceiver<FillEvent>) {
        let (fill_tx, fill_rx) = mpsc::unbounded_channel();
        (
            Self {
                gateway,
                orders,
                position,
                fill_tx,
                generation: Arc::new(AtomicU64::new(0)),
            },
            fill_rx,
        )
    }

    fn parse(text: &str) -> Result<AccountMsg, AccountError> {
        Ok(serde_json::from_str(text)?)
    }

    fn apply(&self, msg: AccountMsg) -> Result<(), AccountError> {
        match msg {
            AccountMsg::OrderUpdate {
                oid,
                side,
                price,
                size,
                status,
            } => {
                match status {
                    OrderStatus::Open => {
                        let price: Price = price.parse()?;
                        let size: Size = size.parse()?;
                        self.orders.confirm(oid, side, price, size);
                    }
                    OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Filled => {
                        self.orders.remove(oid);
                    }
                }
                Ok(())
            }
            AccountMsg::Fill {
                oid,
                side,
                price,
                size,
                full,
            } => {
                let price: Price = price.parse()?;
                let size: Size = size.parse()?;
                self.orders.apply_fill(oid, size, full);
                let _ = self.fill_tx.send(FillEvent {
                    oid,
                    side,
                    price,
                    size,
                });
                Ok(())
            }
        }
    }

    /// Refetch orders and position from REST, replacing local state.
    /// Results from a superseded connection generation are dropped.
    fn spawn_refetch(&self, generation: u64) {
        let gateway = self.gateway.clone();
        let orders = self.orders.clone();
        let position = self.position.clone();
        let current = self.generation.clone();

        tokio::spawn(async move {
            match gateway.fetch_resting_orders().await {
                Ok(fetched) => {
                    if current.load(Ordering::Acquire) == generation {
                        orders.replace_all(fetched);
                    }
                }
                Err(e) => warn!(error = %e, "resting order refetch failed"),
            }
            match gateway.fetch_position().await {
                Ok(server) => {
                    if current.load(Ordering::Acquire) == generation {
                        position.sync_authoritative(server);
                    }
                }
                Err(e) => warn!(error = %e, "position refetch failed"),
            }
        });
    }
}

impl<G: ExchangeGateway + 'static> StreamHandler for AccountStreamHandler<G> {
    fn subscriptions(&self) -> Vec<String> {
        // The session key rides in the URL; nothing to send.
        Vec::new()
    }

    async fn on_connected(&mut self, generation: u64) {
        self.generation.store(generation, Ordering::Release);
        self.spawn_refetch(generation);
    }

    async fn on_message(&mut self, text: &str) -> StreamResult<()> {
        let msg = match Self::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "non-account frame");
                return Err(StreamError::ParseError(e.to_string()));
            }
        };
        self.apply(msg)
            .map_err(|e| StreamError::ParseError(e.to_string()))
    }

    fn on_disconnected(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use omm_core::{ActionOutcome, GatewayError, OrderAction, RestingOrder};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct StubGateway {
        orders: Vec<RestingOrder>,
        position: Decimal,
    }

    impl ExchangeGateway for StubGateway {
        async fn submit_atomic_batch(
            &self,
            _actions: &[OrderAction],
        ) -> Result<Vec<ActionOutcome>, GatewayError> {
            Ok(vec![])
        }

        async fn fetch_resting_orders(&self) -> Result<Vec<RestingOrder>, GatewayError> {
            Ok(self.orders.clone())
        }

        async fn fetch_position(&self) -> Result<Decimal, GatewayError> {
            Ok(self.position)
        }
    }

    fn handler_with_stub(
        stub: StubGateway,
    ) -> (
        AccountStreamHandler<StubGateway>,
        Arc<OrderTable>,
        Arc<PositionTracker>,
        mpsc::UnboundedReceiver<FillEvent>,
    ) {
        let orders = Arc::new(OrderTable::new());
        let position = Arc::new(PositionTracker::new(dec!(0.0001)));
        let (handler, fill_rx) =
            AccountStreamHandler::new(Arc::new(stub), orders.clone(), position.clone());
        (handler, orders, position, fill_rx)
    }

    #[tokio::test]
    async fn test_order_update_confirms_and_removes() {
        let (mut handler, orders, _, _rx) = handler_with_stub(StubGateway {
            orders: vec![],
            position: Decimal::ZERO,
        });

        handler
            .on_message(r#"{"e":"orderUpdate","oid":5,"side":"buy","price":"100.5","size":"2","status":"open"}"#)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert!(!orders.snapshot()[0].provisional);

        handler
            .on_message(r#"{"e":"orderUpdate","oid":5,"side":"buy","price":"100.5","size":"2","status":"cancelled"}"#)
            .await
            .unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_fill_forwards_event_and_updates_table() {
        let (mut handler, orders, _, mut fill_rx) = handler_with_stub(StubGateway {
            orders: vec![],
            position: Decimal::ZERO,
        });
        orders.confirm(7, OrderSide::Sell, Price::new(dec!(101)), Size::new(dec!(2)));

        handler
            .on_message(r#"{"e":"fill","oid":7,"side":"sell","price":"101","size":"0.5","full":false}"#)
            .await
            .unwrap();

        let fill = fill_rx.recv().await.unwrap();
        assert_eq!(fill.side, OrderSide::Sell);
        assert_eq!(fill.size, Size::new(dec!(0.5)));
        assert_eq!(orders.snapshot()[0].size, Size::new(dec!(1.5)));
    }

    #[tokio::test]
    async fn test_reconnect_replaces_state_wholesale() {
        let server_orders = vec![RestingOrder {
            oid: 42,
            side: OrderSide::Buy,
            price: Price::new(dec!(99)),
            size: Size::new(dec!(1)),
            provisional: false,
        }];
        let (mut handler, orders, position, _rx) = handler_with_stub(StubGateway {
            orders: server_orders,
            position: dec!(0.75),
        });
        // Stale local state that should vanish on reconnect.
        orders.insert_provisional(1, OrderSide::Sell, Price::new(dec!(200)), Size::new(dec!(9)));

        handler.on_connected(1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = orders.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].oid, 42);
        assert_eq!(position.position(), dec!(0.75));
    }
}
