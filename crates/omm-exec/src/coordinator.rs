//! Batch submission and table bookkeeping.

use std::sync::Arc;

use tracing::{debug, info, warn};

use omm_account::OrderTable;
use omm_core::{ActionOutcome, ExchangeGateway, OrderAction, Quote};

use crate::diff::diff_orders;
use crate::error::{ExecError, ExecResult};

/// Venue limit on actions per atomic batch.
pub const MAX_BATCH_ACTIONS: usize = 4;

/// Moves the venue book toward the strategy's target quotes.
pub struct ExecutionCoordinator<G> {
    gateway: Arc<G>,
    orders: Arc<OrderTable>,
}

impl<G: ExchangeGateway> ExecutionCoordinator<G> {
    pub fn new(gateway: Arc<G>, orders: Arc<OrderTable>) -> Self {
        Self { gateway, orders }
    }

    /// Diff resting orders against `targets` and submit the difference.
    /// An empty diff returns without touching the network.
    pub async fn sync_orders(&self, targets: &[Quote]) -> ExecResult<()> {
        let resting = self.orders.snapshot();
        let diff = diff_orders(&resting, targets);
        if diff.is_empty() {
            return Ok(());
        }
        debug!(
            cancels = diff.cancels.len(),
            places = diff.places.len(),
            "order diff"
        );

        // Cancels first so the freed margin is available to the places.
        let mut actions: Vec<OrderAction> = diff
            .cancels
            .iter()
            .map(|&oid| OrderAction::Cancel { oid })
            .collect();
        actions.extend(diff.places.iter().map(|q| OrderAction::Place {
            side: q.side,
            price: q.price,
            size: q.size,
        }));

        self.submit_chunked(&actions).await
    }

    /// Cancel every resting order, then clear the table. Used at
    /// shutdown and when quoting inputs go stale.
    pub async fn cancel_all(&self) -> ExecResult<()> {
        let resting = self.orders.snapshot();
        if resting.is_empty() {
            return Ok(());
        }
        info!(count = resting.len(), "cancelling all resting orders");

        let actions: Vec<OrderAction> = resting
            .iter()
            .map(|order| OrderAction::Cancel { oid: order.oid })
            .collect();
        let result = self.submit_chunked(&actions).await;
        self.orders.clear();
        result
    }

    async fn submit_chunked(&self, actions: &[OrderAction]) -> ExecResult<()> {
        for chunk in actions.chunks(MAX_BATCH_ACTIONS) {
            let outcomes = self.gateway.submit_atomic_batch(chunk).await?;
            if outcomes.len() != chunk.len() {
                return Err(ExecError::OutcomeMismatch {
                    sent: chunk.len(),
                    got: outcomes.len(),
                });
            }
            for (action, outcome) in chunk.iter().zip(outcomes) {
                self.apply_outcome(action, outcome);
            }
        }
        Ok(())
    }

    fn apply_outcome(&self, action: &OrderAction, outcome: ActionOutcome) {
        match (action, outcome) {
            (OrderAction::Place { side, price, size }, ActionOutcome::Placed { oid }) => {
                // Marked provisional until the private stream confirms it.
                self.orders.insert_provisional(oid, *side, *price, *size);
            }
            (OrderAction::Cancel { oid }, ActionOutcome::Cancelled) => {
                self.orders.remove(*oid);
            }
            (action, ActionOutcome::Rejected { reason }) => {
                // Leave the table alone; the next reconcile sorts it out.
                warn!(?action, %reason, "action rejected");
            }
            (action, outcome) => {
                warn!(?action, ?outcome, "mismatched batch outcome");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omm_core::{GatewayError, OrderSide, Price, RestingOrder, Size};
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Records submitted batches and assigns sequential order ids.
    struct MockGateway {
        batches: Mutex<Vec<Vec<OrderAction>>>,
        next_oid: Mutex<u64>,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                next_oid: Mutex::new(100),
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().iter().map(|b| b.len()).collect()
        }
    }

    impl ExchangeGateway for MockGateway {
        async fn submit_atomic_batch(
            &self,
            actions: &[OrderAction],
        ) -> Result<Vec<ActionOutcome>, GatewayError> {
            self.batches.lock().push(actions.to_vec());
            let outcomes = actions
                .iter()
                .map(|action| match action {
                    OrderAction::Place { .. } => {
                        let mut next = self.next_oid.lock();
                        *next += 1;
                        ActionOutcome::Placed { oid: *next }
                    }
                    OrderAction::Cancel { .. } => ActionOutcome::Cancelled,
                })
                .collect();
            Ok(outcomes)
        }

        async fn fetch_resting_orders(&self) -> Result<Vec<RestingOrder>, GatewayError> {
            Ok(vec![])
        }

        async fn fetch_position(&self) -> Result<Decimal, GatewayError> {
            Ok(Decimal::ZERO)
        }
    }

    fn setup() -> (Arc<MockGateway>, Arc<OrderTable>, ExecutionCoordinator<MockGateway>) {
        let gateway = Arc::new(MockGateway::new());
        let orders = Arc::new(OrderTable::new());
        let coordinator = ExecutionCoordinator::new(gateway.clone(), orders.clone());
        (gateway, orders, coordinator)
    }

    fn quote(side: OrderSide, price: Decimal) -> Quote {
        Quote::new(side, Price::new(price), Size::new(dec!(1)))
    }

    #[tokio::test]
    async fn test_matching_targets_skip_the_network() {
        let (gateway, orders, coordinator) = setup();
        orders.confirm(1, OrderSide::Buy, Price::new(dec!(99.95)), Size::new(dec!(1)));
        orders.confirm(2, OrderSide::Sell, Price::new(dec!(100.05)), Size::new(dec!(1)));

        let targets = vec![
            quote(OrderSide::Buy, dec!(99.95)),
            quote(OrderSide::Sell, dec!(100.05)),
        ];
        coordinator.sync_orders(&targets).await.unwrap();
        assert!(gateway.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_places_become_provisional_orders() {
        let (_, orders, coordinator) = setup();
        let targets = vec![
            quote(OrderSide::Buy, dec!(99.95)),
            quote(OrderSide::Sell, dec!(100.05)),
        ];
        coordinator.sync_orders(&targets).await.unwrap();

        let snapshot = orders.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|o| o.provisional));
    }

    #[tokio::test]
    async fn test_ten_actions_chunk_as_4_4_2() {
        let (gateway, orders, coordinator) = setup();
        // 6 resting orders to cancel plus 4 fresh targets = 10 actions.
        for oid in 1..=6 {
            orders.confirm(
                oid,
                OrderSide::Buy,
                Price::new(Decimal::from(90 + oid)),
                Size::new(dec!(1)),
            );
        }
        let targets: Vec<Quote> = (0..4)
            .map(|i| quote(OrderSide::Sell, dec!(101) + Decimal::from(i)))
            .collect();

        coordinator.sync_orders(&targets).await.unwrap();
        assert_eq!(gateway.batch_sizes(), vec![4, 4, 2]);

        // Cancels ride at the front of the action list.
        let first = gateway.batches.lock()[0].clone();
        assert!(first.iter().all(|a| a.is_cancel()));
    }

    #[tokio::test]
    async fn test_cancel_all_empties_the_table() {
        let (gateway, orders, coordinator) = setup();
        for oid in 1..=5 {
            orders.confirm(
                oid,
                OrderSide::Sell,
                Price::new(Decimal::from(100 + oid)),
                Size::new(dec!(1)),
            );
        }
        coordinator.cancel_all().await.unwrap();
        assert!(orders.is_empty());
        assert_eq!(gateway.batch_sizes(), vec![4, 1]);
    }

    #[tokio::test]
    async fn test_cancel_all_on_empty_table_is_a_noop() {
        let (gateway, _, coordinator) = setup();
        coordinator.cancel_all().await.unwrap();
        assert!(gateway.batches.lock().is_empty());
    }
}
