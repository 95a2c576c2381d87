//! Application wiring and control loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use omm_account::{AccountStreamHandler, FillEvent, OrderTable, PositionTracker};
use omm_book::VenueBookHandler;
use omm_core::{now_ms, Bbo, ExchangeGateway, Price, PriceSample, Size};
use omm_exec::ExecutionCoordinator;
use omm_feed::ReferenceFeedAdapter;
use omm_mm::{compute_quotes, quote_mode, OffsetMedianEstimator, QuoteInputs, StrategyConfig};
use omm_stream::StreamSupervisor;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::venue::VenueRestClient;

/// Max skew between venue and reference observations for an offset
/// sample to be trusted.
const MAX_SAMPLE_SKEW: Duration = Duration::from_millis(1000);

/// Owns the stream tasks and the control loop.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Ok(Self { config })
    }

    /// Spawn the three stream supervisors and run the control loop
    /// until cancelled. Resting orders are cancelled on the way out.
    pub async fn run(self, cancel: CancellationToken) -> AppResult<()> {
        let gateway = Arc::new(VenueRestClient::new(
            &self.config.venue,
            self.config.symbol.venue_symbol.clone(),
        )?);
        let orders = Arc::new(OrderTable::new());
        let position = Arc::new(PositionTracker::new(self.config.strategy.drift_tolerance));

        let (feed_handler, reference_rx) = ReferenceFeedAdapter::new();
        let feed_task = spawn_supervised(
            StreamSupervisor::new(self.config.reference_feed_config().stream_policy()),
            feed_handler,
            cancel.clone(),
        );

        let book_config = self.config.venue_book_config();
        let (book_handler, bbo_rx) = VenueBookHandler::new(book_config.clone(), gateway.clone());
        let book_task = spawn_supervised(
            StreamSupervisor::new(book_config.stream_policy()),
            book_handler,
            cancel.clone(),
        );

        let (account_handler, fill_rx) =
            AccountStreamHandler::new(gateway.clone(), orders.clone(), position.clone());
        let account_task = spawn_supervised(
            StreamSupervisor::new(self.config.account_stream_config().stream_policy()),
            account_handler,
            cancel.clone(),
        );

        let estimator = OffsetMedianEstimator::new(
            self.config.strategy.fair_window_ms,
            Duration::from_secs(self.config.strategy.fair_warmup_secs),
        );
        let coordinator = ExecutionCoordinator::new(gateway.clone(), orders.clone());

        let mut engine = ControlLoop {
            strategy: self.config.strategy.clone(),
            tick: Price::new(self.config.symbol.tick_size),
            lot: Size::new(self.config.symbol.lot_size),
            order_sync_interval: Duration::from_secs(self.config.order_sync_interval_secs),
            status_interval: Duration::from_secs(self.config.status_interval_secs),
            gateway,
            orders,
            position,
            estimator,
            coordinator,
            reference_rx,
            bbo_rx,
            fill_rx,
            last_quote_at: None,
            last_bbo_at: None,
            quotes_pulled: false,
        };
        engine.run(cancel).await;

        let _ = tokio::join!(feed_task, book_task, account_task);
        info!("shutdown complete");
        Ok(())
    }
}

fn spawn_supervised<H: omm_stream::StreamHandler + 'static>(
    supervisor: StreamSupervisor,
    handler: H,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move { supervisor.run(handler, cancel).await })
}

struct ControlLoop<G: ExchangeGateway> {
    strategy: StrategyConfig,
    tick: Price,
    lot: Size,
    order_sync_interval: Duration,
    status_interval: Duration,
    gateway: Arc<G>,
    orders: Arc<OrderTable>,
    position: Arc<PositionTracker>,
    estimator: OffsetMedianEstimator,
    coordinator: ExecutionCoordinator<G>,
    reference_rx: watch::Receiver<Option<PriceSample>>,
    bbo_rx: watch::Receiver<Option<Bbo>>,
    fill_rx: mpsc::UnboundedReceiver<FillEvent>,
    /// None until the first quote pass; used for the update throttle.
    last_quote_at: Option<Instant>,
    /// When the venue BBO last changed; gates offset sampling.
    last_bbo_at: Option<Instant>,
    /// True while resting orders are known to be cancelled because
    /// quoting inputs went away; prevents repeated cancel-alls. Starts
    /// false so orders left behind by a previous run get pulled on the
    /// first pass without inputs.
    quotes_pulled: bool,
}

impl<G: ExchangeGateway> ControlLoop<G> {
    async fn run(&mut self, cancel: CancellationToken) {
        let mut sync_tick = interval(self.order_sync_interval);
        let mut status_tick = interval(self.status_interval);
        sync_tick.reset();
        status_tick.reset();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = self.coordinator.cancel_all().await {
                        warn!(error = %e, "cancel-all on shutdown failed");
                    }
                    return;
                }

                changed = self.reference_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    self.sample_offset();
                    self.requote().await;
                }

                changed = self.bbo_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if self.bbo_rx.borrow().is_some() {
                        self.last_bbo_at = Some(Instant::now());
                    } else {
                        self.last_bbo_at = None;
                    }
                    self.requote().await;
                }

                fill = self.fill_rx.recv() => {
                    match fill {
                        Some(fill) => {
                            self.position.apply_fill(fill.side, fill.size);
                            self.requote().await;
                        }
                        None => return,
                    }
                }

                _ = sync_tick.tick() => {
                    self.reconcile().await;
                }

                _ = status_tick.tick() => {
                    self.log_status();
                }
            }
        }
    }

    /// Record one venue-vs-reference offset, provided both
    /// observations are fresh enough to describe the same moment.
    fn sample_offset(&mut self) {
        let sample = match *self.reference_rx.borrow() {
            Some(sample) => sample,
            None => return,
        };
        let venue_mid = match self.bbo_rx.borrow().and_then(|bbo| bbo.mid()) {
            Some(mid) => mid,
            None => return,
        };
        let bbo_fresh = self
            .last_bbo_at
            .map(|at| at.elapsed() <= MAX_SAMPLE_SKEW)
            .unwrap_or(false);
        let sample_fresh = now_ms().saturating_sub(sample.ts_ms) <= MAX_SAMPLE_SKEW.as_millis() as u64;
        if bbo_fresh && sample_fresh {
            self.estimator.add_sample(venue_mid, sample.mid, sample.ts_ms);
        }
    }

    /// One strategy pass: throttle, price, diff, submit. When fair or
    /// the venue book is unavailable the quotes are pulled instead.
    async fn requote(&mut self) {
        if let Some(at) = self.last_quote_at {
            if at.elapsed() < Duration::from_millis(self.strategy.update_throttle_ms) {
                return;
            }
        }

        let bbo = *self.bbo_rx.borrow();
        let fair = self
            .reference_rx
            .borrow()
            .map(|s| s.mid)
            .and_then(|mid| self.estimator.fair_price(mid, now_ms()));

        let (fair, bbo) = match (fair, bbo) {
            (Some(fair), Some(bbo)) => (fair, bbo),
            _ => {
                self.pull_quotes().await;
                return;
            }
        };

        let position = self.position.position();
        let mode = quote_mode(position, fair, self.strategy.close_threshold_usd);
        let inputs = QuoteInputs {
            fair,
            mode,
            position,
            best_bid: Some(bbo.bid),
            best_ask: Some(bbo.ask),
        };
        let quotes = compute_quotes(&inputs, &self.strategy, self.tick, self.lot);

        self.last_quote_at = Some(Instant::now());
        self.quotes_pulled = false;
        if let Err(e) = self.coordinator.sync_orders(&quotes).await {
            warn!(error = %e, "order sync failed");
        }
    }

    async fn pull_quotes(&mut self) {
        if self.quotes_pulled {
            return;
        }
        info!("quoting inputs unavailable, pulling quotes");
        self.last_quote_at = Some(Instant::now());
        self.quotes_pulled = true;
        if let Err(e) = self.coordinator.cancel_all().await {
            warn!(error = %e, "cancel-all failed");
        }
    }

    /// Replace local order and position state with the server's view.
    async fn reconcile(&mut self) {
        match self.gateway.fetch_resting_orders().await {
            Ok(fetched) => self.orders.replace_all(fetched),
            Err(e) => warn!(error = %e, "order reconcile failed"),
        }
        match self.gateway.fetch_position().await {
            Ok(server) => self.position.sync_authoritative(server),
            Err(e) => warn!(error = %e, "position reconcile failed"),
        }
    }

    fn log_status(&self) {
        let reference_mid = self.reference_rx.borrow().map(|s| s.mid);
        let fair = reference_mid.and_then(|mid| self.estimator.fair_price(mid, now_ms()));
        let (warmup_elapsed, warmup_required) = self.estimator.warmup_progress();
        info!(
            fair = ?fair,
            reference = ?reference_mid,
            position = %self.position.position(),
            resting = self.orders.len(),
            samples = self.estimator.sample_count(),
            warmup_elapsed,
            warmup_required,
            "status"
        );
    }
}
