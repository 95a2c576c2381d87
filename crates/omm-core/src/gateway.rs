//! Venue I/O traits.
//!
//! Strategy and execution code never talks to the venue directly; it
//! goes through these traits so tests can substitute an in-memory
//! gateway and the venue REST client stays in one place.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::market::BookSnapshot;
use crate::order::{ActionOutcome, OrderAction, RestingOrder};

/// Errors from venue REST calls.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(String),

    #[error("venue rejected request: {0}")]
    Rejected(String),

    #[error("malformed venue response: {0}")]
    MalformedResponse(String),
}

/// Order entry and account queries against the venue.
///
/// `submit_atomic_batch` must be all-or-nothing on the venue side; the
/// execution coordinator relies on that when it mixes cancels and
/// places in one batch.
pub trait ExchangeGateway: Send + Sync {
    /// Submit up to the venue's batch limit of actions atomically.
    /// Returns one outcome per action, in order.
    fn submit_atomic_batch(
        &self,
        actions: &[OrderAction],
    ) -> impl std::future::Future<Output = Result<Vec<ActionOutcome>, GatewayError>> + Send;

    /// Fetch every currently resting order for our account.
    fn fetch_resting_orders(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RestingOrder>, GatewayError>> + Send;

    /// Fetch the authoritative signed position in base units.
    fn fetch_position(
        &self,
    ) -> impl std::future::Future<Output = Result<Decimal, GatewayError>> + Send;
}

/// REST depth snapshot used by the two-phase book synchronizer.
pub trait BookSnapshotClient: Send + Sync {
    fn fetch_snapshot(
        &self,
    ) -> impl std::future::Future<Output = Result<BookSnapshot, GatewayError>> + Send;
}
