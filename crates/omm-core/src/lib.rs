//! Shared types for the omm market-making engine.
//!
//! Everything that crosses a crate boundary lives here: precise decimal
//! price/size newtypes, order and quote types, market data samples, and
//! the gateway traits that isolate venue I/O from strategy logic.

pub mod decimal;
pub mod error;
pub mod gateway;
pub mod market;
pub mod order;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use gateway::{BookSnapshotClient, ExchangeGateway, GatewayError};
pub use market::{Bbo, BookSnapshot, PriceSample};
pub use order::{ActionOutcome, OrderAction, OrderSide, Quote, RestingOrder};

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
