//! Reference feed adapter.
//!
//! Consumes the reference exchange's best-bid/ask (bookTicker) stream
//! and publishes the latest [`PriceSample`] through a `watch` channel.
//! The published value drops back to `None` on every disconnect so
//! downstream consumers never quote off a stale reference price.

pub mod adapter;
pub mod error;

pub use adapter::{ReferenceFeedAdapter, ReferenceFeedConfig};
pub use error::{FeedError, FeedResult};
