//! Market data samples shared between feed, book, and strategy.

use serde::{Deserialize, Serialize};

use crate::{Price, Size};

/// Best bid/offer emitted by the venue book synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bbo {
    pub bid: Price,
    pub bid_size: Size,
    pub ask: Price,
    pub ask_size: Size,
    /// Sequence number of the last delta applied to the book.
    pub seq: u64,
}

impl Bbo {
    /// Mid price, None when either side is non-positive or crossed.
    pub fn mid(&self) -> Option<Price> {
        if !self.bid.is_positive() || !self.ask.is_positive() || self.bid > self.ask {
            return None;
        }
        Some(Price::new((self.bid.inner() + self.ask.inner()) / rust_decimal::Decimal::TWO))
    }
}

/// One top-of-book observation from the reference exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSample {
    pub bid: Price,
    pub ask: Price,
    pub mid: Price,
    /// Local receive time, Unix milliseconds.
    pub ts_ms: u64,
}

impl PriceSample {
    pub fn from_book_ticker(bid: Price, ask: Price, ts_ms: u64) -> Option<Self> {
        if !bid.is_positive() || !ask.is_positive() || bid > ask {
            return None;
        }
        let mid = Price::new((bid.inner() + ask.inner()) / rust_decimal::Decimal::TWO);
        Some(Self { bid, ask, mid, ts_ms })
    }
}

/// Full-depth snapshot fetched over REST during book sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    pub seq: u64,
    pub bids: Vec<(Price, Size)>,
    pub asks: Vec<(Price, Size)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bbo_mid() {
        let bbo = Bbo {
            bid: Price::new(dec!(99)),
            bid_size: Size::new(dec!(1)),
            ask: Price::new(dec!(101)),
            ask_size: Size::new(dec!(2)),
            seq: 1,
        };
        assert_eq!(bbo.mid(), Some(Price::new(dec!(100))));
    }

    #[test]
    fn test_crossed_sample_rejected() {
        let bid = Price::new(dec!(101));
        let ask = Price::new(dec!(100));
        assert!(PriceSample::from_book_ticker(bid, ask, 0).is_none());
    }

    #[test]
    fn test_sample_mid() {
        let s = PriceSample::from_book_ticker(
            Price::new(dec!(100.0)),
            Price::new(dec!(100.5)),
            42,
        )
        .unwrap();
        assert_eq!(s.mid, Price::new(dec!(100.25)));
        assert_eq!(s.ts_ms, 42);
    }
}
