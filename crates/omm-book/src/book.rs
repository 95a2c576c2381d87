//! Depth-limited L2 order book.

use std::collections::BTreeMap;

use omm_core::{Bbo, Price, Size};

/// Levels kept per side. Deeper levels are dropped after every update.
pub const MAX_LEVELS: usize = 100;

/// L2 book with price-keyed sides. Level updates carry the absolute
/// size at that price; zero removes the level.
#[derive(Debug, Default, Clone)]
pub struct OrderBook {
    bids: BTreeMap<Price, Size>,
    asks: BTreeMap<Price, Size>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Replace a batch of levels on both sides, then trim.
    pub fn apply_levels(&mut self, bids: &[(Price, Size)], asks: &[(Price, Size)]) {
        for &(price, size) in bids {
            if size.is_zero() {
                self.bids.remove(&price);
            } else {
                self.bids.insert(price, size);
            }
        }
        for &(price, size) in asks {
            if size.is_zero() {
                self.asks.remove(&price);
            } else {
                self.asks.insert(price, size);
            }
        }
        self.trim();
    }

    /// Drop levels beyond MAX_LEVELS from the worse end of each side.
    fn trim(&mut self) {
        while self.bids.len() > MAX_LEVELS {
            self.bids.pop_first();
        }
        while self.asks.len() > MAX_LEVELS {
            self.asks.pop_last();
        }
    }

    pub fn best_bid(&self) -> Option<(Price, Size)> {
        self.bids.last_key_value().map(|(p, s)| (*p, *s))
    }

    pub fn best_ask(&self) -> Option<(Price, Size)> {
        self.asks.first_key_value().map(|(p, s)| (*p, *s))
    }

    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    /// Top of book stamped with the given sequence number, None when
    /// either side is empty.
    pub fn bbo(&self, seq: u64) -> Option<Bbo> {
        let (bid, bid_size) = self.best_bid()?;
        let (ask, ask_size) = self.best_ask()?;
        Some(Bbo {
            bid,
            bid_size,
            ask,
            ask_size,
            seq,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn p(v: rust_decimal::Decimal) -> Price {
        Price::new(v)
    }

    fn s(v: rust_decimal::Decimal) -> Size {
        Size::new(v)
    }

    #[test]
    fn test_best_levels() {
        let mut book = OrderBook::new();
        book.apply_levels(
            &[(p(dec!(99)), s(dec!(1))), (p(dec!(98)), s(dec!(2)))],
            &[(p(dec!(101)), s(dec!(3))), (p(dec!(102)), s(dec!(4)))],
        );
        assert_eq!(book.best_bid(), Some((p(dec!(99)), s(dec!(1)))));
        assert_eq!(book.best_ask(), Some((p(dec!(101)), s(dec!(3)))));
    }

    #[test]
    fn test_zero_size_removes_level() {
        let mut book = OrderBook::new();
        book.apply_levels(&[(p(dec!(99)), s(dec!(1)))], &[]);
        book.apply_levels(&[(p(dec!(99)), s(dec!(0)))], &[]);
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_trim_keeps_best_levels() {
        let mut book = OrderBook::new();
        let bids: Vec<_> = (1..=150)
            .map(|i| (p(rust_decimal::Decimal::from(i)), s(dec!(1))))
            .collect();
        let asks: Vec<_> = (1000..1150)
            .map(|i| (p(rust_decimal::Decimal::from(i)), s(dec!(1))))
            .collect();
        book.apply_levels(&bids, &asks);

        let (bid_depth, ask_depth) = book.depth();
        assert_eq!(bid_depth, MAX_LEVELS);
        assert_eq!(ask_depth, MAX_LEVELS);
        // Best levels survive; worst are dropped.
        assert_eq!(book.best_bid().unwrap().0, p(dec!(150)));
        assert_eq!(book.best_ask().unwrap().0, p(dec!(1000)));
    }

    #[test]
    fn test_bbo_none_when_one_sided() {
        let mut book = OrderBook::new();
        book.apply_levels(&[(p(dec!(99)), s(dec!(1)))], &[]);
        assert!(book.bbo(1).is_none());
    }
}
