//! Order, quote, and execution-action types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Price, Size};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1 for buy, -1 for sell (for position deltas).
    pub fn sign(&self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// A desired resting order produced by the quote generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
}

impl Quote {
    pub fn new(side: OrderSide, price: Price, size: Size) -> Self {
        Self { side, price, size }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {}", self.side, self.size, self.price)
    }
}

/// An order known (or believed) to be resting on the venue book.
///
/// `provisional` is set when the order was placed by us but not yet
/// confirmed by the private stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub oid: u64,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub provisional: bool,
}

impl RestingOrder {
    /// True when this order already sits exactly where a target quote wants one.
    pub fn matches(&self, quote: &Quote) -> bool {
        self.side == quote.side && self.price == quote.price && self.size == quote.size
    }
}

/// One element of an atomic batch sent to the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    /// Place a post-only limit order.
    Place {
        side: OrderSide,
        price: Price,
        size: Size,
    },
    /// Cancel a resting order by venue order id.
    Cancel { oid: u64 },
}

impl OrderAction {
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel { .. })
    }
}

/// Per-action result of an atomic batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Place accepted; the venue assigned this order id.
    Placed { oid: u64 },
    /// Cancel accepted.
    Cancelled,
    /// Action rejected by the venue.
    Rejected { reason: String },
}
