//! Inventory mode selection.

use rust_decimal::Decimal;

use omm_core::{OrderSide, Price};

/// How the engine is currently quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    /// Two-sided quoting around fair.
    Normal,
    /// Inventory too large; quote only the reducing side.
    Closing,
}

impl QuoteMode {
    /// The single side quoted in Closing mode, None for a flat book.
    pub fn reducing_side(position: Decimal) -> Option<OrderSide> {
        if position.is_sign_positive() && !position.is_zero() {
            Some(OrderSide::Sell)
        } else if position.is_sign_negative() {
            Some(OrderSide::Buy)
        } else {
            None
        }
    }
}

/// Mode from current position notional. The threshold compare is
/// strict-at-the-boundary: notional exactly at the threshold closes.
/// No hysteresis; the requote throttle bounds any flapping.
pub fn quote_mode(position: Decimal, fair: Price, close_threshold_usd: Decimal) -> QuoteMode {
    let position_usd = (position * fair.inner()).abs();
    if position_usd >= close_threshold_usd {
        QuoteMode::Closing
    } else {
        QuoteMode::Normal
    }
}
