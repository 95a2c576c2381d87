//! Quote computation.
//!
//! Pure function from fair price, mode, position, and venue top-of-book
//! to target quotes. Bid prices floor to tick and ask prices ceil, so
//! rounding always widens the quoted spread, and both sides are clamped
//! one tick inside the venue book so we never cross it.

use rust_decimal::Decimal;

use omm_core::{OrderSide, Price, Quote, Size};

use crate::config::StrategyConfig;
use crate::inventory::QuoteMode;

const BPS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Everything the generator needs for one pass.
#[derive(Debug, Clone, Copy)]
pub struct QuoteInputs {
    pub fair: Price,
    pub mode: QuoteMode,
    /// Signed base-unit position, used for Closing side and size cap.
    pub position: Decimal,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
}

/// Compute target quotes: two in Normal mode, at most one in Closing.
/// Sides whose size rounds to zero are omitted.
pub fn compute_quotes(
    inputs: &QuoteInputs,
    cfg: &StrategyConfig,
    tick: Price,
    lot: Size,
) -> Vec<Quote> {
    if !inputs.fair.is_positive() {
        return Vec::new();
    }
    match inputs.mode {
        QuoteMode::Normal => normal_quotes(inputs, cfg, tick, lot),
        QuoteMode::Closing => closing_quote(inputs, cfg, tick, lot),
    }
}

fn normal_quotes(
    inputs: &QuoteInputs,
    cfg: &StrategyConfig,
    tick: Price,
    lot: Size,
) -> Vec<Quote> {
    let size = order_size(cfg.order_size_usd, inputs.fair, lot);
    if size.is_zero() {
        return Vec::new();
    }

    let spread = cfg.spread_bps / BPS;
    let bid = quote_price(inputs, OrderSide::Buy, spread, tick);
    let ask = quote_price(inputs, OrderSide::Sell, spread, tick);

    let mut quotes = Vec::with_capacity(2);
    if bid.is_positive() {
        quotes.push(Quote::new(OrderSide::Buy, bid, size));
    }
    quotes.push(Quote::new(OrderSide::Sell, ask, size));
    quotes
}

fn closing_quote(
    inputs: &QuoteInputs,
    cfg: &StrategyConfig,
    tick: Price,
    lot: Size,
) -> Vec<Quote> {
    let side = match QuoteMode::reducing_side(inputs.position) {
        Some(side) => side,
        None => return Vec::new(),
    };

    let capped = order_size(cfg.order_size_usd, inputs.fair, lot)
        .min(Size::new(inputs.position.abs()))
        .floor_to_lot(lot);
    if capped.is_zero() {
        return Vec::new();
    }

    let distance = cfg.take_profit_bps / BPS;
    let price = quote_price(inputs, side, distance, tick);
    if side == OrderSide::Buy && !price.is_positive() {
        return Vec::new();
    }
    vec![Quote::new(side, price, capped)]
}

/// Price one side at `distance` (a fraction) from fair, rounded away
/// from the spread and clamped one tick inside the venue book.
fn quote_price(inputs: &QuoteInputs, side: OrderSide, distance: Decimal, tick: Price) -> Price {
    match side {
        OrderSide::Buy => {
            let raw = (inputs.fair * (Decimal::ONE - distance)).floor_to_tick(tick);
            match inputs.best_ask {
                Some(best_ask) => raw.min(best_ask - tick),
                None => raw,
            }
        }
        OrderSide::Sell => {
            let raw = (inputs.fair * (Decimal::ONE + distance)).ceil_to_tick(tick);
            match inputs.best_bid {
                Some(best_bid) => raw.max(best_bid + tick),
                None => raw,
            }
        }
    }
}

fn order_size(order_size_usd: Decimal, fair: Price, lot: Size) -> Size {
    Size::new(order_size_usd / fair.inner()).round_to_lot(lot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cfg() -> StrategyConfig {
        StrategyConfig::default()
    }

    fn tick() -> Price {
        Price::new(dec!(0.01))
    }

    fn lot() -> Size {
        Size::new(dec!(0.001))
    }

    fn inputs(fair: Decimal, bid: Decimal, ask: Decimal) -> QuoteInputs {
        QuoteInputs {
            fair: Price::new(fair),
            mode: QuoteMode::Normal,
            position: Decimal::ZERO,
            best_bid: Some(Price::new(bid)),
            best_ask: Some(Price::new(ask)),
        }
    }

    #[test]
    fn test_normal_two_sided_around_fair() {
        // spread_bps = 5: bid at fair * 0.9995, ask at fair * 1.0005.
        let quotes = compute_quotes(&inputs(dec!(100), dec!(99), dec!(101)), &cfg(), tick(), lot());
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].side, OrderSide::Buy);
        assert_eq!(quotes[0].price, Price::new(dec!(99.95)));
        assert_eq!(quotes[1].side, OrderSide::Sell);
        assert_eq!(quotes[1].price, Price::new(dec!(100.05)));
        // 100 USD / 100 = 1 unit per side.
        assert_eq!(quotes[0].size, Size::new(dec!(1)));
    }

    #[test]
    fn test_bid_floors_and_ask_ceils_to_tick() {
        // fair = 100.003: raw bid 99.952985, raw ask 100.053015.
        let quotes = compute_quotes(
            &inputs(dec!(100.003), dec!(99), dec!(101)),
            &cfg(),
            tick(),
            lot(),
        );
        assert_eq!(quotes[0].price, Price::new(dec!(99.95)));
        assert_eq!(quotes[1].price, Price::new(dec!(100.06)));
    }

    #[test]
    fn test_anti_cross_clamp() {
        // Fair far above the venue book: raw bid would cross the ask.
        let quotes = compute_quotes(
            &inputs(dec!(110), dec!(100.00), dec!(100.02)),
            &cfg(),
            tick(),
            lot(),
        );
        // bid = min(raw, best_ask - tick) = 100.01.
        assert_eq!(quotes[0].price, Price::new(dec!(100.01)));

        // Fair far below: raw ask would cross the bid.
        let quotes = compute_quotes(
            &inputs(dec!(90), dec!(100.00), dec!(100.02)),
            &cfg(),
            tick(),
            lot(),
        );
        // ask = max(raw, best_bid + tick) = 100.01.
        assert_eq!(quotes[1].price, Price::new(dec!(100.01)));
    }

    #[test]
    fn test_missing_book_side_skips_clamp() {
        let mut i = inputs(dec!(100), dec!(99), dec!(101));
        i.best_ask = None;
        i.best_bid = None;
        let quotes = compute_quotes(&i, &cfg(), tick(), lot());
        assert_eq!(quotes[0].price, Price::new(dec!(99.95)));
        assert_eq!(quotes[1].price, Price::new(dec!(100.05)));
    }

    #[test]
    fn test_size_rounds_to_nearest_lot() {
        // 100 USD / 76.1 = 1.3140...; nearest 0.001 lot is 1.314.
        let quotes = compute_quotes(
            &inputs(dec!(76.1), dec!(76), dec!(76.2)),
            &cfg(),
            tick(),
            lot(),
        );
        assert_eq!(quotes[0].size, Size::new(dec!(1.314)));
    }

    #[test]
    fn test_zero_size_omits_quotes() {
        // 100 USD at fair 1_000_000 rounds to zero lots.
        let quotes = compute_quotes(
            &inputs(dec!(1000000), dec!(999999), dec!(1000001)),
            &cfg(),
            tick(),
            Size::new(dec!(1)),
        );
        assert!(quotes.is_empty());
    }

    #[test]
    fn test_closing_long_quotes_only_sell() {
        let mut i = inputs(dec!(100), dec!(99), dec!(101));
        i.mode = QuoteMode::Closing;
        i.position = dec!(0.25);
        let quotes = compute_quotes(&i, &cfg(), tick(), lot());
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].side, OrderSide::Sell);
        // take_profit_bps = 2: 100 * 1.0002 = 100.02.
        assert_eq!(quotes[0].price, Price::new(dec!(100.02)));
        // Size capped at |position|, not the 1.0 the notional allows.
        assert_eq!(quotes[0].size, Size::new(dec!(0.25)));
    }

    #[test]
    fn test_closing_short_quotes_only_buy() {
        let mut i = inputs(dec!(100), dec!(99), dec!(101));
        i.mode = QuoteMode::Closing;
        i.position = dec!(-2);
        let quotes = compute_quotes(&i, &cfg(), tick(), lot());
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].side, OrderSide::Buy);
        assert_eq!(quotes[0].price, Price::new(dec!(99.98)));
        // Notional allows 1.0, well under the 2.0 position.
        assert_eq!(quotes[0].size, Size::new(dec!(1)));
    }

    #[test]
    fn test_closing_flat_position_quotes_nothing() {
        let mut i = inputs(dec!(100), dec!(99), dec!(101));
        i.mode = QuoteMode::Closing;
        assert!(compute_quotes(&i, &cfg(), tick(), lot()).is_empty());
    }
}
