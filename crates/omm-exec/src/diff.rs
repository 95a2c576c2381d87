//! Resting-order vs target diff.

use omm_core::{Quote, RestingOrder};

/// The work needed to move the book from `resting` to `targets`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderDiff {
    /// Venue order ids to cancel.
    pub cancels: Vec<u64>,
    /// Quotes with no matching resting order.
    pub places: Vec<Quote>,
}

impl OrderDiff {
    pub fn is_empty(&self) -> bool {
        self.cancels.is_empty() && self.places.is_empty()
    }

    pub fn action_count(&self) -> usize {
        self.cancels.len() + self.places.len()
    }
}

/// Match resting orders to targets by exact (side, price, size); each
/// order matches at most one target and vice versa. Anything resting
/// without a match is cancelled, any target without a match is placed.
pub fn diff_orders(resting: &[RestingOrder], targets: &[Quote]) -> OrderDiff {
    let mut matched = vec![false; resting.len()];
    let mut places = Vec::new();

    for target in targets {
        let found = resting
            .iter()
            .enumerate()
            .find(|(i, order)| !matched[*i] && order.matches(target));
        match found {
            Some((i, _)) => matched[i] = true,
            None => places.push(*target),
        }
    }

    let cancels = resting
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched[*i])
        .map(|(_, order)| order.oid)
        .collect();

    OrderDiff { cancels, places }
}
