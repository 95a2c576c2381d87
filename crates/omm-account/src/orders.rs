//! Resting-order table.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use omm_core::{OrderSide, Price, RestingOrder, Size};

/// Shared view of every order we believe is resting on the venue.
///
/// The execution coordinator inserts provisional entries the moment a
/// place is acknowledged; the private stream confirms or removes them.
/// Reconnects replace the whole table from REST.
#[derive(Debug, Default)]
pub struct OrderTable {
    inner: RwLock<HashMap<u64, RestingOrder>>,
}

impl OrderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order just placed by us, pending stream confirmation.
    pub fn insert_provisional(&self, oid: u64, side: OrderSide, price: Price, size: Size) {
        self.inner.write().insert(
            oid,
            RestingOrder {
                oid,
                side,
                price,
                size,
                provisional: true,
            },
        );
    }

    /// Stream confirmed the order open; authoritative price/size win.
    pub fn confirm(&self, oid: u64, side: OrderSide, price: Price, size: Size) {
        self.inner.write().insert(
            oid,
            RestingOrder {
                oid,
                side,
                price,
                size,
                provisional: false,
            },
        );
    }

    pub fn remove(&self, oid: u64) -> Option<RestingOrder> {
        self.inner.write().remove(&oid)
    }

    /// Reduce remaining size after a fill; a full fill removes the order.
    pub fn apply_fill(&self, oid: u64, filled: Size, full: bool) {
        let mut inner = self.inner.write();
        if full {
            inner.remove(&oid);
            return;
        }
        if let Some(order) = inner.get_mut(&oid) {
            let remaining = order.size - filled;
            if remaining.is_positive() {
                order.size = remaining;
            } else {
                inner.remove(&oid);
            }
        }
    }

    /// Wholesale replacement from an authoritative REST fetch.
    pub fn replace_all(&self, orders: Vec<RestingOrder>) {
        let mut inner = self.inner.write();
        debug!(before = inner.len(), after = orders.len(), "order table replaced");
        inner.clear();
        for order in orders {
            inner.insert(order.oid, order);
        }
    }

    pub fn snapshot(&self) -> Vec<RestingOrder> {
        self.inner.read().values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
