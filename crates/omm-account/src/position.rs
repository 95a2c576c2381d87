//! Signed position tracking.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{info, warn};

use omm_core::{OrderSide, Size};

/// Tracks the signed base-unit position: optimistic fills from the
/// private stream, periodically overwritten by the authoritative
/// server value.
#[derive(Debug)]
pub struct PositionTracker {
    position: RwLock<Decimal>,
    drift_tolerance: Decimal,
}

impl PositionTracker {
    pub fn new(drift_tolerance: Decimal) -> Self {
        Self {
            position: RwLock::new(Decimal::ZERO),
            drift_tolerance,
        }
    }

    /// Signed position in base units; positive is long.
    pub fn position(&self) -> Decimal {
        *self.position.read()
    }

    /// Apply a fill delta: buys add, sells subtract.
    pub fn apply_fill(&self, side: OrderSide, size: Size) {
        let mut position = self.position.write();
        let delta = size.inner() * Decimal::from(side.sign());
        *position += delta;
        info!(%delta, position = %*position, "fill applied");
    }

    /// Overwrite with the server's value. Drift beyond the tolerance
    /// means we missed a fill somewhere and is worth a warning; the
    /// server value wins either way.
    pub fn sync_authoritative(&self, server: Decimal) {
        let mut position = self.position.write();
        let drift = (*position - server).abs();
        if drift > self.drift_tolerance {
            warn!(local = %*position, %server, %drift, "position drift, adopting server value");
        }
        *position = server;
    }
}
