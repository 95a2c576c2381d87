//! Gap-safe venue order-book synchronization.
//!
//! Implements the standard two-phase L2 sync: subscribe first, buffer
//! deltas, fetch a REST snapshot, discard buffered deltas at or below
//! the snapshot sequence, replay the rest in strict order, then go
//! live. Any sequence gap, buffered or live, throws the book away and
//! restarts the procedure. A book that cannot prove continuity
//! publishes no BBO.

pub mod book;
pub mod error;
pub mod stream;
pub mod sync;

pub use book::{OrderBook, MAX_LEVELS};
pub use error::{BookError, BookResult};
pub use stream::{VenueBookConfig, VenueBookHandler};
pub use sync::{BookSync, Delta, DeltaAction, SnapshotResult, SyncState};
