//! Account state synchronization.
//!
//! Mirrors our resting orders and signed position from the venue's
//! private stream. Fills update both optimistically; every reconnect
//! and every periodic reconcile replaces local state wholesale with an
//! authoritative REST fetch, never merging across a gap.

pub mod error;
pub mod orders;
pub mod position;
pub mod stream;

pub use error::{AccountError, AccountResult};
pub use orders::OrderTable;
pub use position::PositionTracker;
pub use stream::{AccountStreamConfig, AccountStreamHandler, FillEvent};
