//! Diff-based order execution.
//!
//! Each strategy pass produces target quotes; the coordinator diffs
//! them against the resting-order table and submits only the
//! difference, as atomic batches of cancels and post-only places. An
//! empty diff costs nothing on the wire.

pub mod coordinator;
pub mod diff;
pub mod error;

pub use coordinator::{ExecutionCoordinator, MAX_BATCH_ACTIONS};
pub use diff::{diff_orders, OrderDiff};
pub use error::{ExecError, ExecResult};
