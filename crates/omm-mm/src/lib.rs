//! Market-making strategy: fair-price estimation, inventory mode
//! selection, and quote generation. Everything here is pure
//! computation; I/O stays in the stream and execution crates.

pub mod config;
pub mod fair;
pub mod inventory;
pub mod quote;

pub use config::StrategyConfig;
pub use fair::OffsetMedianEstimator;
pub use inventory::{quote_mode, QuoteMode};
pub use quote::{compute_quotes, QuoteInputs};
