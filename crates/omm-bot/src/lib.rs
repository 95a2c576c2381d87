//! Engine binary: configuration, venue REST client, and the control
//! loop that ties feed, book, account, strategy, and execution
//! together.

pub mod app;
pub mod config;
pub mod error;
pub mod venue;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
