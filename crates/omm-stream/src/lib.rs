//! Stream resilience layer.
//!
//! Every WebSocket the engine consumes (reference feed, venue book,
//! private account stream) runs under a [`StreamSupervisor`] which
//! handles connect, resubscribe, staleness detection, keepalive, and
//! reconnection with a fixed delay. Protocol logic lives in the
//! per-stream [`StreamHandler`] implementations.

pub mod error;
pub mod supervisor;

pub use error::{StreamError, StreamResult};
pub use supervisor::{
    KeepalivePolicy, StreamHandler, StreamPolicy, StreamStatus, StreamSupervisor,
};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
