//! WebSocket supervision: connect, resubscribe, staleness, keepalive,
//! and reconnection with a fixed delay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{StreamError, StreamResult};

/// Application-level ping/pong settings for venues that require them.
#[derive(Debug, Clone, Copy)]
pub struct KeepalivePolicy {
    /// How often to send a ping frame.
    pub ping_interval: Duration,
    /// How long to wait for the matching pong before tearing down.
    pub pong_timeout: Duration,
}

/// Connection lifecycle settings for one supervised stream.
#[derive(Debug, Clone)]
pub struct StreamPolicy {
    /// WebSocket URL.
    pub url: String,
    /// Human-readable stream name for logging.
    pub name: String,
    /// Max silence before the connection is considered dead.
    pub stale_threshold: Duration,
    /// How often to run the staleness check.
    pub stale_check_interval: Duration,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Optional keepalive pings.
    pub keepalive: Option<KeepalivePolicy>,
}

/// Externally observable connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Connecting,
    Connected,
    Reconnecting,
}

/// Protocol logic for one stream. The supervisor owns the socket; the
/// handler owns the meaning of the bytes.
pub trait StreamHandler: Send {
    /// Subscribe messages sent immediately after the socket opens.
    fn subscriptions(&self) -> Vec<String>;

    /// Called once per (re)connect after subscriptions are sent.
    ///
    /// `generation` increments on every connect; handlers that launch
    /// side work (snapshot fetches, refetches) stamp it on the work and
    /// discard results from an older generation.
    fn on_connected(
        &mut self,
        generation: u64,
    ) -> impl std::future::Future<Output = ()> + Send;

    /// One inbound text frame. Parse failures should be returned, not
    /// panicked; the supervisor logs them and keeps the connection.
    fn on_message(
        &mut self,
        text: &str,
    ) -> impl std::future::Future<Output = StreamResult<()>> + Send;

    /// Called when the connection drops, before any reconnect.
    fn on_disconnected(&mut self);
}

/// Why a live session ended.
enum SessionEnd {
    Cancelled,
    Closed,
    Stale,
    KeepaliveTimeout,
    TransportError(StreamError),
}

/// Runs one stream handler under a reconnecting supervisor.
pub struct StreamSupervisor {
    policy: StreamPolicy,
    status_tx: watch::Sender<StreamStatus>,
    generation: Arc<AtomicU64>,
}

impl StreamSupervisor {
    pub fn new(policy: StreamPolicy) -> Self {
        let (status_tx, _) = watch::channel(StreamStatus::Connecting);
        Self {
            policy,
            status_tx,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to connection status changes.
    pub fn status(&self) -> watch::Receiver<StreamStatus> {
        self.status_tx.subscribe()
    }

    /// Generation of the most recent connect.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Drives the handler until cancelled. Never returns early on
    /// transport errors; those trigger a fixed-delay reconnect.
    pub async fn run<H: StreamHandler>(&self, mut handler: H, cancel: CancellationToken) {
        let mut first = true;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let status = if first {
                StreamStatus::Connecting
            } else {
                StreamStatus::Reconnecting
            };
            let _ = self.status_tx.send(status);
            first = false;

            match self.run_session(&mut handler, &cancel).await {
                SessionEnd::Cancelled => return,
                SessionEnd::Closed => {
                    info!(stream = %self.policy.name, "connection closed by peer");
                }
                SessionEnd::Stale => {
                    warn!(
                        stream = %self.policy.name,
                        threshold = ?self.policy.stale_threshold,
                        "stream stale, reconnecting"
                    );
                }
                SessionEnd::KeepaliveTimeout => {
                    warn!(stream = %self.policy.name, "pong timeout, reconnecting");
                }
                SessionEnd::TransportError(e) => {
                    warn!(stream = %self.policy.name, error = %e, "transport error, reconnecting");
                }
            }

            handler.on_disconnected();
            let _ = self.status_tx.send(StreamStatus::Reconnecting);

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.policy.reconnect_delay) => {}
            }
        }
    }

    async fn run_session<H: StreamHandler>(
        &self,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let (ws, _) = match connect_async(self.policy.url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                return SessionEnd::TransportError(StreamError::ConnectionFailed(e.to_string()));
            }
        };
        let (mut write, mut read) = ws.split();

        for sub in handler.subscriptions() {
            if let Err(e) = write.send(Message::Text(sub)).await {
                return SessionEnd::TransportError(StreamError::SendFailed(e.to_string()));
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        handler.on_connected(generation).await;
        let _ = self.status_tx.send(StreamStatus::Connected);
        info!(stream = %self.policy.name, generation, "connected");

        let mut last_message = Instant::now();
        let mut pong_deadline: Option<Instant> = None;

        let mut stale_check = interval(self.policy.stale_check_interval);
        stale_check.reset();
        let ping_period = self
            .policy
            .keepalive
            .map(|k| k.ping_interval)
            .unwrap_or(Duration::from_secs(3600));
        let mut ping_tick = interval(ping_period);
        ping_tick.reset();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Cancelled;
                }

                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_message = Instant::now();
                        if let Err(e) = handler.on_message(&text).await {
                            debug!(stream = %self.policy.name, error = %e, "message dropped");
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        last_message = Instant::now();
                        if let Err(e) = write.send(Message::Pong(payload)).await {
                            return SessionEnd::TransportError(StreamError::SendFailed(
                                e.to_string(),
                            ));
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_message = Instant::now();
                        pong_deadline = None;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {
                        // Binary/frame messages are not part of any protocol we speak.
                        last_message = Instant::now();
                    }
                    Some(Err(e)) => {
                        return SessionEnd::TransportError(e.into());
                    }
                },

                _ = stale_check.tick() => {
                    if last_message.elapsed() > self.policy.stale_threshold {
                        return SessionEnd::Stale;
                    }
                    if let Some(deadline) = pong_deadline {
                        if Instant::now() > deadline {
                            return SessionEnd::KeepaliveTimeout;
                        }
                    }
                }

                _ = ping_tick.tick(), if self.policy.keepalive.is_some() => {
                    if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                        return SessionEnd::TransportError(StreamError::SendFailed(e.to_string()));
                    }
                    if let Some(k) = self.policy.keepalive {
                        if pong_deadline.is_none() {
                            pong_deadline = Some(Instant::now() + k.pong_timeout);
                        }
                    }
                }
            }
        }
    }
}
