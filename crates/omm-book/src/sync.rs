//! Two-phase sync state machine.
//!
//! Pure and synchronous: connection handling and snapshot fetching live
//! in [`crate::stream`], which drives this machine and reacts to the
//! actions it returns.

use std::collections::VecDeque;

use tracing::{debug, warn};

use omm_core::{Bbo, BookSnapshot, Price, Size};

use crate::book::OrderBook;

/// Buffered deltas beyond this force a resync instead of growing
/// without bound while a snapshot fetch is stuck.
const MAX_BUFFERED_DELTAS: usize = 10_000;

/// One incremental book update covering sequences
/// `first_seq..=last_seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub first_seq: u64,
    pub last_seq: u64,
    pub bids: Vec<(Price, Size)>,
    pub asks: Vec<(Price, Size)>,
}

/// Where the book stands in the sync procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Never connected.
    Unsynced,
    /// Subscribed, buffering deltas, snapshot not yet requested.
    Buffering,
    /// Snapshot fetch in flight, still buffering.
    Syncing,
    /// Continuity proven; deltas applied directly.
    Live,
    /// Gap detected; buffering again while a fresh snapshot is fetched.
    Resyncing,
}

/// What the driver must do after feeding a delta in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaAction {
    /// Delta stored for replay after the snapshot arrives.
    Buffered,
    /// Delta applied to the live book; BBO may have changed.
    Applied,
    /// Stale or pre-subscription delta, dropped.
    Ignored,
    /// Gap detected; the driver must fetch a fresh snapshot.
    ResyncNeeded,
}

/// Outcome of loading a snapshot and replaying the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotResult {
    /// Book is live.
    Live,
    /// Replay hit a gap; fetch another snapshot.
    Gap,
}

/// Gap-safe book synchronizer for a single symbol.
#[derive(Debug)]
pub struct BookSync {
    state: SyncState,
    book: OrderBook,
    buffer: VecDeque<Delta>,
    last_applied: u64,
}

impl BookSync {
    pub fn new() -> Self {
        Self {
            state: SyncState::Unsynced,
            book: OrderBook::new(),
            buffer: VecDeque::new(),
            last_applied: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Top of book, only while live.
    pub fn bbo(&self) -> Option<Bbo> {
        if self.state != SyncState::Live {
            return None;
        }
        self.book.bbo(self.last_applied)
    }

    /// Begin (or restart) the two-phase procedure after a (re)connect.
    /// Everything known about the book is discarded.
    pub fn start_sync(&mut self) {
        self.book.clear();
        self.buffer.clear();
        self.last_applied = 0;
        self.state = SyncState::Buffering;
    }

    /// Mark that a snapshot fetch is in flight.
    pub fn snapshot_requested(&mut self) {
        if matches!(self.state, SyncState::Buffering) {
            self.state = SyncState::Syncing;
        }
    }

    /// Feed one delta from the stream.
    pub fn on_delta(&mut self, delta: Delta) -> DeltaAction {
        match self.state {
            SyncState::Unsynced => DeltaAction::Ignored,
            SyncState::Buffering | SyncState::Syncing | SyncState::Resyncing => {
                if self.buffer.len() >= MAX_BUFFERED_DELTAS {
                    warn!(
                        buffered = self.buffer.len(),
                        "delta buffer overflow, forcing resync"
                    );
                    self.enter_resync();
                    self.buffer.push_back(delta);
                    return DeltaAction::ResyncNeeded;
                }
                self.buffer.push_back(delta);
                DeltaAction::Buffered
            }
            SyncState::Live => {
                if delta.last_seq <= self.last_applied {
                    return DeltaAction::Ignored;
                }
                if delta.first_seq > self.last_applied + 1 {
                    warn!(
                        expected = self.last_applied + 1,
                        got = delta.first_seq,
                        "sequence gap on live book"
                    );
                    self.enter_resync();
                    self.buffer.push_back(delta);
                    return DeltaAction::ResyncNeeded;
                }
                self.apply(&delta);
                DeltaAction::Applied
            }
        }
    }

    /// Load a REST snapshot and replay the buffered deltas.
    pub fn on_snapshot(&mut self, snapshot: BookSnapshot) -> SnapshotResult {
        self.book.clear();
        self.book.apply_levels(&snapshot.bids, &snapshot.asks);
        self.last_applied = snapshot.seq;

        let buffered = std::mem::take(&mut self.buffer);
        for delta in buffered {
            if delta.last_seq <= self.last_applied {
                // Already covered by the snapshot.
                continue;
            }
            if delta.first_seq > self.last_applied + 1 {
                warn!(
                    snapshot_seq = snapshot.seq,
                    expected = self.last_applied + 1,
                    got = delta.first_seq,
                    "gap in buffered deltas, snapshot unusable"
                );
                self.enter_resync();
                return SnapshotResult::Gap;
            }
            self.apply(&delta);
        }

        debug!(seq = self.last_applied, "book live");
        self.state = SyncState::Live;
        SnapshotResult::Live
    }

    fn apply(&mut self, delta: &Delta) {
        self.book.apply_levels(&delta.bids, &delta.asks);
        self.last_applied = delta.last_seq;
    }

    fn enter_resync(&mut self) {
        self.book.clear();
        self.buffer.clear();
        self.last_applied = 0;
        self.state = SyncState::Resyncing;
    }
}

impl Default for BookSync {
    fn default() -> Self {
        Self::new()
    }
}
