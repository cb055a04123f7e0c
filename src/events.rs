//! Append-only event log
//!
//! Events enter the log in commit order (never submission order) and are
//! immutable once appended. Two read paths:
//!
//! - [`EventLog::cursor`] - lazy, forward-only replay restartable from a
//!   checkpoint sequence
//! - [`EventLog::subscribe`] - live delivery over a broadcast channel;
//!   at-least-once and in order, a lagging subscriber observes a `Lagged`
//!   gap rather than reordered events

use crate::types::BalanceChangeEvent;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Append-only, commit-ordered sequence of balance-change events
pub struct EventLog {
    /// Entry at index `i` has sequence `i + 1`; sequences are gapless
    entries: RwLock<Vec<BalanceChangeEvent>>,

    sender: broadcast::Sender<BalanceChangeEvent>,
}

impl EventLog {
    /// Create an empty log
    ///
    /// `capacity` bounds the broadcast buffer for live subscribers, not the
    /// log itself.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            entries: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Seed the log with previously persisted events
    ///
    /// Only valid on a fresh log; used when reopening a durable store.
    pub fn restore(&self, events: Vec<BalanceChangeEvent>) {
        let mut entries = self.entries.write();
        debug_assert!(entries.is_empty(), "restore on a non-empty log");
        *entries = events;
    }

    /// Append committed events and fan them out to live subscribers
    ///
    /// Called only by the coordinator, with sequences already assigned in
    /// commit order.
    pub fn append(&self, events: &[BalanceChangeEvent]) {
        let mut entries = self.entries.write();
        for event in events {
            entries.push(event.clone());
            // Send fails only when no subscriber is listening
            let _ = self.sender.send(event.clone());

            tracing::debug!(
                event_id = %event.event_id,
                sequence = event.sequence,
                account = %event.account,
                old_balance = %event.old_balance,
                new_balance = %event.new_balance,
                "Event published"
            );
        }
    }

    /// Number of events in the log
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the log holds no events
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Highest appended sequence (0 when empty)
    pub fn latest_sequence(&self) -> u64 {
        self.entries.read().len() as u64
    }

    /// Live subscription in commit order
    pub fn subscribe(&self) -> BroadcastStream<BalanceChangeEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Forward-only cursor over events with sequence greater than `after`
    ///
    /// Pass 0 to replay from the beginning, or a previously checkpointed
    /// sequence to resume.
    pub fn cursor(&self, after: u64) -> EventCursor<'_> {
        EventCursor {
            log: self,
            last_seen: after,
        }
    }
}

/// Lazy, forward-only reader over an [`EventLog`]
///
/// A cursor never observes a revised or removed event; it only ever moves
/// forward as the log grows.
pub struct EventCursor<'a> {
    log: &'a EventLog,
    last_seen: u64,
}

impl EventCursor<'_> {
    /// Next event after the checkpoint, if the log has one
    pub fn next(&mut self) -> Option<BalanceChangeEvent> {
        let entries = self.log.entries.read();
        let event = entries.get(self.last_seen as usize)?.clone();
        drop(entries);

        self.last_seen = event.sequence;
        Some(event)
    }

    /// Sequence of the last delivered event; feed back into
    /// [`EventLog::cursor`] to resume after a restart
    pub fn checkpoint(&self) -> u64 {
        self.last_seen
    }
}
