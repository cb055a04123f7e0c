//! Transaction coordinator
//!
//! A single-task Tokio actor owns commit order. Authorization and snapshot
//! validation run on the submitting task; only the commit section funnels
//! through the actor mailbox. That is what makes one of two racing
//! transactions against the same account fail deterministically: both read
//! the same version, the first commit bumps it, the second fails the
//! version check and terminates as a conflict.
//!
//! Per-transaction state machine:
//!
//! ```text
//! Submitted -> Validating -> (Applying | Rejected) -> (Committed | Conflicted)
//! ```
//!
//! `Rejected`, `Conflicted` and `Committed` are terminal; nothing is ever
//! partially committed, and conflicted transactions are never retried here -
//! resubmission is the caller's decision.

use crate::engine::Prepared;
use crate::error::{Error, Result};
use crate::events::EventLog;
use crate::store::{AccountStore, CommitBatch};
use crate::types::{BalanceChangeEvent, TxPhase};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the coordinator actor
pub enum CoordinatorMessage {
    /// Commit a prepared transaction
    Commit {
        /// Validated writes and pending events
        prepared: Prepared,
        /// Optional key under which a committed outcome is cached
        idempotency_key: Option<Uuid>,
        /// Terminal outcome
        response: oneshot::Sender<Result<Vec<BalanceChangeEvent>>>,
    },

    /// Shutdown the actor
    Shutdown {
        /// Acknowledged once the store handle is released
        response: oneshot::Sender<()>,
    },
}

/// Actor that totals-orders commits and publishes events
pub struct Coordinator {
    /// Store the version-checked writes land in
    store: Arc<dyn AccountStore>,

    /// Log receiving events in commit order
    event_log: Arc<EventLog>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<CoordinatorMessage>,

    /// Sequence the next committed event will take
    next_sequence: u64,

    /// Committed outcomes by idempotency key
    committed: HashMap<Uuid, Vec<BalanceChangeEvent>>,
}

impl Coordinator {
    /// Create a new coordinator
    ///
    /// `first_sequence` is 1 for a fresh ledger, or one past the highest
    /// persisted sequence when resuming a durable store.
    pub fn new(
        store: Arc<dyn AccountStore>,
        event_log: Arc<EventLog>,
        mailbox: mpsc::Receiver<CoordinatorMessage>,
        first_sequence: u64,
    ) -> Self {
        Self {
            store,
            event_log,
            mailbox,
            next_sequence: first_sequence,
            committed: HashMap::new(),
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let ack = loop {
            match self.mailbox.recv().await {
                Some(CoordinatorMessage::Commit {
                    prepared,
                    idempotency_key,
                    response,
                }) => {
                    let result = self.handle_commit(prepared, idempotency_key);
                    let _ = response.send(result);
                }
                Some(CoordinatorMessage::Shutdown { response }) => break Some(response),
                // Mailbox closed
                None => break None,
            }
        };

        // Release the store handle before acknowledging, so a durable ledger
        // can be reopened as soon as shutdown returns
        drop(self.store);
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    fn handle_commit(
        &mut self,
        prepared: Prepared,
        idempotency_key: Option<Uuid>,
    ) -> Result<Vec<BalanceChangeEvent>> {
        // Replaying a committed key returns the original events untouched
        if let Some(key) = idempotency_key {
            if let Some(events) = self.committed.get(&key) {
                tracing::debug!(key = %key, "Idempotent replay, returning cached outcome");
                return Ok(events.clone());
            }
        }

        // Commit order is decided here: stamp identity, time and sequence
        let events: Vec<BalanceChangeEvent> = prepared
            .events
            .iter()
            .enumerate()
            .map(|(i, pending)| BalanceChangeEvent {
                event_id: Uuid::now_v7(),
                sequence: self.next_sequence + i as u64,
                timestamp: Utc::now(),
                account: pending.account.clone(),
                old_balance: pending.old_balance,
                new_balance: pending.new_balance,
            })
            .collect();

        let batch = CommitBatch {
            writes: prepared.writes,
            events,
        };

        if let Err(err) = self.store.commit(&batch) {
            let phase = if err.is_conflict() {
                TxPhase::Conflicted
            } else {
                TxPhase::Rejected
            };
            tracing::debug!(phase = %phase, error = %err, "Commit failed");
            return Err(err);
        }

        // Sequences advance only on success, so the log stays gapless
        self.next_sequence += batch.events.len() as u64;
        self.event_log.append(&batch.events);

        if let Some(key) = idempotency_key {
            self.committed.insert(key, batch.events.clone());
        }

        tracing::debug!(
            phase = %TxPhase::Committed,
            events = batch.events.len(),
            "Transaction committed"
        );

        Ok(batch.events)
    }
}

/// Handle for sending messages to the coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
}

impl CoordinatorHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<CoordinatorMessage>) -> Self {
        Self { sender }
    }

    /// Commit a prepared transaction, awaiting its terminal state
    pub async fn commit(
        &self,
        prepared: Prepared,
        idempotency_key: Option<Uuid>,
    ) -> Result<Vec<BalanceChangeEvent>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorMessage::Commit {
                prepared,
                idempotency_key,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Coordinator mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown the coordinator, awaiting its acknowledgement
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Coordinator mailbox closed".to_string()))?;

        // An already-gone actor counts as shut down
        let _ = rx.await;
        Ok(())
    }
}

/// Spawn the coordinator actor
pub fn spawn_coordinator(
    store: Arc<dyn AccountStore>,
    event_log: Arc<EventLog>,
    first_sequence: u64,
    mailbox_capacity: usize,
) -> CoordinatorHandle {
    // Bounded channel for backpressure
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = Coordinator::new(store, event_log, rx, first_sequence);

    tokio::spawn(async move {
        actor.run().await;
    });

    CoordinatorHandle::new(tx)
}
