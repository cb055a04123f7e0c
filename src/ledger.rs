//! Main ledger orchestration layer
//!
//! This module ties together the store, authorization gate, engine,
//! coordinator and event log into a high-level API for transaction
//! submission.
//!
//! # Example
//!
//! ```no_run
//! use ledger_engine::{Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> ledger_engine::Result<()> {
//!     let config = Config::in_memory();
//!     let ledger = Ledger::open(config).await?;
//!
//!     // Provision accounts, then submit transactions
//!     // let events = ledger.submit(&principal, tx).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::coordinator::{spawn_coordinator, CoordinatorHandle};
use crate::engine::LedgerEngine;
use crate::events::{EventCursor, EventLog};
use crate::gate::{AuthorizationGate, Operation, OwnerGate};
use crate::metrics::Metrics;
use crate::storage::RocksStore;
use crate::store::{AccountStore, MemoryStore};
use crate::types::{
    Account, AccountId, BalanceChangeEvent, PrincipalId, Transaction, TxPhase, Versioned,
};
use crate::{Config, Error, Result, StoreBackend};
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

/// Gate checks a transaction requires, in evaluation order
fn authorization_checks(tx: &Transaction) -> Vec<(Operation, &AccountId)> {
    match tx {
        Transaction::Debit { account, .. } => vec![(Operation::Debit, account)],
        Transaction::Credit { account, .. } => vec![(Operation::Credit, account)],
        Transaction::Transfer { from, to, .. } => vec![
            (Operation::TransferFrom, from),
            (Operation::TransferTo, to),
        ],
    }
}

/// Main ledger interface
pub struct Ledger {
    /// Coordinator handle for commits
    handle: CoordinatorHandle,

    /// Validation and staging
    engine: LedgerEngine,

    /// Account state
    store: Arc<dyn AccountStore>,

    /// Authorization decisions
    gate: Arc<dyn AuthorizationGate>,

    /// Committed balance changes
    events: Arc<EventLog>,

    /// Observability
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let events = Arc::new(EventLog::new(config.event_buffer));

        let (store, first_sequence): (Arc<dyn AccountStore>, u64) = match config.backend {
            StoreBackend::Memory => (Arc::new(MemoryStore::new()), 1),
            StoreBackend::Rocks => {
                let store = RocksStore::open(&config)?;
                let persisted = store.load_events(0)?;
                let first = persisted.last().map(|e| e.sequence + 1).unwrap_or(1);
                events.restore(persisted);
                (Arc::new(store), first)
            }
        };

        let gate: Arc<dyn AuthorizationGate> = Arc::new(OwnerGate::new(store.clone()));
        let engine = LedgerEngine::new(store.clone());
        let handle = spawn_coordinator(
            store.clone(),
            events.clone(),
            first_sequence,
            config.mailbox_capacity,
        );
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            handle,
            engine,
            store,
            gate,
            events,
            metrics,
            config,
        })
    }

    /// Replace the authorization gate (defaults to [`OwnerGate`])
    pub fn with_gate(mut self, gate: Arc<dyn AuthorizationGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Provision a new account
    ///
    /// Administrative action, not a ledger transaction: no authorization
    /// check, no event.
    pub fn create_account(&self, account: Account) -> Result<()> {
        self.store.insert(account)
    }

    /// Read an account with its current version stamp
    pub fn account(&self, id: &AccountId) -> Result<Versioned<Account>> {
        self.store.get(id)
    }

    /// Submit a transaction and await its terminal state
    ///
    /// Returns the published events on commit; any error leaves the store
    /// exactly as it was before the call.
    pub async fn submit(
        &self,
        principal: &PrincipalId,
        tx: Transaction,
    ) -> Result<Vec<BalanceChangeEvent>> {
        self.submit_inner(principal, None, tx).await
    }

    /// Submit with an idempotency key
    ///
    /// Replaying a key whose transaction already committed returns the
    /// original events without applying anything. Rejected and conflicted
    /// outcomes are not cached; resubmission re-executes.
    pub async fn submit_idempotent(
        &self,
        principal: &PrincipalId,
        key: Uuid,
        tx: Transaction,
    ) -> Result<Vec<BalanceChangeEvent>> {
        self.submit_inner(principal, Some(key), tx).await
    }

    async fn submit_inner(
        &self,
        principal: &PrincipalId,
        key: Option<Uuid>,
        tx: Transaction,
    ) -> Result<Vec<BalanceChangeEvent>> {
        let started = Instant::now();
        self.metrics.record_submission();

        tracing::debug!(
            kind = tx.kind(),
            principal = %principal,
            phase = %TxPhase::Submitted,
            "Transaction received"
        );

        // Validating: a denial surfaces before the store is touched
        for (operation, account) in authorization_checks(&tx) {
            if self.gate.authorize(principal, operation, account).is_denied() {
                self.metrics.record_rejected();
                tracing::debug!(
                    kind = tx.kind(),
                    principal = %principal,
                    account = %account,
                    phase = %TxPhase::Rejected,
                    "Authorization denied"
                );
                return Err(Error::AccessDenied {
                    principal: principal.clone(),
                    operation,
                    account: account.clone(),
                });
            }
        }

        let prepared = match self.engine.prepare(&tx) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.metrics.record_rejected();
                tracing::debug!(
                    kind = tx.kind(),
                    phase = %TxPhase::Rejected,
                    error = %err,
                    "Transaction rejected"
                );
                return Err(err);
            }
        };

        tracing::debug!(kind = tx.kind(), phase = %TxPhase::Applying, "Committing");
        let result = self.handle.commit(prepared, key).await;
        self.metrics.record_duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(events) => {
                self.metrics.record_committed(events.len());
                tracing::info!(
                    kind = tx.kind(),
                    phase = %TxPhase::Committed,
                    events = events.len(),
                    "Transaction committed"
                );
            }
            Err(err) if err.is_conflict() => {
                self.metrics.record_conflicted();
                tracing::debug!(
                    kind = tx.kind(),
                    phase = %TxPhase::Conflicted,
                    error = %err,
                    "Transaction conflicted"
                );
            }
            Err(err) => {
                self.metrics.record_rejected();
                tracing::debug!(
                    kind = tx.kind(),
                    phase = %TxPhase::Rejected,
                    error = %err,
                    "Commit failed"
                );
            }
        }

        result
    }

    /// Live event subscription in commit order
    pub fn subscribe(&self) -> BroadcastStream<BalanceChangeEvent> {
        self.events.subscribe()
    }

    /// Replay cursor over events with sequence greater than `after`
    pub fn cursor(&self, after: u64) -> EventCursor<'_> {
        self.events.cursor(after)
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AllowAll;
    use rust_decimal::Decimal;
    use tokio_stream::StreamExt;

    async fn test_ledger() -> Ledger {
        let ledger = Ledger::open(Config::in_memory()).await.unwrap();
        ledger
            .create_account(Account::new(
                AccountId::new("1"),
                PrincipalId::new("alice@email.com"),
                Decimal::from(10),
            ))
            .unwrap();
        ledger
            .create_account(Account::new(
                AccountId::new("2"),
                PrincipalId::new("bob@email.com"),
                Decimal::from(20),
            ))
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_owner_can_debit() {
        let ledger = test_ledger().await;
        let alice = PrincipalId::new("alice@email.com");

        let events = ledger
            .submit(
                &alice,
                Transaction::Debit {
                    account: AccountId::new("1"),
                    amount: Decimal::from(10),
                },
            )
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].old_balance, Decimal::from(10));
        assert_eq!(events[0].new_balance, Decimal::ZERO);

        let snapshot = ledger.account(&AccountId::new("1")).unwrap();
        assert_eq!(snapshot.value.balance, Decimal::ZERO);
        assert_eq!(snapshot.version, 1);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_owner_denied_before_store() {
        let ledger = test_ledger().await;
        let bob = PrincipalId::new("bob@email.com");

        let err = ledger
            .submit(
                &bob,
                Transaction::Debit {
                    account: AccountId::new("1"),
                    amount: Decimal::from(10),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));

        // Balance and version untouched
        let snapshot = ledger.account(&AccountId::new("1")).unwrap();
        assert_eq!(snapshot.value.balance, Decimal::from(10));
        assert_eq!(snapshot.version, 0);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_with_gate_replaces_policy() {
        let ledger = test_ledger().await.with_gate(Arc::new(AllowAll));
        let bob = PrincipalId::new("bob@email.com");

        // AllowAll lets Bob debit Alice's account
        ledger
            .submit(
                &bob,
                Transaction::Debit {
                    account: AccountId::new("1"),
                    amount: Decimal::from(5),
                },
            )
            .await
            .unwrap();

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_sees_committed_events() {
        let ledger = test_ledger().await;
        let alice = PrincipalId::new("alice@email.com");
        let mut stream = ledger.subscribe();

        ledger
            .submit(
                &alice,
                Transaction::Transfer {
                    from: AccountId::new("1"),
                    to: AccountId::new("2"),
                    amount: Decimal::from(10),
                },
            )
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.account, AccountId::new("1"));
        assert_eq!(second.account, AccountId::new("2"));
        assert_eq!(first.sequence + 1, second.sequence);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_metrics_track_outcomes() {
        let ledger = test_ledger().await;
        let alice = PrincipalId::new("alice@email.com");

        ledger
            .submit(
                &alice,
                Transaction::Debit {
                    account: AccountId::new("1"),
                    amount: Decimal::from(5),
                },
            )
            .await
            .unwrap();

        ledger
            .submit(
                &alice,
                Transaction::Debit {
                    account: AccountId::new("1"),
                    amount: Decimal::from(1000),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(ledger.metrics().submissions_total.get(), 2);
        assert_eq!(ledger.metrics().committed_total.get(), 1);
        assert_eq!(ledger.metrics().rejected_total.get(), 1);
        assert_eq!(ledger.metrics().events_published_total.get(), 1);

        ledger.shutdown().await.unwrap();
    }
}
