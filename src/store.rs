//! Account store contract and in-memory implementation
//!
//! The store is the single serialization point of the system: reads never
//! block, and writes go through a compare-and-swap commit that either
//! applies every staged write in the batch or none of them. No locks are
//! held across the read-compute-write gap; conflict detection is purely
//! optimistic via per-account version stamps.

use crate::error::{Error, Result};
use crate::types::{Account, AccountId, BalanceChangeEvent, Versioned};
use dashmap::DashMap;
use parking_lot::Mutex;

/// A staged account write awaiting commit
///
/// `expected_version` is the version the transaction read; the commit only
/// applies if it still matches, and the stored version becomes
/// `expected_version + 1`.
#[derive(Debug, Clone)]
pub struct StagedWrite {
    /// New account value
    pub account: Account,

    /// Version the transaction's read observed
    pub expected_version: u64,
}

/// All-or-nothing unit handed to [`AccountStore::commit`]
///
/// Events ride along so durable stores can persist them in the same atomic
/// write as the account values.
#[derive(Debug, Clone)]
pub struct CommitBatch {
    /// Version-checked account writes
    pub writes: Vec<StagedWrite>,

    /// Events produced by the mutation, already sequenced
    pub events: Vec<BalanceChangeEvent>,
}

/// Durable mapping from account identifier to versioned account state
pub trait AccountStore: Send + Sync {
    /// Read an account with its current version stamp
    ///
    /// Never blocks behind in-flight commits.
    fn get(&self, id: &AccountId) -> Result<Versioned<Account>>;

    /// Provision a new account at version 0
    ///
    /// Provisioning is an administrative action, not a ledger operation;
    /// duplicates are rejected.
    fn insert(&self, account: Account) -> Result<()>;

    /// Version-checked commit of a batch of writes
    ///
    /// Every write's `expected_version` must match the stored version or
    /// the whole batch fails with [`Error::Conflict`] and no account is
    /// mutated.
    fn commit(&self, batch: &CommitBatch) -> Result<()>;
}

/// In-memory account store
///
/// Reads are lock-free through the shard map; commits serialize on a single
/// mutex so the version check and the apply are indivisible across all
/// accounts in the batch.
pub struct MemoryStore {
    accounts: DashMap<AccountId, Versioned<Account>>,
    commit_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            commit_lock: Mutex::new(()),
        }
    }

    /// Number of provisioned accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no accounts are provisioned
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for MemoryStore {
    fn get(&self, id: &AccountId) -> Result<Versioned<Account>> {
        self.accounts
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::AccountNotFound(id.clone()))
    }

    fn insert(&self, account: Account) -> Result<()> {
        let _guard = self.commit_lock.lock();

        if self.accounts.contains_key(&account.id) {
            return Err(Error::Validation(format!(
                "account {} already exists",
                account.id
            )));
        }

        self.accounts
            .insert(account.id.clone(), Versioned::new(account, 0));
        Ok(())
    }

    fn commit(&self, batch: &CommitBatch) -> Result<()> {
        let _guard = self.commit_lock.lock();

        // Verify every version before touching anything
        for write in &batch.writes {
            let current = self
                .accounts
                .get(&write.account.id)
                .map(|entry| entry.version)
                .ok_or_else(|| Error::AccountNotFound(write.account.id.clone()))?;

            if current != write.expected_version {
                return Err(Error::Conflict {
                    account: write.account.id.clone(),
                    expected: write.expected_version,
                    found: current,
                });
            }
        }

        for write in &batch.writes {
            self.accounts.insert(
                write.account.id.clone(),
                Versioned::new(write.account.clone(), write.expected_version + 1),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrincipalId;
    use rust_decimal::Decimal;

    fn account(id: &str, balance: i64) -> Account {
        Account::new(
            AccountId::new(id),
            PrincipalId::new("alice@email.com"),
            Decimal::from(balance),
        )
    }

    fn write(store: &MemoryStore, id: &str, balance: i64) -> StagedWrite {
        let snapshot = store.get(&AccountId::new(id)).unwrap();
        let mut updated = snapshot.value;
        updated.balance = Decimal::from(balance);
        StagedWrite {
            account: updated,
            expected_version: snapshot.version,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = MemoryStore::new();
        store.insert(account("1", 10)).unwrap();

        let snapshot = store.get(&AccountId::new("1")).unwrap();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.value.balance, Decimal::from(10));
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let store = MemoryStore::new();
        store.insert(account("1", 10)).unwrap();

        let err = store.insert(account("1", 99)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Original untouched
        let snapshot = store.get(&AccountId::new("1")).unwrap();
        assert_eq!(snapshot.value.balance, Decimal::from(10));
    }

    #[test]
    fn test_get_unknown_account() {
        let store = MemoryStore::new();
        let err = store.get(&AccountId::new("missing")).unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }

    #[test]
    fn test_commit_bumps_version() {
        let store = MemoryStore::new();
        store.insert(account("1", 10)).unwrap();

        let batch = CommitBatch {
            writes: vec![write(&store, "1", 0)],
            events: vec![],
        };
        store.commit(&batch).unwrap();

        let snapshot = store.get(&AccountId::new("1")).unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.value.balance, Decimal::ZERO);
    }

    #[test]
    fn test_stale_commit_conflicts() {
        let store = MemoryStore::new();
        store.insert(account("1", 20)).unwrap();

        // Both staged from the same snapshot
        let first = CommitBatch {
            writes: vec![write(&store, "1", 10)],
            events: vec![],
        };
        let second = CommitBatch {
            writes: vec![write(&store, "1", 10)],
            events: vec![],
        };

        store.commit(&first).unwrap();

        let err = store.commit(&second).unwrap_err();
        assert!(err.is_conflict());

        // Only the first commit is visible
        let snapshot = store.get(&AccountId::new("1")).unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.value.balance, Decimal::from(10));
    }

    #[test]
    fn test_two_account_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.insert(account("1", 10)).unwrap();
        store.insert(account("2", 20)).unwrap();

        let good = write(&store, "1", 0);
        let stale = StagedWrite {
            expected_version: 7, // never matches
            ..write(&store, "2", 30)
        };

        let err = store
            .commit(&CommitBatch {
                writes: vec![good, stale],
                events: vec![],
            })
            .unwrap_err();
        assert!(err.is_conflict());

        // Neither account moved
        assert_eq!(
            store.get(&AccountId::new("1")).unwrap().value.balance,
            Decimal::from(10)
        );
        assert_eq!(
            store.get(&AccountId::new("2")).unwrap().value.balance,
            Decimal::from(20)
        );
        assert_eq!(store.get(&AccountId::new("1")).unwrap().version, 0);
    }

    #[test]
    fn test_unrelated_accounts_commit_independently() {
        let store = MemoryStore::new();
        store.insert(account("1", 10)).unwrap();
        store.insert(account("2", 20)).unwrap();

        let batch1 = CommitBatch {
            writes: vec![write(&store, "1", 5)],
            events: vec![],
        };
        let batch2 = CommitBatch {
            writes: vec![write(&store, "2", 25)],
            events: vec![],
        };

        store.commit(&batch1).unwrap();
        store.commit(&batch2).unwrap();

        assert_eq!(
            store.get(&AccountId::new("1")).unwrap().value.balance,
            Decimal::from(5)
        );
        assert_eq!(
            store.get(&AccountId::new("2")).unwrap().value.balance,
            Decimal::from(25)
        );
    }
}
