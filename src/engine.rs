//! Ledger engine: validation and staging
//!
//! The engine turns a transaction into a [`Prepared`] unit: versioned
//! snapshot reads, invariant checks, staged writes and the balance changes
//! to announce. It never writes; the coordinator owns the commit, so a
//! rejection here leaves the store untouched.
//!
//! Invariants enforced:
//!
//! - amounts are strictly positive
//! - a debit never drives a balance below zero
//! - a credit never drives a balance above the account's credit ceiling
//!   (an absent limit means a ceiling of zero)
//! - a transfer conserves value and moves both accounts or neither

use crate::error::{Error, Result};
use crate::store::{AccountStore, StagedWrite};
use crate::types::{AccountId, Transaction};
use rust_decimal::Decimal;
use std::sync::Arc;

/// A balance change computed but not yet committed
///
/// Event identity, timestamp and sequence are assigned by the coordinator
/// at commit time, once commit order is known.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    /// Mutated account
    pub account: AccountId,

    /// Balance the snapshot read observed
    pub old_balance: Decimal,

    /// Balance the commit will produce
    pub new_balance: Decimal,
}

/// A validated transaction awaiting a version-checked commit
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Staged account writes, one per touched account
    pub writes: Vec<StagedWrite>,

    /// Balance changes to announce once the writes land
    pub events: Vec<PendingEvent>,
}

/// Validates and applies debit/credit/transfer operations against the
/// account store
pub struct LedgerEngine {
    store: Arc<dyn AccountStore>,
}

impl LedgerEngine {
    /// Create an engine reading snapshots from `store`
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Validate `tx` against current snapshots and stage its writes
    pub fn prepare(&self, tx: &Transaction) -> Result<Prepared> {
        let amount = tx.amount();
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "amount must be strictly positive, got {}",
                amount
            )));
        }

        match tx {
            Transaction::Debit { account, amount } => self.prepare_debit(account, *amount),
            Transaction::Credit { account, amount } => self.prepare_credit(account, *amount),
            Transaction::Transfer { from, to, amount } => self.prepare_transfer(from, to, *amount),
        }
    }

    fn prepare_debit(&self, account: &AccountId, amount: Decimal) -> Result<Prepared> {
        let snapshot = self.store.get(account)?;
        let old_balance = snapshot.value.balance;
        let new_balance = old_balance - amount;

        if new_balance < Decimal::ZERO {
            return Err(Error::InsufficientFunds {
                account: account.clone(),
                balance: old_balance,
                requested: amount,
            });
        }

        let mut updated = snapshot.value;
        updated.balance = new_balance;

        Ok(Prepared {
            writes: vec![StagedWrite {
                account: updated,
                expected_version: snapshot.version,
            }],
            events: vec![PendingEvent {
                account: account.clone(),
                old_balance,
                new_balance,
            }],
        })
    }

    fn prepare_credit(&self, account: &AccountId, amount: Decimal) -> Result<Prepared> {
        let snapshot = self.store.get(account)?;
        let old_balance = snapshot.value.balance;
        let new_balance = old_balance + amount;

        let ceiling = snapshot.value.credit_ceiling();
        if new_balance > ceiling {
            return Err(Error::CreditLimitExceeded {
                account: account.clone(),
                limit: ceiling,
                would_reach: new_balance,
            });
        }

        let mut updated = snapshot.value;
        updated.balance = new_balance;

        Ok(Prepared {
            writes: vec![StagedWrite {
                account: updated,
                expected_version: snapshot.version,
            }],
            events: vec![PendingEvent {
                account: account.clone(),
                old_balance,
                new_balance,
            }],
        })
    }

    fn prepare_transfer(&self, from: &AccountId, to: &AccountId, amount: Decimal) -> Result<Prepared> {
        if from == to {
            return Err(Error::Validation(
                "transfer endpoints must differ".to_string(),
            ));
        }

        let from_snapshot = self.store.get(from)?;
        let to_snapshot = self.store.get(to)?;

        let from_old = from_snapshot.value.balance;
        let to_old = to_snapshot.value.balance;

        if amount > from_old {
            return Err(Error::InsufficientFunds {
                account: from.clone(),
                balance: from_old,
                requested: amount,
            });
        }

        let mut from_updated = from_snapshot.value;
        from_updated.balance = from_old - amount;
        let mut to_updated = to_snapshot.value;
        to_updated.balance = to_old + amount;

        // Each event references its own account's before/after balance
        Ok(Prepared {
            writes: vec![
                StagedWrite {
                    account: from_updated,
                    expected_version: from_snapshot.version,
                },
                StagedWrite {
                    account: to_updated,
                    expected_version: to_snapshot.version,
                },
            ],
            events: vec![
                PendingEvent {
                    account: from.clone(),
                    old_balance: from_old,
                    new_balance: from_old - amount,
                },
                PendingEvent {
                    account: to.clone(),
                    old_balance: to_old,
                    new_balance: to_old + amount,
                },
            ],
        })
    }
}
