//! Error types for the ledger

use crate::gate::Operation;
use crate::types::{AccountId, PrincipalId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// The first five variants are the domain taxonomy callers branch on; the
/// rest are ambient failures of the surrounding machinery. All are terminal:
/// the core never retries on behalf of the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Authorization gate refused the operation
    #[error("access denied: {principal} may not {operation} account {account}")]
    AccessDenied {
        /// Submitting principal
        principal: PrincipalId,
        /// Refused operation
        operation: Operation,
        /// Target account
        account: AccountId,
    },

    /// Malformed transaction (non-positive amount, degenerate transfer)
    #[error("validation failed: {0}")]
    Validation(String),

    /// No account under the given identifier
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Debit or transfer would drive the balance below zero
    #[error("insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Target account
        account: AccountId,
        /// Balance at the time of the read
        balance: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Credit would drive the balance above the account's ceiling
    #[error("credit limit exceeded for account {account}: limit {limit}, would reach {would_reach}")]
    CreditLimitExceeded {
        /// Target account
        account: AccountId,
        /// Effective ceiling
        limit: Decimal,
        /// Balance the credit would have produced
        would_reach: Decimal,
    },

    /// Optimistic version check failed at commit
    #[error("write conflict on account {account}: expected version {expected}, found {found}")]
    Conflict {
        /// Account whose version moved
        account: AccountId,
        /// Version the transaction read
        expected: u64,
        /// Version found at commit
        found: u64,
    },

    /// Storage error (RocksDB)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is a commit-time version conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Whether this is a pre-commit invariant rejection
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::AccessDenied { .. }
                | Error::Validation(_)
                | Error::AccountNotFound(_)
                | Error::InsufficientFunds { .. }
                | Error::CreditLimitExceeded { .. }
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
