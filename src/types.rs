//! Core types for the balance ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity on whose behalf a transaction is submitted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Create new principal ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account record
///
/// Balance and owner are fixed at provisioning time; all subsequent balance
/// mutations go through the ledger engine. The credit limit is a ceiling on
/// the balance that credits may not push past. An absent limit means zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique, stable account identifier
    pub id: AccountId,

    /// Owning principal (referenced by id only)
    pub owner: PrincipalId,

    /// Current balance (exact decimal)
    pub balance: Decimal,

    /// Optional ceiling on the balance for credit operations
    pub credit_limit: Option<Decimal>,
}

impl Account {
    /// Create a new account record
    pub fn new(id: AccountId, owner: PrincipalId, balance: Decimal) -> Self {
        Self {
            id,
            owner,
            balance,
            credit_limit: None,
        }
    }

    /// Set the credit limit
    pub fn with_credit_limit(mut self, limit: Decimal) -> Self {
        self.credit_limit = Some(limit);
        self
    }

    /// Effective credit ceiling (absent limit means zero)
    pub fn credit_ceiling(&self) -> Decimal {
        self.credit_limit.unwrap_or(Decimal::ZERO)
    }
}

/// A value paired with its optimistic-concurrency version stamp
///
/// The version increments by exactly one on every committed mutation and is
/// the sole input to conflict detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The stored value
    pub value: T,

    /// Version stamp at the time of the read
    pub version: u64,
}

impl<T> Versioned<T> {
    /// Pair a value with a version stamp
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}

/// A submitted balance mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transaction {
    /// Remove funds from an account
    Debit {
        /// Target account
        account: AccountId,
        /// Amount to remove (strictly positive)
        amount: Decimal,
    },

    /// Add funds to an account
    Credit {
        /// Target account
        account: AccountId,
        /// Amount to add (strictly positive)
        amount: Decimal,
    },

    /// Move funds between two accounts atomically
    Transfer {
        /// Source account
        from: AccountId,
        /// Destination account
        to: AccountId,
        /// Amount to move (strictly positive)
        amount: Decimal,
    },
}

impl Transaction {
    /// Short name for logging and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::Debit { .. } => "debit",
            Transaction::Credit { .. } => "credit",
            Transaction::Transfer { .. } => "transfer",
        }
    }

    /// Amount carried by the transaction
    pub fn amount(&self) -> Decimal {
        match self {
            Transaction::Debit { amount, .. }
            | Transaction::Credit { amount, .. }
            | Transaction::Transfer { amount, .. } => *amount,
        }
    }
}

/// Immutable record of a committed balance change
///
/// Carries value snapshots, never live account references, so the record
/// stays valid after the account changes again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceChangeEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Position in commit order (1-based, gapless)
    pub sequence: u64,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,

    /// Mutated account
    pub account: AccountId,

    /// Balance before the mutation
    pub old_balance: Decimal,

    /// Balance after the mutation
    pub new_balance: Decimal,
}

/// Transaction lifecycle phase
///
/// `Submitted → Validating → (Applying | Rejected) → (Committed | Conflicted)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPhase {
    /// Received, nothing checked yet
    Submitted,
    /// Authorization and invariant checks in progress
    Validating,
    /// Validated, awaiting version-checked commit
    Applying,
    /// Invariant violation (terminal)
    Rejected,
    /// Version check failed at commit (terminal)
    Conflicted,
    /// Applied and events published (terminal)
    Committed,
}

impl TxPhase {
    /// Whether no further transition occurs from this phase
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxPhase::Rejected | TxPhase::Conflicted | TxPhase::Committed
        )
    }
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxPhase::Submitted => "submitted",
            TxPhase::Validating => "validating",
            TxPhase::Applying => "applying",
            TxPhase::Rejected => "rejected",
            TxPhase::Conflicted => "conflicted",
            TxPhase::Committed => "committed",
        };
        write!(f, "{}", s)
    }
}
