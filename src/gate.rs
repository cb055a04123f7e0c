//! Authorization gate
//!
//! The engine consumes an authorization decision before touching any
//! account; it never makes one itself. [`OwnerGate`] reproduces the
//! owner-only access rules the ledger enforces by default, [`AllowAll`]
//! disables checks for embedded and test use.

use crate::store::AccountStore;
use crate::types::{AccountId, PrincipalId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Operation being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Remove funds from the account
    Debit,
    /// Add funds to the account
    Credit,
    /// Move funds out of the account
    TransferFrom,
    /// Receive funds into the account
    TransferTo,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Debit => "debit",
            Operation::Credit => "credit",
            Operation::TransferFrom => "transfer from",
            Operation::TransferTo => "transfer to",
        };
        write!(f, "{}", s)
    }
}

/// Authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The principal may perform the operation
    Allowed,
    /// The principal may not perform the operation
    Denied,
}

impl Decision {
    /// Whether the decision is a denial
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied)
    }
}

/// External collaborator answering "may principal P perform operation O on
/// account A?"
///
/// Calls are synchronous; a `Denied` decision surfaces as
/// [`Error::AccessDenied`](crate::Error::AccessDenied) before the store is
/// touched by the transaction.
pub trait AuthorizationGate: Send + Sync {
    /// Decide whether `principal` may perform `operation` on `account`
    fn authorize(
        &self,
        principal: &PrincipalId,
        operation: Operation,
        account: &AccountId,
    ) -> Decision;
}

/// Gate that allows everything
///
/// For embedded use where authorization happens upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationGate for AllowAll {
    fn authorize(&self, _: &PrincipalId, _: Operation, _: &AccountId) -> Decision {
        Decision::Allowed
    }
}

/// Owner-only policy
///
/// Debits, credits and outgoing transfers require the submitting principal
/// to own the account. Incoming transfers are open: any principal may move
/// funds into another principal's account, provided it owns the source.
pub struct OwnerGate {
    store: Arc<dyn AccountStore>,
}

impl OwnerGate {
    /// Create an owner gate reading ownership from `store`
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }
}

impl AuthorizationGate for OwnerGate {
    fn authorize(
        &self,
        principal: &PrincipalId,
        operation: Operation,
        account: &AccountId,
    ) -> Decision {
        if operation == Operation::TransferTo {
            return Decision::Allowed;
        }

        match self.store.get(account) {
            Ok(snapshot) if snapshot.value.owner == *principal => Decision::Allowed,
            Ok(_) => Decision::Denied,
            // Missing accounts fall through to the engine's not-found error
            Err(crate::Error::AccountNotFound(_)) => Decision::Allowed,
            Err(_) => Decision::Denied,
        }
    }
}
