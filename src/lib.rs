//! Balance-Ledger Transaction Engine
//!
//! Atomic balance mutation with optimistic-concurrency conflict detection
//! and ordered event emission.
//!
//! # Architecture
//!
//! - **Optimistic concurrency**: no locks across the read-compute-write gap;
//!   per-account version stamps detect stale commits
//! - **Single writer**: one coordinator task totals-orders all commits
//! - **Append-only events**: one immutable balance-change record per
//!   committed mutation, in commit order
//! - **Injected collaborators**: authorization and persistence are passed
//!   in, never looked up from ambient context
//!
//! # Invariants
//!
//! - A balance never goes below zero
//! - A credit never drives a balance above the account's ceiling
//! - Transfers conserve value: both accounts move or neither does
//! - A failed transaction leaves the store exactly as it was

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports
pub use config::{Config, StoreBackend};
pub use error::{Error, Result};
pub use events::{EventCursor, EventLog};
pub use gate::{AllowAll, AuthorizationGate, Decision, Operation, OwnerGate};
pub use ledger::Ledger;
pub use store::{AccountStore, CommitBatch, MemoryStore, StagedWrite};
pub use types::{
    Account, AccountId, BalanceChangeEvent, PrincipalId, Transaction, TxPhase, Versioned,
};
