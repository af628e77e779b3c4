// src/ledger/mod.rs
//! In-memory transaction ledger
//!
//! The single source of truth for captured exchanges:
//!
//! - **Transaction**: one row per logical exchange
//! - **TransactionLedger**: ordered store with id and pause-id indexes
//! - **PendingActionSet**: idempotency guard for operator actions
//!
//! All state here is owned by the engine worker and mutated only from its
//! event handlers, so no locking is involved. Every ledger mutation ends in
//! a snapshot broadcast.

pub mod pending;
pub mod store;
pub mod transaction;

// Re-export commonly used types
pub use pending::PendingActionSet;
pub use store::{LedgerStats, TransactionLedger};
pub use transaction::{Transaction, TransactionStatus};
