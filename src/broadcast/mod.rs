// src/broadcast/mod.rs
//! Observer broadcast
//!
//! After every ledger mutation the full ordered transaction list is pushed
//! to all current observers. Delivery is best-effort with latest-value
//! semantics: an observer that is not attached simply misses intermediate
//! states, and a fresh observer always starts from the current snapshot.
//! Snapshots carry a revision counter so observers can tell that states
//! were skipped.
//!
//! # Architecture
//!
//! ```text
//! Ledger mutation → publish() → watch channel → observer 1..N
//!                                    │
//!                                latest() ← getSnapshot query
//! ```

use crate::ledger::transaction::Transaction;
use std::sync::Arc;
use tokio::sync::watch;

/// Receiver half handed to observers
pub type SnapshotReceiver = watch::Receiver<LedgerSnapshot>;

/// An immutable point-in-time view of the ledger
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    revision: u64,
    transactions: Arc<Vec<Transaction>>,
}

impl LedgerSnapshot {
    /// The empty snapshot every observer starts from
    pub fn empty() -> Self {
        Self {
            revision: 0,
            transactions: Arc::new(Vec::new()),
        }
    }

    /// Monotonically increasing publish counter, 0 for the empty snapshot
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Transactions in ledger insertion order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Convenience lookup by transaction id
    pub fn find(&self, id: &crate::utils::ids::TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|t| &t.id == id)
    }
}

/// Publishes ledger snapshots to observers
///
/// Owned by the ledger; publishing is O(receivers) and never blocks.
pub struct SnapshotBroadcaster {
    tx: watch::Sender<LedgerSnapshot>,
    revision: u64,
}

impl SnapshotBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LedgerSnapshot::empty());
        Self { tx, revision: 0 }
    }

    /// Attach a new observer; it immediately sees the current snapshot
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.tx.subscribe()
    }

    /// Push a fresh snapshot to all observers
    pub fn publish(&mut self, transactions: Vec<Transaction>) {
        self.revision += 1;
        self.tx.send_replace(LedgerSnapshot {
            revision: self.revision,
            transactions: Arc::new(transactions),
        });
    }

    /// The current snapshot, without waiting for a change
    pub fn latest(&self) -> LedgerSnapshot {
        self.tx.borrow().clone()
    }

    /// Number of currently attached observers
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SnapshotBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
