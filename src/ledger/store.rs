// src/ledger/store.rs
//! The transaction ledger
//!
//! Insertion-ordered, in-memory, single source of truth. Owned by the
//! engine worker; every mutating call publishes a fresh snapshot to
//! observers. Two indexes back the lookup contract: one by transaction id,
//! one by the currently bound pause id.

use crate::broadcast::{LedgerSnapshot, SnapshotBroadcaster, SnapshotReceiver};
use crate::ledger::transaction::{Transaction, TransactionStatus};
use crate::utils::ids::{PauseId, TransactionId};
use std::collections::HashMap;
use tracing::debug;

/// Ordered collection of captured transactions
pub struct TransactionLedger {
    rows: Vec<Transaction>,
    index: HashMap<TransactionId, usize>,
    pause_index: HashMap<PauseId, TransactionId>,
    broadcaster: SnapshotBroadcaster,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
            pause_index: HashMap::new(),
            broadcaster: SnapshotBroadcaster::new(),
        }
    }

    /// Insert a new transaction or replace an existing one in place
    ///
    /// Replacement keeps the row's position so observers see a stable
    /// ordering. Nothing is ever silently dropped.
    pub fn upsert(&mut self, transaction: Transaction) {
        match self.index.get(&transaction.id) {
            Some(&pos) => {
                let old_pause = self.rows[pos].protocol_request_id.clone();
                if let Some(old) = old_pause {
                    if Some(&old) != transaction.protocol_request_id.as_ref() {
                        self.pause_index.remove(&old);
                    }
                }
                if let Some(pause) = &transaction.protocol_request_id {
                    self.pause_index
                        .insert(pause.clone(), transaction.id.clone());
                }
                self.rows[pos] = transaction;
            }
            None => {
                debug!(id = %transaction.id, "ledger insert");
                if let Some(pause) = &transaction.protocol_request_id {
                    self.pause_index
                        .insert(pause.clone(), transaction.id.clone());
                }
                self.index.insert(transaction.id.clone(), self.rows.len());
                self.rows.push(transaction);
            }
        }
        self.publish();
    }

    pub fn find(&self, id: &TransactionId) -> Option<&Transaction> {
        self.index.get(id).map(|&pos| &self.rows[pos])
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.index.contains_key(id)
    }

    /// Resolve the transaction currently bound to a pause id
    pub fn find_by_pause(&self, pause_id: &PauseId) -> Option<&Transaction> {
        self.pause_index.get(pause_id).and_then(|id| self.find(id))
    }

    /// Read-modify-write a row; `false` when the id is unknown
    ///
    /// The pause index is re-synced afterwards in case the closure touched
    /// the row's pause binding.
    pub fn update(&mut self, id: &TransactionId, f: impl FnOnce(&mut Transaction)) -> bool {
        let Some(&pos) = self.index.get(id) else {
            return false;
        };
        let old_pause = self.rows[pos].protocol_request_id.clone();
        f(&mut self.rows[pos]);
        let new_pause = self.rows[pos].protocol_request_id.clone();
        if old_pause != new_pause {
            if let Some(old) = old_pause {
                if self.pause_index.get(&old) == Some(id) {
                    self.pause_index.remove(&old);
                }
            }
            if let Some(new) = new_pause {
                self.pause_index.insert(new, id.clone());
            }
        }
        self.publish();
        true
    }

    /// Re-bind a row to a new pause id (redirect hop or matched replay)
    pub fn rebind_pause(&mut self, id: &TransactionId, pause_id: PauseId) -> bool {
        self.update(id, |row| {
            row.protocol_request_id = Some(pause_id);
        })
    }

    /// All transactions in insertion order
    pub fn all(&self) -> &[Transaction] {
        &self.rows
    }

    /// Drop every row and push the empty snapshot
    pub fn clear(&mut self) {
        debug!(rows = self.rows.len(), "ledger cleared");
        self.rows.clear();
        self.index.clear();
        self.pause_index.clear();
        self.publish();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Attach an observer to the snapshot channel
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.broadcaster.subscribe()
    }

    /// Current snapshot without waiting
    pub fn latest(&self) -> LedgerSnapshot {
        self.broadcaster.latest()
    }

    /// Aggregate counts over the current rows
    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats::default();
        stats.total = self.rows.len();
        for row in &self.rows {
            match row.status {
                TransactionStatus::Paused => stats.paused += 1,
                TransactionStatus::Awaiting => stats.awaiting += 1,
                TransactionStatus::Finished => stats.finished += 1,
            }
            if row.is_replay {
                stats.replays += 1;
            }
        }
        stats
    }

    fn publish(&mut self) {
        self.broadcaster.publish(self.rows.clone());
    }
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Ledger statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub total: usize,
    pub paused: usize,
    pub awaiting: usize,
    pub finished: usize,
    pub replays: usize,
}
