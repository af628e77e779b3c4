// src/ledger/pending.rs
//! Pending-action tracking
//!
//! Guards operator-initiated actions (resume, replay) against running twice
//! while the first invocation is still in flight. Purely an idempotency
//! device; it never influences ordering.

use crate::utils::ids::TransactionId;
use std::collections::HashSet;

/// Set of transaction ids with an operator action in flight
#[derive(Debug, Default)]
pub struct PendingActionSet {
    active: HashSet<TransactionId>,
}

impl PendingActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an id for an action; `false` means one is already in flight
    pub fn begin(&mut self, id: &TransactionId) -> bool {
        self.active.insert(id.clone())
    }

    /// Release an id once its action resolved
    pub fn clear(&mut self, id: &TransactionId) -> bool {
        self.active.remove(id)
    }

    pub fn is_pending(&self, id: &TransactionId) -> bool {
        self.active.contains(id)
    }

    /// Drop every claim, used by clear-all
    pub fn reset(&mut self) {
        self.active.clear();
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_twice_is_rejected() {
        let mut pending = PendingActionSet::new();
        let id = TransactionId::new("tx-1");
        assert!(pending.begin(&id));
        assert!(!pending.begin(&id));
        assert!(pending.is_pending(&id));
    }

    #[test]
    fn test_clear_releases_claim() {
        let mut pending = PendingActionSet::new();
        let id = TransactionId::new("tx-1");
        pending.begin(&id);
        assert!(pending.clear(&id));
        assert!(!pending.is_pending(&id));
        assert!(pending.begin(&id));
    }

    #[test]
    fn test_clear_unknown_id() {
        let mut pending = PendingActionSet::new();
        assert!(!pending.clear(&TransactionId::new("missing")));
    }

    #[test]
    fn test_reset() {
        let mut pending = PendingActionSet::new();
        pending.begin(&TransactionId::new("a"));
        pending.begin(&TransactionId::new("b"));
        pending.reset();
        assert!(pending.is_empty());
    }
}
