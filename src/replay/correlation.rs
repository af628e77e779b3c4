// src/replay/correlation.rs
//! Replay correlations
//!
//! A correlation is the ephemeral binding between a requested replay and
//! its eventual execution. It lives in the worker-owned [`CorrelationMap`]
//! from the moment the replay is issued until exactly one of three things
//! claims it: the router matching the marker header, the direct completion
//! signal, or the deadline. Claiming is a single map removal, so whichever
//! arrives first wins and the others find nothing.

use crate::utils::ids::{CorrelationToken, TransactionId};
use crate::wire::Header;
use std::collections::HashMap;
use tokio::task::AbortHandle;

/// Binding between a replay attempt and its execution
#[derive(Debug)]
pub struct ReplayCorrelation {
    /// Token carried in the marker header
    pub token: CorrelationToken,

    /// Synthetic ledger row the outcome is written onto
    pub row_id: TransactionId,

    /// Captured row the operator replayed
    pub source_id: TransactionId,

    /// Headers to substitute on resume, stored without the marker header
    pub headers: Vec<Header>,

    /// Body to substitute on resume
    pub body: String,

    deadline: Option<AbortHandle>,
}

impl ReplayCorrelation {
    pub fn new(
        token: CorrelationToken,
        row_id: TransactionId,
        source_id: TransactionId,
        headers: Vec<Header>,
        body: String,
    ) -> Self {
        Self {
            token,
            row_id,
            source_id,
            headers,
            body,
            deadline: None,
        }
    }

    /// Attach the deadline task's abort handle
    pub fn set_deadline(&mut self, handle: AbortHandle) {
        self.deadline = Some(handle);
    }

    /// Cancel the deadline task; safe to call after it fired
    pub fn abort_deadline(&self) {
        if let Some(handle) = &self.deadline {
            handle.abort();
        }
    }
}

/// Live correlations keyed by token
#[derive(Debug, Default)]
pub struct CorrelationMap {
    entries: HashMap<CorrelationToken, ReplayCorrelation>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, correlation: ReplayCorrelation) {
        self.entries
            .insert(correlation.token.clone(), correlation);
    }

    /// Remove and return the correlation for a token
    ///
    /// The caller owns the outcome; later claims of the same token get
    /// `None` and must treat the signal as stale.
    pub fn claim(&mut self, token: &CorrelationToken) -> Option<ReplayCorrelation> {
        self.entries.remove(token)
    }

    pub fn contains(&self, token: &CorrelationToken) -> bool {
        self.entries.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Abort every deadline task and drop all entries, used at shutdown
    pub fn abort_all(&mut self) -> usize {
        let count = self.entries.len();
        for correlation in self.entries.values() {
            correlation.abort_deadline();
        }
        self.entries.clear();
        count
    }
}
