// src/utils/ids.rs
//! Identifier newtypes
//!
//! Transactions, pause events, and replay correlations each carry their own
//! identifier type so the three id spaces cannot be mixed up at call sites.
//! All three wrap opaque strings and serialize transparently.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identity of the browser tab an exchange originated from
pub type TabId = i64;

/// Stable identity of a ledger transaction
///
/// Equals the low-level network identifier when the interception channel
/// provides one, otherwise a composite of tab identity and pause identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Composite identity for exchanges without a network identifier
    pub fn composite(tab_id: TabId, pause_id: &PauseId) -> Self {
        Self(format!("{}:{}", tab_id, pause_id))
    }

    /// Identity for a synthetic replay row, minted from its correlation token
    pub fn for_replay(token: &CorrelationToken) -> Self {
        Self(format!("replay-{}", token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a single pause event on the interception channel
///
/// A pause id is scoped to one held exchange hop. Redirects and replays
/// produce fresh pause ids for the same logical transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PauseId(String);

impl PauseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PauseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PauseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque token carried on a replayed exchange via the marker header
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Mint a fresh token, unique per replay attempt
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
