// src/lib.rs
//! Tapwire Interception Engine Library
//!
//! This library provides the core components for intercepting live network
//! transactions, replaying captured exchanges, and correlating asynchronous
//! results back to their origin.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **engine**: Command intake, worker loop, and the public facade
//! - **interception**: Pause events and the event-routing state machine
//! - **replay**: Out-of-band replay execution and result correlation
//! - **ledger**: In-memory transaction ledger and pending-action tracking
//! - **broadcast**: Snapshot push channel for observers
//! - **pipeline**: Content transformation and proxy reconciliation seams
//! - **wire**: Raw HTTP request/response text parsing and assembly
//! - **observability**: Metrics, tracing, and logging
//! - **utils**: Configuration, errors, and identifiers

// Public module exports
pub mod broadcast;
pub mod engine;
pub mod interception;
pub mod ledger;
pub mod observability;
pub mod pipeline;
pub mod replay;
pub mod utils;
pub mod wire;

// Re-export commonly used types
pub use broadcast::LedgerSnapshot;
pub use engine::{EngineCommand, InterceptEngine, Mode};
pub use interception::event::{EngineEvent, PauseEvent, PauseNotice, PauseStage};
pub use ledger::transaction::{Transaction, TransactionStatus};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};
pub use utils::ids::{CorrelationToken, PauseId, TabId, TransactionId};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Engine build information
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
        }
    }
}
