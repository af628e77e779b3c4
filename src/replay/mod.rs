// src/replay/mod.rs
//! Replay subsystem
//!
//! Re-executes a captured exchange out of band and correlates the re-emitted
//! traffic back to a synthetic ledger row:
//!
//! - `manager`: orchestrates one replay attempt end to end
//! - `correlation`: claim-once token map with per-entry deadline handles
//! - `injector`: execution seam (`ReplayInjector`) plus the scripted test double
//! - `http_injector`: direct HTTP execution over a hyper client
//!
//! Architecture:
//!
//! ```text
//! request_replay ──> parse + guard ──> ledger row (awaiting)
//!        │                                  │
//!        ├──> CorrelationMap entry ──> deadline task
//!        │
//!        └──> injection task ──> marker header ──> ReplayInjector::execute
//!
//! completion = first claim of the token:
//!   router match | direct signal | deadline
//! ```

pub mod correlation;
pub mod http_injector;
pub mod injector;
pub mod manager;

// Re-export commonly used types
pub use correlation::{CorrelationMap, ReplayCorrelation};
pub use http_injector::HttpInjector;
pub use injector::{ReplayInjector, ScriptedInjector};
pub use manager::{ReplayManager, REPLAY_TIMEOUT_TEXT};
