// src/utils/mod.rs
//! Common utilities and helpers
//!
//! - **config**: Engine configuration loading and validation
//! - **errors**: Crate-wide error types
//! - **ids**: Identifier newtypes for transactions, pauses, and correlations

pub mod config;
pub mod errors;
pub mod ids;

// Re-export commonly used types
pub use config::EngineConfig;
pub use errors::{EngineError, Result};
pub use ids::{CorrelationToken, PauseId, TabId, TransactionId};
