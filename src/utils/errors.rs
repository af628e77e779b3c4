// src/utils/errors.rs
//! Crate-wide error types
//!
//! All fallible engine operations return [`Result`], which wraps
//! [`EngineError`]. Event handlers never propagate errors past their own
//! dispatch: failures are converted into ledger state (error text on the
//! affected transaction) so an intercepted exchange is never left paused.

use thiserror::Error;

/// Errors produced by the interception engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// The interception channel rejected or failed a command
    #[error("interception channel failed: {0}")]
    ChannelFailed(String),

    /// A pause notice failed boundary validation
    #[error("invalid pause notice: {0}")]
    InvalidNotice(String),

    /// Raw request text could not be parsed into method/URL/headers/body
    #[error("malformed raw request: {0}")]
    MalformedRequest(String),

    /// An out-of-band replay execution could not be issued or completed
    #[error("replay injection failed: {0}")]
    InjectionFailed(String),

    /// Configuration loading or validation failed
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Tracing or metrics initialization failed
    #[error("observability setup failed: {0}")]
    ObservabilityError(String),

    /// The engine worker has stopped and no longer accepts messages
    #[error("engine stopped")]
    EngineStopped,
}

/// Convenience result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
