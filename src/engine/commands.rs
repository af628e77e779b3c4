// src/engine/commands.rs
//! Operator commands and the worker inbox message type

use crate::interception::event::EngineEvent;
use crate::utils::config::Mode;
use crate::utils::ids::TransactionId;
use crate::wire::Header;

/// Operator-issued commands, delivered through the engine facade
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Release a held transaction, optionally with edited request headers
    Resume {
        transaction_id: TransactionId,
        edited_headers: Vec<Header>,
    },

    /// Re-execute a captured exchange out of band
    RequestReplay {
        transaction_id: TransactionId,
        edited_raw_request: String,
        edited_headers: Vec<Header>,
    },

    /// Drop every ledger row and every pending guard
    ClearAll,

    /// Switch between interception and pass-through behaviour
    SetMode(Mode),

    /// Stop the worker after draining queued messages
    Shutdown,
}

/// Everything the single worker task consumes, in arrival order
///
/// Events and commands share one queue so that state transitions are
/// totally ordered; no handler ever observes a half-applied change.
#[derive(Debug)]
pub enum EngineMsg {
    Event(EngineEvent),
    Command(EngineCommand),
}
