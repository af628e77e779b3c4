// src/interception/mod.rs
//! Interception layer
//!
//! This module owns everything between the low-level pause channel and the
//! ledger:
//!
//! - **Events**: boundary validation of pause notices, typed engine events
//! - **Channel**: the seam commands travel back through (resume, body fetch)
//! - **Router**: the state machine that classifies every pause event
//!
//! # Architecture
//!
//! ```text
//! Pause notice → validate → RequestPaused / ResponsePaused
//!                                 │
//!                            EventRouter
//!     ┌──────────┬──────────┬────┴─────┬───────────────┐
//!  bypass    replay      proxy      response       new exchange
//!  resume     claim      check     completion       / redirect
//! ```
//!
//! Suspension points (body fetch, resume) run as spawned tasks whose
//! outcomes re-enter the event queue, so router handlers never await.

pub mod channel;
pub mod event;
pub mod router;

// Re-export commonly used types
pub use channel::{InterceptionChannel, IssuedCommand, ResumeOverrides, ScriptedChannel};
pub use event::{EngineEvent, PauseEvent, PauseNotice, PauseStage, RequestSummary, ResponseSummary};
pub use router::EventRouter;
