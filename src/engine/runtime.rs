// src/engine/runtime.rs
//! Engine state and the single worker task
//!
//! Every ledger, guard, and correlation mutation happens on one task that
//! drains the shared message queue in arrival order. Handlers are
//! synchronous; anything that must await (resume commands, body fetches,
//! replay execution, deadlines) runs as a spawned task that posts its
//! outcome back onto the queue as another event.

use crate::engine::commands::{EngineCommand, EngineMsg};
use crate::interception::event::EngineEvent;
use crate::interception::router::EventRouter;
use crate::ledger::pending::PendingActionSet;
use crate::ledger::store::TransactionLedger;
use crate::replay::correlation::CorrelationMap;
use crate::replay::manager::ReplayManager;
use crate::utils::config::{EngineConfig, Mode};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Mutable engine state, owned exclusively by the worker task
pub struct EngineState {
    /// Behaviour for newly captured exchanges
    pub mode: Mode,

    /// All captured transactions, in insertion order
    pub ledger: TransactionLedger,

    /// Idempotency guards for operator-initiated actions
    pub pending: PendingActionSet,

    /// Live replay correlations awaiting one of their completion paths
    pub correlations: CorrelationMap,
}

impl EngineState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            mode: config.mode,
            ledger: TransactionLedger::new(),
            pending: PendingActionSet::new(),
            correlations: CorrelationMap::new(),
        }
    }

    /// Drop every row and every guard
    ///
    /// Live correlations are kept; their completions resolve against the
    /// emptied ledger as no-ops.
    pub fn clear_all(&mut self) {
        info!(rows = self.ledger.len(), "clearing ledger");
        self.ledger.clear();
        self.pending.reset();
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            info!(?mode, "engine mode changed");
            self.mode = mode;
        }
    }
}

/// Drain the queue until shutdown, dispatching events to the router and
/// the replay manager
pub(crate) async fn run_worker(
    mut state: EngineState,
    router: EventRouter,
    manager: ReplayManager,
    mut inbox: mpsc::UnboundedReceiver<EngineMsg>,
) {
    while let Some(msg) = inbox.recv().await {
        match msg {
            EngineMsg::Event(EngineEvent::RequestPaused(event)) => {
                router.on_request_paused(&mut state, event)
            }
            EngineMsg::Event(EngineEvent::ResponsePaused(event)) => {
                router.on_response_paused(&mut state, event)
            }
            EngineMsg::Event(EngineEvent::BodyFetched {
                transaction_id,
                pause_id,
                response,
                body,
            }) => router.on_body_fetched(&mut state, transaction_id, pause_id, response, body),
            EngineMsg::Event(EngineEvent::ResumeFailed {
                transaction_id,
                pause_id,
                error,
            }) => router.on_resume_failed(&mut state, transaction_id, pause_id, error),
            EngineMsg::Event(EngineEvent::ReplayCompleted { token, result }) => {
                manager.on_completed(&mut state, token, result)
            }
            EngineMsg::Event(EngineEvent::DeadlineFired { token }) => {
                manager.on_deadline(&mut state, token)
            }
            EngineMsg::Command(EngineCommand::Resume {
                transaction_id,
                edited_headers,
            }) => router.on_resume_command(&mut state, transaction_id, edited_headers),
            EngineMsg::Command(EngineCommand::RequestReplay {
                transaction_id,
                edited_raw_request,
                edited_headers,
            }) => manager.request_replay(
                &mut state,
                transaction_id,
                edited_raw_request,
                edited_headers,
            ),
            EngineMsg::Command(EngineCommand::ClearAll) => state.clear_all(),
            EngineMsg::Command(EngineCommand::SetMode(mode)) => state.set_mode(mode),
            EngineMsg::Command(EngineCommand::Shutdown) => {
                let live = state.correlations.abort_all();
                if live > 0 {
                    debug!(correlations = live, "aborted live replay deadlines");
                }
                break;
            }
        }
    }
    debug!("engine worker stopped");
}
