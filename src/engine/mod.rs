// src/engine/mod.rs
//! Engine assembly and operator facade
//!
//! - `commands`: operator commands and the worker inbox message type
//! - `runtime`: the exclusively-owned state and the worker task
//!
//! `InterceptEngine` wires the event router, the replay manager, and the
//! worker together and is the only handle an embedding layer needs:
//! notices and commands go in through one queue, ledger snapshots come
//! back out through a watch channel.
//!
//! Architecture:
//!
//! ```text
//! pause-channel adapter ──notice──> InterceptEngine ──msg──> worker task
//!                                        │                      │
//! operator UI ──resume/replay/clear──────┘               EventRouter
//!      ▲                                                 ReplayManager
//!      │                                                       │
//!      └──────────────── watch<LedgerSnapshot> <── TransactionLedger
//! ```

pub mod commands;
pub mod runtime;

// Re-export commonly used types
pub use crate::utils::config::Mode;
pub use commands::{EngineCommand, EngineMsg};
pub use runtime::EngineState;

use crate::broadcast::{LedgerSnapshot, SnapshotReceiver};
use crate::interception::channel::InterceptionChannel;
use crate::interception::event::{EngineEvent, PauseNotice, PauseStage};
use crate::interception::router::EventRouter;
use crate::pipeline::content::{ContentPipeline, PassthroughPipeline};
use crate::pipeline::proxy::{AllowListReconciler, ProxyReconciler};
use crate::replay::http_injector::HttpInjector;
use crate::replay::injector::ReplayInjector;
use crate::replay::manager::ReplayManager;
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use crate::utils::ids::TransactionId;
use crate::wire::Header;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to a running engine worker
pub struct InterceptEngine {
    tx: mpsc::UnboundedSender<EngineMsg>,
    snapshots: SnapshotReceiver,
    worker: JoinHandle<()>,
}

impl InterceptEngine {
    /// Start a worker with explicit collaborators
    pub fn start(
        config: EngineConfig,
        channel: Arc<dyn InterceptionChannel>,
        pipeline: Arc<dyn ContentPipeline>,
        reconciler: Arc<dyn ProxyReconciler>,
        injector: Arc<dyn ReplayInjector>,
    ) -> Self {
        let marker_header = config.replay.marker_header.clone();
        let deadline = Duration::from_secs(config.replay.deadline_secs);
        let mode = config.mode;

        let (tx, rx) = mpsc::unbounded_channel();
        let state = EngineState::new(config);
        let snapshots = state.ledger.subscribe();

        let router = EventRouter::new(
            channel,
            pipeline,
            reconciler,
            tx.clone(),
            marker_header.clone(),
        );
        let manager = ReplayManager::new(injector, tx.clone(), marker_header, deadline);

        info!(?mode, "engine started");
        let worker = tokio::spawn(runtime::run_worker(state, router, manager, rx));
        Self {
            tx,
            snapshots,
            worker,
        }
    }

    /// Start with the stock collaborators: a pass-through pipeline, an
    /// allow-list reconciler seeded from the config, and direct HTTP
    /// replay execution
    pub fn with_defaults(config: EngineConfig, channel: Arc<dyn InterceptionChannel>) -> Self {
        let reconciler = AllowListReconciler::with_defaults();
        for host in &config.bypass_hosts {
            reconciler.add_pattern(host.clone());
        }
        Self::start(
            config,
            channel,
            Arc::new(PassthroughPipeline),
            Arc::new(reconciler),
            Arc::new(HttpInjector::new()),
        )
    }

    /// Validate a raw pause notice and enqueue it under its stage
    pub fn submit_notice(&self, notice: PauseNotice) -> Result<()> {
        let event = notice.validate()?;
        let event = match event.stage {
            PauseStage::Request => EngineEvent::RequestPaused(event),
            PauseStage::Response => EngineEvent::ResponsePaused(event),
        };
        self.submit_event(event)
    }

    /// Enqueue an already-typed event
    pub fn submit_event(&self, event: EngineEvent) -> Result<()> {
        self.send(EngineMsg::Event(event))
    }

    /// Release a held transaction, optionally with edited request headers
    pub fn resume(
        &self,
        transaction_id: impl Into<TransactionId>,
        edited_headers: Vec<Header>,
    ) -> Result<()> {
        self.send(EngineMsg::Command(EngineCommand::Resume {
            transaction_id: transaction_id.into(),
            edited_headers,
        }))
    }

    /// Re-execute a captured exchange out of band
    pub fn request_replay(
        &self,
        transaction_id: impl Into<TransactionId>,
        edited_raw_request: impl Into<String>,
        edited_headers: Vec<Header>,
    ) -> Result<()> {
        self.send(EngineMsg::Command(EngineCommand::RequestReplay {
            transaction_id: transaction_id.into(),
            edited_raw_request: edited_raw_request.into(),
            edited_headers,
        }))
    }

    /// Drop every ledger row and every pending guard
    pub fn clear_all(&self) -> Result<()> {
        self.send(EngineMsg::Command(EngineCommand::ClearAll))
    }

    /// Switch between interception and pass-through behaviour
    pub fn set_mode(&self, mode: Mode) -> Result<()> {
        self.send(EngineMsg::Command(EngineCommand::SetMode(mode)))
    }

    /// The current full snapshot; a fresh observer starts here instead of
    /// relying on having seen intermediate broadcasts
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that observes every future snapshot
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshots.clone()
    }

    /// Stop the worker after it drains already-queued messages
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.tx.send(EngineMsg::Command(EngineCommand::Shutdown));
        self.worker
            .await
            .map_err(|e| EngineError::ChannelFailed(format!("worker join failed: {}", e)))
    }

    fn send(&self, msg: EngineMsg) -> Result<()> {
        self.tx.send(msg).map_err(|_| EngineError::EngineStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::channel::ScriptedChannel;

    fn notice(pause: &str, url: &str) -> PauseNotice {
        PauseNotice {
            pause_id: pause.to_string(),
            network_id: Some(format!("net-{}", pause)),
            tab_id: 1,
            url: Some(url.to_string()),
            method: Some("GET".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_notice_is_rejected_at_the_boundary() {
        let channel = Arc::new(ScriptedChannel::new());
        let engine = InterceptEngine::with_defaults(
            EngineConfig::default(),
            channel as Arc<dyn InterceptionChannel>,
        );

        let mut bad = notice("p1", "https://example.com/a");
        bad.url = None;
        let err = engine.submit_notice(bad).unwrap_err();
        assert!(matches!(err, EngineError::InvalidNotice(_)));

        assert!(engine.snapshot().transactions().is_empty());
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_fresh_subscriber_starts_from_current_snapshot() {
        let channel = Arc::new(ScriptedChannel::new());
        let engine = InterceptEngine::with_defaults(
            EngineConfig::default(),
            channel as Arc<dyn InterceptionChannel>,
        );

        engine
            .submit_notice(notice("p1", "https://example.com/a"))
            .unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while engine.snapshot().transactions().is_empty() {
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for the captured row");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let late = engine.subscribe();
        assert_eq!(late.borrow().transactions().len(), 1);
        assert!(late.borrow().revision() > 0);
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_joins_the_worker() {
        let channel = Arc::new(ScriptedChannel::new());
        let engine = InterceptEngine::with_defaults(
            EngineConfig::default(),
            channel as Arc<dyn InterceptionChannel>,
        );
        engine.shutdown().await.unwrap();
    }
}
