// src/replay/injector.rs
//! The replay injector seam
//!
//! A replay is executed out-of-band through this trait. The engine decides
//! which execution context to target (the original tab when still alive,
//! otherwise the fallback) and hands the injector a fully assembled request
//! already carrying the marker header.

use crate::utils::errors::{EngineError, Result};
use crate::utils::ids::TabId;
use crate::wire::{RawRequest, RawResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Out-of-band execution of replayed requests
#[async_trait]
pub trait ReplayInjector: Send + Sync {
    /// Whether the given tab can still execute requests
    async fn context_alive(&self, tab_id: TabId) -> bool;

    /// An alternative execution context when the original tab is gone
    async fn fallback_context(&self) -> Option<TabId>;

    /// Execute the request in the given context and return its response
    async fn execute(&self, tab_id: TabId, request: &RawRequest) -> Result<RawResponse>;
}

/// Scriptable injector for tests
///
/// Records every executed request. Responses are answered from a scripted
/// queue, defaulting to an empty 200. `hold_responses` makes `execute`
/// park forever after recording, for driving the interception-matched
/// completion path by hand.
#[derive(Default)]
pub struct ScriptedInjector {
    executed: Mutex<Vec<(TabId, RawRequest)>>,
    alive: Mutex<HashSet<TabId>>,
    fallback: Mutex<Option<TabId>>,
    responses: Mutex<VecDeque<Result<RawResponse>>>,
    hold: AtomicBool,
    parked: Notify,
}

impl ScriptedInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a tab as a live execution context
    pub fn mark_alive(&self, tab_id: TabId) {
        self.alive.lock().insert(tab_id);
    }

    /// Remove a tab from the live set
    pub fn mark_gone(&self, tab_id: TabId) {
        self.alive.lock().remove(&tab_id);
    }

    /// Configure the fallback context
    pub fn set_fallback(&self, tab_id: Option<TabId>) {
        *self.fallback.lock() = tab_id;
    }

    /// Queue the next response `execute` returns
    pub fn script_response(&self, response: Result<RawResponse>) {
        self.responses.lock().push_back(response);
    }

    /// Park every `execute` call after recording it
    pub fn hold_responses(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Requests executed so far, with their target context
    pub fn executed(&self) -> Vec<(TabId, RawRequest)> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl ReplayInjector for ScriptedInjector {
    async fn context_alive(&self, tab_id: TabId) -> bool {
        self.alive.lock().contains(&tab_id)
    }

    async fn fallback_context(&self) -> Option<TabId> {
        *self.fallback.lock()
    }

    async fn execute(&self, tab_id: TabId, request: &RawRequest) -> Result<RawResponse> {
        self.executed.lock().push((tab_id, request.clone()));
        if self.hold.load(Ordering::SeqCst) {
            loop {
                self.parked.notified().await;
            }
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::new(200, "OK")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_tracking() {
        let injector = ScriptedInjector::new();
        assert!(!injector.context_alive(1).await);

        injector.mark_alive(1);
        assert!(injector.context_alive(1).await);

        injector.mark_gone(1);
        assert!(!injector.context_alive(1).await);

        injector.set_fallback(Some(9));
        assert_eq!(injector.fallback_context().await, Some(9));
    }

    #[tokio::test]
    async fn test_execute_records_and_answers() {
        let injector = ScriptedInjector::new();
        let mut scripted = RawResponse::new(503, "Service Unavailable");
        scripted.body = "down".to_string();
        injector.script_response(Ok(scripted));

        let request = RawRequest::new("GET", "https://example.com/a");
        let response = injector.execute(4, &request).await.unwrap();
        assert_eq!(response.status, 503);

        let default = injector.execute(4, &request).await.unwrap();
        assert_eq!(default.status, 200);

        let executed = injector.executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[0].0, 4);
        assert_eq!(executed[0].1.url, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let injector = ScriptedInjector::new();
        injector.script_response(Err(EngineError::InjectionFailed(
            "context crashed".to_string(),
        )));

        let request = RawRequest::new("GET", "https://example.com/a");
        assert!(injector.execute(4, &request).await.is_err());
    }
}
