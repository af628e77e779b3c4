// src/replay/manager.rs
//! Replay orchestration
//!
//! One replay attempt moves through: idempotency guard on the source row,
//! parse of the edited raw text, immediate synthetic ledger row, correlation
//! registration with a deadline task, then the spawned out-of-band
//! execution. Exactly one of three completion paths resolves it: the router
//! claiming the correlation when the exchange reappears on the interception
//! channel, the direct completion signal from the injector task, or the
//! deadline. Each path starts by claiming the correlation from the map, so
//! the first to arrive wins and the others become no-ops.

use crate::engine::commands::EngineMsg;
use crate::engine::runtime::EngineState;
use crate::interception::event::EngineEvent;
use crate::ledger::transaction::Transaction;
use crate::replay::correlation::ReplayCorrelation;
use crate::replay::injector::ReplayInjector;
use crate::utils::errors::{EngineError, Result};
use crate::utils::ids::{CorrelationToken, TabId, TransactionId};
use crate::wire::{Header, RawRequest, RawResponse};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Response text written onto a replay row whose deadline fired
pub const REPLAY_TIMEOUT_TEXT: &str = "replay timed out before a response arrived";

/// Drives replay attempts and resolves their outcomes
pub struct ReplayManager {
    injector: Arc<dyn ReplayInjector>,
    events: mpsc::UnboundedSender<EngineMsg>,
    marker_header: String,
    deadline: Duration,
}

impl ReplayManager {
    pub fn new(
        injector: Arc<dyn ReplayInjector>,
        events: mpsc::UnboundedSender<EngineMsg>,
        marker_header: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            injector,
            events,
            marker_header: marker_header.into(),
            deadline,
        }
    }

    /// Operator replay command; fire-and-forget, outcome arrives via the
    /// ledger
    pub fn request_replay(
        &self,
        state: &mut EngineState,
        source_id: TransactionId,
        edited_raw_request: String,
        edited_headers: Vec<Header>,
    ) {
        let Some(tab_id) = state.ledger.find(&source_id).map(|row| row.tab_id) else {
            warn!(id = %source_id, "replay requested for unknown transaction");
            return;
        };

        if !state.pending.begin(&source_id) {
            debug!(id = %source_id, "replay already in flight");
            return;
        }

        let mut request = match RawRequest::parse(&edited_raw_request) {
            Ok(request) => request,
            Err(e) => {
                warn!(id = %source_id, error = %e, "replay request rejected");
                counter!("tapwire_replays_rejected_total").increment(1);
                state.pending.clear(&source_id);
                return;
            }
        };
        if !edited_headers.is_empty() {
            request.headers = edited_headers;
        }
        request.remove_header(&self.marker_header);

        let token = CorrelationToken::generate();
        let row_id = TransactionId::for_replay(&token);
        info!(source = %source_id, row = %row_id, "replay requested");
        counter!("tapwire_replays_requested_total").increment(1);

        state
            .ledger
            .upsert(Transaction::replay_row(row_id.clone(), tab_id, &request));

        let mut correlation = ReplayCorrelation::new(
            token.clone(),
            row_id,
            source_id,
            request.headers.clone(),
            request.body.clone(),
        );
        correlation.set_deadline(self.spawn_deadline(token.clone()));
        state.correlations.insert(correlation);

        self.spawn_injection(token, tab_id, request);
    }

    /// Direct completion signal from the injection task
    pub fn on_completed(
        &self,
        state: &mut EngineState,
        token: CorrelationToken,
        result: Result<RawResponse>,
    ) {
        let Some(correlation) = state.correlations.claim(&token) else {
            debug!(token = %token, "stale replay completion ignored");
            return;
        };
        correlation.abort_deadline();
        state.pending.clear(&correlation.source_id);

        let text = match result {
            Ok(response) => {
                info!(row = %correlation.row_id, status = response.status, "replay completed");
                counter!("tapwire_replays_completed_total").increment(1);
                response.to_text()
            }
            Err(e) => {
                warn!(row = %correlation.row_id, error = %e, "replay failed");
                counter!("tapwire_replays_failed_total").increment(1);
                e.to_string()
            }
        };

        if !state
            .ledger
            .update(&correlation.row_id, |row| row.finish_with(text))
        {
            debug!(row = %correlation.row_id, "replay row gone before completion");
        }
    }

    /// The correlation's deadline elapsed with no other path claiming it
    pub fn on_deadline(&self, state: &mut EngineState, token: CorrelationToken) {
        let Some(correlation) = state.correlations.claim(&token) else {
            return;
        };
        warn!(row = %correlation.row_id, "replay deadline fired");
        counter!("tapwire_replays_timed_out_total").increment(1);

        state.pending.clear(&correlation.source_id);
        if !state
            .ledger
            .update(&correlation.row_id, |row| {
                row.finish_with(REPLAY_TIMEOUT_TEXT)
            })
        {
            debug!(row = %correlation.row_id, "replay row gone before deadline");
        }
    }

    fn spawn_deadline(&self, token: CorrelationToken) -> tokio::task::AbortHandle {
        let events = self.events.clone();
        let deadline = self.deadline;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let _ = events.send(EngineMsg::Event(EngineEvent::DeadlineFired { token }));
        });
        handle.abort_handle()
    }

    fn spawn_injection(&self, token: CorrelationToken, tab_id: TabId, mut request: RawRequest) {
        request.set_header(&self.marker_header, token.as_str());

        let injector = Arc::clone(&self.injector);
        let events = self.events.clone();
        tokio::spawn(async move {
            let target = if injector.context_alive(tab_id).await {
                Some(tab_id)
            } else {
                injector.fallback_context().await
            };

            let result = match target {
                Some(context) => injector.execute(context, &request).await,
                None => Err(EngineError::InjectionFailed(
                    "no execution context available".to_string(),
                )),
            };
            let _ = events.send(EngineMsg::Event(EngineEvent::ReplayCompleted {
                token,
                result,
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::TransactionStatus;
    use crate::replay::injector::ScriptedInjector;
    use crate::utils::config::EngineConfig;
    use crate::utils::ids::PauseId;

    const MARKER: &str = "x-tapwire-replay";

    fn setup(
        deadline: Duration,
    ) -> (
        EngineState,
        ReplayManager,
        Arc<ScriptedInjector>,
        mpsc::UnboundedReceiver<EngineMsg>,
    ) {
        let injector = Arc::new(ScriptedInjector::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ReplayManager::new(
            Arc::clone(&injector) as Arc<dyn ReplayInjector>,
            tx,
            MARKER,
            deadline,
        );
        let state = EngineState::new(EngineConfig::default());
        (state, manager, injector, rx)
    }

    fn seed_source(state: &mut EngineState, id: &str) -> TransactionId {
        let source_id = TransactionId::new(id);
        let mut request = RawRequest::new("GET", "https://example.com/orders");
        request.set_header("Accept", "application/json");
        state.ledger.upsert(Transaction::captured(
            source_id.clone(),
            7,
            Some(PauseId::new("p-src")),
            &request,
        ));
        source_id
    }

    fn replay_row_id(state: &EngineState) -> TransactionId {
        state
            .ledger
            .all()
            .iter()
            .find(|row| row.is_replay)
            .map(|row| row.id.clone())
            .expect("replay row present")
    }

    #[tokio::test]
    async fn test_request_replay_creates_awaiting_row_and_correlation() {
        let (mut state, manager, injector, _rx) = setup(Duration::from_secs(30));
        injector.mark_alive(7);
        injector.hold_responses();
        let source = seed_source(&mut state, "src-1");

        manager.request_replay(
            &mut state,
            source.clone(),
            "GET https://example.com/orders HTTP/1.1\nAccept: application/json\n\n".to_string(),
            vec![],
        );

        assert_eq!(state.ledger.len(), 2);
        let row = state.ledger.all().iter().find(|r| r.is_replay).unwrap();
        assert_eq!(row.status, TransactionStatus::Awaiting);
        assert!(row.protocol_request_id.is_none());
        assert_eq!(state.correlations.len(), 1);
        assert!(state.pending.is_pending(&source));
    }

    #[tokio::test]
    async fn test_double_request_is_ignored_while_pending() {
        let (mut state, manager, injector, _rx) = setup(Duration::from_secs(30));
        injector.mark_alive(7);
        injector.hold_responses();
        let source = seed_source(&mut state, "src-1");
        let raw = "GET https://example.com/orders HTTP/1.1\n\n".to_string();

        manager.request_replay(&mut state, source.clone(), raw.clone(), vec![]);
        manager.request_replay(&mut state, source, raw, vec![]);

        assert_eq!(state.correlations.len(), 1);
        assert_eq!(
            state.ledger.all().iter().filter(|r| r.is_replay).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_parse_failure_releases_guard() {
        let (mut state, manager, _injector, _rx) = setup(Duration::from_secs(30));
        let source = seed_source(&mut state, "src-1");

        manager.request_replay(&mut state, source.clone(), String::new(), vec![]);

        assert!(!state.pending.is_pending(&source));
        assert_eq!(state.ledger.len(), 1);
        assert!(state.correlations.is_empty());

        manager.request_replay(
            &mut state,
            source,
            "GET https://example.com/orders HTTP/1.1\n\n".to_string(),
            vec![],
        );
        assert_eq!(state.correlations.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_request_carries_marker_and_clean_correlation() {
        let (mut state, manager, injector, _rx) = setup(Duration::from_secs(30));
        injector.mark_alive(7);
        injector.hold_responses();
        let source = seed_source(&mut state, "src-1");

        manager.request_replay(
            &mut state,
            source,
            "POST https://example.com/orders HTTP/1.1\nContent-Type: application/json\n\n{\"n\":1}"
                .to_string(),
            vec![],
        );

        let row_id = replay_row_id(&state);
        let token = row_id.as_str().strip_prefix("replay-").unwrap().to_string();

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if !injector.executed().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let executed = injector.executed();
        assert_eq!(executed[0].0, 7);
        assert_eq!(executed[0].1.header(MARKER), Some(token.as_str()));

        let correlation = state
            .correlations
            .claim(&CorrelationToken::new(token))
            .unwrap();
        assert!(crate::wire::find_header(&correlation.headers, MARKER).is_none());
        assert_eq!(correlation.body, "{\"n\":1}");
    }

    #[tokio::test]
    async fn test_edited_headers_replace_parsed_ones() {
        let (mut state, manager, injector, _rx) = setup(Duration::from_secs(30));
        injector.mark_alive(7);
        injector.hold_responses();
        let source = seed_source(&mut state, "src-1");

        manager.request_replay(
            &mut state,
            source,
            "GET https://example.com/orders HTTP/1.1\nAccept: text/html\n\n".to_string(),
            vec![Header::new("Accept", "application/json")],
        );

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if !injector.executed().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let executed = injector.executed();
        assert_eq!(executed[0].1.header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_direct_completion_finishes_row_once() {
        let (mut state, manager, injector, _rx) = setup(Duration::from_secs(30));
        injector.mark_alive(7);
        injector.hold_responses();
        let source = seed_source(&mut state, "src-1");
        manager.request_replay(
            &mut state,
            source.clone(),
            "GET https://example.com/orders HTTP/1.1\n\n".to_string(),
            vec![],
        );
        let row_id = replay_row_id(&state);
        let token = CorrelationToken::new(row_id.as_str().strip_prefix("replay-").unwrap());

        let mut response = RawResponse::new(201, "Created");
        response.body = "ok".to_string();
        manager.on_completed(&mut state, token.clone(), Ok(response));

        let row = state.ledger.find(&row_id).unwrap();
        assert!(row.is_finished());
        assert!(row
            .raw_response
            .as_deref()
            .unwrap()
            .starts_with("HTTP/1.1 201 Created"));
        assert!(!state.pending.is_pending(&source));
        assert!(state.correlations.is_empty());

        manager.on_completed(
            &mut state,
            token,
            Ok(RawResponse::new(500, "Internal Server Error")),
        );
        let row = state.ledger.find(&row_id).unwrap();
        assert!(row
            .raw_response
            .as_deref()
            .unwrap()
            .starts_with("HTTP/1.1 201 Created"));
    }

    #[tokio::test]
    async fn test_deadline_fires_and_later_completion_is_stale() {
        let (mut state, manager, injector, mut rx) = setup(Duration::from_millis(40));
        injector.mark_alive(7);
        injector.hold_responses();
        let source = seed_source(&mut state, "src-1");
        manager.request_replay(
            &mut state,
            source.clone(),
            "GET https://example.com/orders HTTP/1.1\n\n".to_string(),
            vec![],
        );
        let row_id = replay_row_id(&state);

        let fired = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Some(EngineMsg::Event(EngineEvent::DeadlineFired { token })) => break token,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .unwrap();

        manager.on_deadline(&mut state, fired.clone());
        let row = state.ledger.find(&row_id).unwrap();
        assert_eq!(row.raw_response.as_deref(), Some(REPLAY_TIMEOUT_TEXT));
        assert!(!state.pending.is_pending(&source));

        manager.on_completed(&mut state, fired.clone(), Ok(RawResponse::new(200, "OK")));
        let row = state.ledger.find(&row_id).unwrap();
        assert_eq!(row.raw_response.as_deref(), Some(REPLAY_TIMEOUT_TEXT));

        manager.on_deadline(&mut state, fired);
    }

    #[tokio::test]
    async fn test_no_execution_context_reports_injection_failure() {
        let (mut state, manager, injector, mut rx) = setup(Duration::from_secs(30));
        injector.set_fallback(None);
        let source = seed_source(&mut state, "src-1");
        manager.request_replay(
            &mut state,
            source,
            "GET https://example.com/orders HTTP/1.1\n\n".to_string(),
            vec![],
        );
        let row_id = replay_row_id(&state);

        let (token, result) = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Some(EngineMsg::Event(EngineEvent::ReplayCompleted { token, result })) => {
                        break (token, result)
                    }
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .unwrap();
        assert!(result.is_err());

        manager.on_completed(&mut state, token, result);
        let row = state.ledger.find(&row_id).unwrap();
        assert_eq!(
            row.raw_response.as_deref(),
            Some("replay injection failed: no execution context available")
        );
    }

    #[tokio::test]
    async fn test_gone_tab_falls_back_to_foreground_context() {
        let (mut state, manager, injector, _rx) = setup(Duration::from_secs(30));
        injector.set_fallback(Some(99));
        injector.hold_responses();
        let source = seed_source(&mut state, "src-1");

        manager.request_replay(
            &mut state,
            source,
            "GET https://example.com/orders HTTP/1.1\n\n".to_string(),
            vec![],
        );

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if !injector.executed().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(injector.executed()[0].0, 99);
    }

    #[tokio::test]
    async fn test_replay_for_unknown_transaction_is_rejected() {
        let (mut state, manager, _injector, _rx) = setup(Duration::from_secs(30));
        manager.request_replay(
            &mut state,
            TransactionId::new("missing"),
            "GET https://example.com/ HTTP/1.1\n\n".to_string(),
            vec![],
        );

        assert!(state.ledger.is_empty());
        assert!(state.correlations.is_empty());
        assert!(state.pending.is_empty());
    }
}
