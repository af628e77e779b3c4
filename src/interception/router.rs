// src/interception/router.rs
//! The interception event router
//!
//! Classifies every pause event through a fixed sequence of checks and
//! drives the ledger accordingly:
//!
//! 1. bypass allow-list → resume untouched, never enters the ledger
//! 2. live replay correlation → claim it, rebind the replay row, resume
//!    with the stored content substituted
//! 3. proxy reconciliation (fresh Request-stage exchanges only)
//! 4. Response-stage completion for a known exchange
//! 5. Request-stage capture of a new exchange
//! 6. Request-stage re-pause of a known exchange (redirect hop)
//!
//! The first applicable check is terminal for that event. Handlers never
//! await: resume commands and body fetches run as spawned tasks whose
//! outcomes come back through the event queue, and every completion handler
//! re-validates the row it is about to touch.

use crate::engine::commands::EngineMsg;
use crate::engine::runtime::EngineState;
use crate::interception::channel::{InterceptionChannel, ResumeOverrides};
use crate::interception::event::{EngineEvent, PauseEvent, ResponseSummary};
use crate::ledger::transaction::{Transaction, TransactionStatus};
use crate::pipeline::content::{ContentPipeline, InjectionPoint, TransformContext};
use crate::pipeline::proxy::{ProxyReconciler, RequestContext};
use crate::replay::correlation::ReplayCorrelation;
use crate::utils::config::Mode;
use crate::utils::ids::{PauseId, TransactionId};
use crate::wire::{Header, RawRequest, RawResponse};
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The pause-event state machine
pub struct EventRouter {
    channel: Arc<dyn InterceptionChannel>,
    pipeline: Arc<dyn ContentPipeline>,
    reconciler: Arc<dyn ProxyReconciler>,
    events: mpsc::UnboundedSender<EngineMsg>,
    marker_header: String,
}

impl EventRouter {
    pub fn new(
        channel: Arc<dyn InterceptionChannel>,
        pipeline: Arc<dyn ContentPipeline>,
        reconciler: Arc<dyn ProxyReconciler>,
        events: mpsc::UnboundedSender<EngineMsg>,
        marker_header: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            pipeline,
            reconciler,
            events,
            marker_header: marker_header.into(),
        }
    }

    /// Handle a Request-stage pause event
    pub fn on_request_paused(&self, state: &mut EngineState, event: PauseEvent) {
        if self.reconciler.should_bypass(&event.request.url) {
            debug!(url = %event.request.url, "bypassed exchange");
            counter!("tapwire_exchanges_bypassed_total").increment(1);
            self.spawn_resume(event.pause_id, None, None);
            return;
        }

        if let Some(token) = event.marker_token(&self.marker_header) {
            if let Some(correlation) = state.correlations.claim(&token) {
                self.claim_replay(state, &event, correlation);
                return;
            }
            debug!(token = %token, "marker token without live correlation");
        }

        let transaction_id = event.transaction_id();
        if state.ledger.contains(&transaction_id) {
            self.rebind_known_exchange(state, event, transaction_id);
            return;
        }

        let ctx = RequestContext {
            url: event.request.url.clone(),
            method: event.request.method.clone(),
            tab_id: event.tab_id,
        };
        if self.reconciler.apply_if_enabled(&ctx) {
            debug!(url = %ctx.url, "exchange handled by proxy reconciliation");
            counter!("tapwire_exchanges_reconciled_total").increment(1);
            return;
        }

        self.capture_new_exchange(state, event, transaction_id);
    }

    /// Handle a Response-stage pause event
    pub fn on_response_paused(&self, state: &mut EngineState, event: PauseEvent) {
        if self.reconciler.should_bypass(&event.request.url) {
            debug!(url = %event.request.url, "bypassed response-stage exchange");
            counter!("tapwire_exchanges_bypassed_total").increment(1);
            self.spawn_resume(event.pause_id, None, None);
            return;
        }

        let Some(response) = event.response.clone() else {
            warn!(pause = %event.pause_id, "response-stage event without summary");
            self.spawn_resume(event.pause_id, None, None);
            return;
        };

        // The pause binding wins over the event's own identity: claimed
        // replay rows complete under their synthetic id, not the network id
        // the re-emitted exchange happened to get.
        let bound = state
            .ledger
            .find_by_pause(&event.pause_id)
            .map(|row| row.id.clone());
        let transaction_id = match bound {
            Some(id) => id,
            None => {
                let id = event.transaction_id();
                if !state.ledger.contains(&id) {
                    debug!(id = %id, "response for unknown exchange, capturing it first");
                    let row = self.build_captured_row(&event, id.clone());
                    state.ledger.upsert(row);
                }
                id
            }
        };

        state.pending.begin(&transaction_id);
        self.spawn_body_fetch(transaction_id, event.pause_id, response);
    }

    /// Completion of a spawned response-body fetch
    pub fn on_body_fetched(
        &self,
        state: &mut EngineState,
        transaction_id: TransactionId,
        pause_id: PauseId,
        response: ResponseSummary,
        body: crate::utils::errors::Result<String>,
    ) {
        let row_fields = state
            .ledger
            .find(&transaction_id)
            .map(|row| (row.tab_id, row.url.clone(), row.method.clone()));

        let Some((tab_id, url, method)) = row_fields else {
            debug!(id = %transaction_id, "row gone before body completion, resuming anyway");
            state.pending.clear(&transaction_id);
            self.spawn_resume(pause_id, None, None);
            return;
        };

        let text = match body {
            Ok(body_text) => {
                let ctx = TransformContext {
                    transaction_id: transaction_id.clone(),
                    tab_id,
                    url,
                    method,
                };
                let headers = self.pipeline.apply_headers(
                    response.headers.clone(),
                    InjectionPoint::ResponseHeaders,
                    &ctx,
                );
                let body_text =
                    self.pipeline
                        .apply_text(body_text, InjectionPoint::ResponseBody, &ctx);
                RawResponse {
                    status: response.status,
                    status_text: response.status_text.clone(),
                    headers,
                    body: body_text,
                }
                .to_text()
            }
            Err(e) => {
                warn!(id = %transaction_id, error = %e, "response body retrieval failed");
                counter!("tapwire_body_fetch_failures_total").increment(1);
                e.to_string()
            }
        };

        let redirect = response.is_redirect();
        state.ledger.update(&transaction_id, |row| {
            if redirect {
                row.is_redirect = true;
            }
            row.finish_with(text);
        });
        state.pending.clear(&transaction_id);
        counter!("tapwire_exchanges_completed_total").increment(1);

        self.spawn_resume(pause_id, None, Some(transaction_id));
    }

    /// Completion of a spawned resume that failed
    ///
    /// Force-finishes the affected row with the error text so nothing stays
    /// paused forever. Never overwrites a row that already finished with a
    /// real response.
    pub fn on_resume_failed(
        &self,
        state: &mut EngineState,
        transaction_id: Option<TransactionId>,
        pause_id: PauseId,
        error: String,
    ) {
        counter!("tapwire_resume_failures_total").increment(1);

        let id = transaction_id
            .or_else(|| state.ledger.find_by_pause(&pause_id).map(|r| r.id.clone()));
        let Some(id) = id else {
            warn!(pause = %pause_id, error = %error, "resume failed for untracked exchange");
            return;
        };

        let already_finished = state
            .ledger
            .find(&id)
            .map(|row| row.is_finished())
            .unwrap_or(true);
        if already_finished {
            debug!(id = %id, error = %error, "resume failed after row completion");
        } else {
            warn!(id = %id, error = %error, "resume failed, force-finishing row");
            state.ledger.update(&id, |row| row.finish_with(error.clone()));
        }
        state.pending.clear(&id);
    }

    /// Operator resume command
    pub fn on_resume_command(
        &self,
        state: &mut EngineState,
        transaction_id: TransactionId,
        edited_headers: Vec<Header>,
    ) {
        let row_fields = state
            .ledger
            .find(&transaction_id)
            .map(|row| (row.protocol_request_id.clone(), row.is_finished()));
        let Some((pause, finished)) = row_fields else {
            warn!(id = %transaction_id, "resume for unknown transaction");
            return;
        };
        if finished {
            debug!(id = %transaction_id, "resume for finished transaction ignored");
            return;
        }
        let Some(pause) = pause else {
            warn!(id = %transaction_id, "resume for transaction without pause binding");
            return;
        };
        if !state.pending.begin(&transaction_id) {
            debug!(id = %transaction_id, "resume already in flight");
            return;
        }

        info!(id = %transaction_id, "resuming exchange");
        counter!("tapwire_operator_resumes_total").increment(1);
        let overrides = if edited_headers.is_empty() {
            None
        } else {
            Some(ResumeOverrides::with_headers(edited_headers))
        };
        self.spawn_resume(pause, overrides, Some(transaction_id));
    }

    /// Case 2: a live correlation's exchange reappeared on the channel
    fn claim_replay(
        &self,
        state: &mut EngineState,
        event: &PauseEvent,
        correlation: ReplayCorrelation,
    ) {
        info!(token = %correlation.token, row = %correlation.row_id, "replayed exchange intercepted");
        counter!("tapwire_replays_matched_total").increment(1);

        correlation.abort_deadline();
        state.pending.begin(&correlation.row_id);
        if !state
            .ledger
            .rebind_pause(&correlation.row_id, event.pause_id.clone())
        {
            debug!(row = %correlation.row_id, "replay row gone, resuming without rebinding");
        }
        state.pending.clear(&correlation.source_id);

        let overrides = ResumeOverrides {
            headers: Some(correlation.headers),
            body: (!correlation.body.is_empty()).then_some(correlation.body),
            ..Default::default()
        };
        self.spawn_resume(
            event.pause_id.clone(),
            Some(overrides),
            Some(correlation.row_id),
        );
    }

    /// Case 6: re-pause of an already-known exchange
    fn rebind_known_exchange(
        &self,
        state: &mut EngineState,
        event: PauseEvent,
        transaction_id: TransactionId,
    ) {
        let redirect_summary = event
            .response
            .as_ref()
            .map(|r| r.is_redirect())
            .unwrap_or(false);
        let new_hop = state
            .ledger
            .find(&transaction_id)
            .map(|row| row.protocol_request_id.as_ref() != Some(&event.pause_id))
            .unwrap_or(false);
        let mark_redirect = redirect_summary || new_hop;

        debug!(
            id = %transaction_id,
            pause = %event.pause_id,
            redirect = mark_redirect,
            "re-pause for known exchange"
        );
        counter!("tapwire_redirect_rebinds_total").increment(1);

        state.ledger.update(&transaction_id, |row| {
            row.protocol_request_id = Some(event.pause_id.clone());
            if mark_redirect {
                row.is_redirect = true;
            }
        });
        state.pending.clear(&transaction_id);

        if state.mode == Mode::Proxy {
            self.spawn_resume(event.pause_id, None, Some(transaction_id));
        }
    }

    /// Case 5: brand-new exchange
    fn capture_new_exchange(
        &self,
        state: &mut EngineState,
        event: PauseEvent,
        transaction_id: TransactionId,
    ) {
        let mut row = self.build_captured_row(&event, transaction_id.clone());
        counter!("tapwire_exchanges_captured_total").increment(1);

        match state.mode {
            Mode::Intercept => {
                info!(id = %transaction_id, method = %row.method, url = %row.url, "exchange paused");
                state.ledger.upsert(row);
            }
            Mode::Proxy => {
                debug!(id = %transaction_id, method = %row.method, url = %row.url, "exchange observed");
                row.status = TransactionStatus::Finished;
                state.ledger.upsert(row);
                self.spawn_resume(event.pause_id, None, Some(transaction_id));
            }
        }
    }

    /// Run the request through the pipeline and build its ledger row
    fn build_captured_row(&self, event: &PauseEvent, transaction_id: TransactionId) -> Transaction {
        let ctx = TransformContext {
            transaction_id: transaction_id.clone(),
            tab_id: event.tab_id,
            url: event.request.url.clone(),
            method: event.request.method.clone(),
        };
        let url = self.pipeline.apply_text(
            event.request.url.clone(),
            InjectionPoint::RequestUrl,
            &ctx,
        );
        let headers = self.pipeline.apply_headers(
            event.request.headers.clone(),
            InjectionPoint::RequestHeaders,
            &ctx,
        );
        let body =
            self.pipeline
                .apply_text(event.request.body.clone(), InjectionPoint::RequestBody, &ctx);

        let raw = RawRequest {
            method: event.request.method.clone(),
            url,
            headers,
            body,
        };
        Transaction::captured(
            transaction_id,
            event.tab_id,
            Some(event.pause_id.clone()),
            &raw,
        )
    }

    /// Issue a resume as a spawned task; failures re-enter the queue
    fn spawn_resume(
        &self,
        pause_id: PauseId,
        overrides: Option<ResumeOverrides>,
        transaction_id: Option<TransactionId>,
    ) {
        let channel = Arc::clone(&self.channel);
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.resume(&pause_id, overrides).await {
                let _ = events.send(EngineMsg::Event(EngineEvent::ResumeFailed {
                    transaction_id,
                    pause_id,
                    error: e.to_string(),
                }));
            }
        });
    }

    /// Issue a body fetch as a spawned task; the outcome re-enters the queue
    fn spawn_body_fetch(
        &self,
        transaction_id: TransactionId,
        pause_id: PauseId,
        response: ResponseSummary,
    ) {
        let channel = Arc::clone(&self.channel);
        let events = self.events.clone();
        tokio::spawn(async move {
            let body = channel.fetch_response_body(&pause_id).await;
            let _ = events.send(EngineMsg::Event(EngineEvent::BodyFetched {
                transaction_id,
                pause_id,
                response,
                body,
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::channel::ScriptedChannel;
    use crate::interception::event::{PauseStage, RequestSummary};
    use crate::pipeline::content::PassthroughPipeline;
    use crate::pipeline::proxy::AllowListReconciler;
    use crate::utils::config::EngineConfig;

    fn request_event(pause: &str, net: &str, url: &str) -> PauseEvent {
        PauseEvent {
            stage: PauseStage::Request,
            pause_id: PauseId::new(pause),
            network_id: Some(net.to_string()),
            tab_id: 1,
            request: RequestSummary {
                url: url.to_string(),
                method: "GET".to_string(),
                headers: vec![Header::new("Accept", "*/*")],
                body: String::new(),
            },
            response: None,
        }
    }

    fn setup() -> (EngineState, EventRouter, Arc<ScriptedChannel>) {
        let channel = Arc::new(ScriptedChannel::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let router = EventRouter::new(
            Arc::clone(&channel) as Arc<dyn InterceptionChannel>,
            Arc::new(PassthroughPipeline),
            Arc::new(AllowListReconciler::with_patterns(["skip.example.com"])),
            tx,
            "x-tapwire-replay",
        );
        let state = EngineState::new(EngineConfig::default());
        (state, router, channel)
    }

    #[tokio::test]
    async fn test_new_exchange_pauses_in_intercept_mode() {
        let (mut state, router, _channel) = setup();
        router.on_request_paused(&mut state, request_event("p1", "n1", "https://example.com/a"));

        assert_eq!(state.ledger.len(), 1);
        let row = state.ledger.find(&TransactionId::new("n1")).unwrap();
        assert_eq!(row.status, TransactionStatus::Paused);
        assert_eq!(row.protocol_request_id, Some(PauseId::new("p1")));
        assert!(row.raw_request.starts_with("GET https://example.com/a"));
    }

    #[tokio::test]
    async fn test_new_exchange_finishes_in_proxy_mode() {
        let (mut state, router, _channel) = setup();
        state.mode = Mode::Proxy;
        router.on_request_paused(&mut state, request_event("p1", "n1", "https://example.com/a"));

        let row = state.ledger.find(&TransactionId::new("n1")).unwrap();
        assert_eq!(row.status, TransactionStatus::Finished);
    }

    #[tokio::test]
    async fn test_bypassed_exchange_never_enters_ledger() {
        let (mut state, router, _channel) = setup();
        router.on_request_paused(
            &mut state,
            request_event("p1", "n1", "https://skip.example.com/report"),
        );

        assert!(state.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_redirect_repause_rebinds_instead_of_duplicating() {
        let (mut state, router, _channel) = setup();
        router.on_request_paused(&mut state, request_event("p1", "n1", "https://example.com/a"));

        let mut hop = request_event("p2", "n1", "https://example.com/b");
        hop.response = Some(ResponseSummary {
            status: 302,
            status_text: "Found".to_string(),
            headers: vec![],
        });
        router.on_request_paused(&mut state, hop);

        assert_eq!(state.ledger.len(), 1);
        let row = state.ledger.find(&TransactionId::new("n1")).unwrap();
        assert_eq!(row.protocol_request_id, Some(PauseId::new("p2")));
        assert!(row.is_redirect);
    }

    #[tokio::test]
    async fn test_redirect_repause_releases_pending_guard() {
        let (mut state, router, _channel) = setup();
        router.on_request_paused(&mut state, request_event("p1", "n1", "https://example.com/a"));
        router.on_resume_command(&mut state, TransactionId::new("n1"), vec![]);
        assert!(state.pending.is_pending(&TransactionId::new("n1")));

        router.on_request_paused(&mut state, request_event("p2", "n1", "https://example.com/b"));
        assert!(!state.pending.is_pending(&TransactionId::new("n1")));
    }

    #[tokio::test]
    async fn test_resume_command_is_idempotent_while_pending() {
        let (mut state, router, channel) = setup();
        router.on_request_paused(&mut state, request_event("p1", "n1", "https://example.com/a"));

        router.on_resume_command(&mut state, TransactionId::new("n1"), vec![]);
        router.on_resume_command(&mut state, TransactionId::new("n1"), vec![]);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(channel.resume_count(&PauseId::new("p1")), 1);
    }

    #[tokio::test]
    async fn test_resume_failed_force_finishes_unfinished_row() {
        let (mut state, router, _channel) = setup();
        router.on_request_paused(&mut state, request_event("p1", "n1", "https://example.com/a"));

        router.on_resume_failed(
            &mut state,
            Some(TransactionId::new("n1")),
            PauseId::new("p1"),
            "interception channel failed: tab detached".to_string(),
        );

        let row = state.ledger.find(&TransactionId::new("n1")).unwrap();
        assert!(row.is_finished());
        assert_eq!(
            row.raw_response.as_deref(),
            Some("interception channel failed: tab detached")
        );
    }

    #[tokio::test]
    async fn test_resume_failed_never_overwrites_real_response() {
        let (mut state, router, _channel) = setup();
        router.on_request_paused(&mut state, request_event("p1", "n1", "https://example.com/a"));
        state.ledger.update(&TransactionId::new("n1"), |row| {
            row.finish_with("HTTP/1.1 200 OK\r\n\r\nreal");
        });

        router.on_resume_failed(
            &mut state,
            Some(TransactionId::new("n1")),
            PauseId::new("p1"),
            "late failure".to_string(),
        );

        let row = state.ledger.find(&TransactionId::new("n1")).unwrap();
        assert_eq!(row.raw_response.as_deref(), Some("HTTP/1.1 200 OK\r\n\r\nreal"));
    }

    #[tokio::test]
    async fn test_body_completion_for_cleared_row_still_resumes() {
        let (mut state, router, channel) = setup();
        router.on_body_fetched(
            &mut state,
            TransactionId::new("gone"),
            PauseId::new("p9"),
            ResponseSummary {
                status: 200,
                status_text: "OK".to_string(),
                headers: vec![],
            },
            Ok("body".to_string()),
        );

        assert!(state.ledger.is_empty());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(channel.resume_count(&PauseId::new("p9")), 1);
    }

    #[tokio::test]
    async fn test_response_lands_on_row_bound_to_its_pause() {
        let (mut state, router, _channel) = setup();
        let request = RawRequest::new("GET", "https://example.com/a");
        let mut row = Transaction::replay_row(TransactionId::new("replay-tok"), 1, &request);
        row.protocol_request_id = Some(PauseId::new("p9"));
        state.ledger.upsert(row);

        let mut event = request_event("p9", "nr1", "https://example.com/a");
        event.stage = PauseStage::Response;
        event.response = Some(ResponseSummary {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![],
        });
        router.on_response_paused(&mut state, event);

        assert_eq!(state.ledger.len(), 1);
        assert!(!state.ledger.contains(&TransactionId::new("nr1")));
        assert!(state.pending.is_pending(&TransactionId::new("replay-tok")));
    }

    #[tokio::test]
    async fn test_stale_marker_token_is_treated_as_new_exchange() {
        let (mut state, router, _channel) = setup();
        let mut event = request_event("p1", "n1", "https://example.com/a");
        event
            .request
            .headers
            .push(Header::new("x-tapwire-replay", "stale-token"));

        router.on_request_paused(&mut state, event);
        assert_eq!(state.ledger.len(), 1);
    }
}
