// src/interception/event.rs
//! Pause notices, validated pause events, and the engine event enum
//!
//! The pause channel delivers loosely structured notices; everything
//! optional there is checked once at the boundary and turned into a
//! [`PauseEvent`] the router can consume without further case analysis.

use crate::utils::errors::{EngineError, Result};
use crate::utils::ids::{CorrelationToken, PauseId, TabId, TransactionId};
use crate::wire::{find_header, Header, RawResponse};
use serde::{Deserialize, Serialize};

/// Which side of the exchange is being held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseStage {
    Request,
    Response,
}

/// Raw notice as delivered by a pause-channel adapter
///
/// The stage may be given explicitly; when absent it is inferred from the
/// presence of a response status. Request-stage notices may still carry a
/// response summary, which is how redirect hops announce the status that
/// caused them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PauseNotice {
    /// Pause identifier, scoped to one held hop
    pub pause_id: String,

    /// Network-level exchange identifier, stable across redirect hops
    pub network_id: Option<String>,

    /// Originating tab
    pub tab_id: TabId,

    /// Explicit stage (`request` or `response`), inferred when absent
    pub stage: Option<String>,

    /// Request URL
    pub url: Option<String>,

    /// Request method
    pub method: Option<String>,

    /// Request headers
    pub headers: Option<Vec<Header>>,

    /// Request body text
    pub body: Option<String>,

    /// Response status, present at response stage and on redirect notices
    pub response_status: Option<u16>,

    /// Response status text
    pub response_status_text: Option<String>,

    /// Response headers
    pub response_headers: Option<Vec<Header>>,
}

impl PauseNotice {
    /// Validate into a typed pause event
    pub fn validate(self) -> Result<PauseEvent> {
        if self.pause_id.is_empty() {
            return Err(EngineError::InvalidNotice("empty pause_id".to_string()));
        }

        let url = self
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| EngineError::InvalidNotice("missing request URL".to_string()))?;
        let method = self
            .method
            .filter(|m| !m.is_empty())
            .ok_or_else(|| EngineError::InvalidNotice("missing request method".to_string()))?;

        let stage = match self.stage.as_deref() {
            Some("request") => PauseStage::Request,
            Some("response") => PauseStage::Response,
            Some(other) => {
                return Err(EngineError::InvalidNotice(format!(
                    "unknown stage: {:?}",
                    other
                )))
            }
            None => {
                if self.response_status.is_some() {
                    PauseStage::Response
                } else {
                    PauseStage::Request
                }
            }
        };

        let response = match self.response_status {
            Some(status) => Some(ResponseSummary {
                status,
                status_text: self.response_status_text.unwrap_or_default(),
                headers: self.response_headers.unwrap_or_default(),
            }),
            None => {
                if stage == PauseStage::Response {
                    return Err(EngineError::InvalidNotice(
                        "response stage without response status".to_string(),
                    ));
                }
                None
            }
        };

        Ok(PauseEvent {
            stage,
            pause_id: PauseId::new(self.pause_id),
            network_id: self.network_id.filter(|n| !n.is_empty()),
            tab_id: self.tab_id,
            request: RequestSummary {
                url,
                method,
                headers: self.headers.unwrap_or_default(),
                body: self.body.unwrap_or_default(),
            },
            response,
        })
    }
}

/// Request side of a pause event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub url: String,
    pub method: String,
    pub headers: Vec<Header>,
    pub body: String,
}

/// Response side of a pause event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<Header>,
}

impl ResponseSummary {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// A validated pause event
#[derive(Debug, Clone)]
pub struct PauseEvent {
    pub stage: PauseStage,
    pub pause_id: PauseId,
    pub network_id: Option<String>,
    pub tab_id: TabId,
    pub request: RequestSummary,
    pub response: Option<ResponseSummary>,
}

impl PauseEvent {
    /// Ledger identity for this exchange: the network id when present,
    /// otherwise a tab-scoped composite
    pub fn transaction_id(&self) -> TransactionId {
        match &self.network_id {
            Some(net) => TransactionId::new(net.clone()),
            None => TransactionId::composite(self.tab_id, &self.pause_id),
        }
    }

    /// Correlation token smuggled in the marker header, if any
    pub fn marker_token(&self, marker_header: &str) -> Option<CorrelationToken> {
        find_header(&self.request.headers, marker_header)
            .filter(|v| !v.is_empty())
            .map(CorrelationToken::new)
    }
}

/// Everything the engine worker reacts to
#[derive(Debug)]
pub enum EngineEvent {
    /// An exchange is held before being sent
    RequestPaused(PauseEvent),

    /// An exchange is held before its response is delivered
    ResponsePaused(PauseEvent),

    /// A spawned response-body fetch finished
    BodyFetched {
        transaction_id: TransactionId,
        pause_id: PauseId,
        response: ResponseSummary,
        body: Result<String>,
    },

    /// A spawned resume command failed
    ResumeFailed {
        transaction_id: Option<TransactionId>,
        pause_id: PauseId,
        error: String,
    },

    /// An out-of-band replay execution produced its direct result
    ReplayCompleted {
        token: CorrelationToken,
        result: Result<RawResponse>,
    },

    /// A replay correlation's deadline elapsed
    DeadlineFired { token: CorrelationToken },
}
