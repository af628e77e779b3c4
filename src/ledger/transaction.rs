// src/ledger/transaction.rs
//! Transaction model
//!
//! One `Transaction` per logical exchange, created on the first
//! Request-stage pause event (or synthesized by a replay) and mutated in
//! place until it reaches `finished`. Rows leave the ledger only through an
//! explicit clear-all.

use crate::utils::ids::{PauseId, TabId, TransactionId};
use crate::wire::{Header, RawRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Held by the interception channel, awaiting operator action
    Paused,

    /// Issued out-of-band by a replay, awaiting its result
    Awaiting,

    /// Response (or error text) recorded, nothing further pending
    Finished,
}

/// One captured or replayed network exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable ledger identity
    pub id: TransactionId,

    /// Originating browser tab
    pub tab_id: TabId,

    /// Pause-channel identifier currently bound to this exchange
    ///
    /// Changes across redirects and replay matches; `None` for replay rows
    /// the interception channel has not observed.
    pub protocol_request_id: Option<PauseId>,

    /// Request method captured at pause time, post-transformation
    pub method: String,

    /// Request URL captured at pause time, post-transformation
    pub url: String,

    /// Request headers captured at pause time, post-transformation
    pub headers: Vec<Header>,

    /// Editable raw request text
    pub raw_request: String,

    /// Raw response text, present once the exchange finished
    pub raw_response: Option<String>,

    /// Lifecycle state
    pub status: TransactionStatus,

    /// Whether a redirect hop was observed for this exchange
    pub is_redirect: bool,

    /// Whether this row was synthesized by the replay subsystem
    pub is_replay: bool,

    /// Insertion timestamp
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a row for a freshly captured exchange
    pub fn captured(
        id: TransactionId,
        tab_id: TabId,
        protocol_request_id: Option<PauseId>,
        request: &RawRequest,
    ) -> Self {
        Self {
            id,
            tab_id,
            protocol_request_id,
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            raw_request: request.to_text(),
            raw_response: None,
            status: TransactionStatus::Paused,
            is_redirect: false,
            is_replay: false,
            created_at: Utc::now(),
        }
    }

    /// Build the synthetic row a replay attempt reports into
    pub fn replay_row(id: TransactionId, tab_id: TabId, request: &RawRequest) -> Self {
        Self {
            id,
            tab_id,
            protocol_request_id: None,
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            raw_request: request.to_text(),
            raw_response: None,
            status: TransactionStatus::Awaiting,
            is_redirect: false,
            is_replay: true,
            created_at: Utc::now(),
        }
    }

    /// Record the response text and move to `finished`
    pub fn finish_with(&mut self, response_text: impl Into<String>) {
        self.raw_response = Some(response_text.into());
        self.status = TransactionStatus::Finished;
    }

    pub fn is_finished(&self) -> bool {
        self.status == TransactionStatus::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RawRequest {
        let mut req = RawRequest::new("GET", "https://example.com/page");
        req.set_header("Accept", "text/html");
        req
    }

    #[test]
    fn test_captured_row_snapshot() {
        let tx = Transaction::captured(
            TransactionId::new("net-1"),
            7,
            Some(PauseId::new("pause-1")),
            &request(),
        );
        assert_eq!(tx.method, "GET");
        assert_eq!(tx.url, "https://example.com/page");
        assert_eq!(tx.status, TransactionStatus::Paused);
        assert!(tx.raw_request.starts_with("GET https://example.com/page"));
        assert!(tx.raw_response.is_none());
        assert!(!tx.is_replay);
    }

    #[test]
    fn test_replay_row_is_awaiting() {
        let tx = Transaction::replay_row(TransactionId::new("replay-x"), 7, &request());
        assert_eq!(tx.status, TransactionStatus::Awaiting);
        assert!(tx.is_replay);
        assert!(tx.protocol_request_id.is_none());
    }

    #[test]
    fn test_finish_with() {
        let mut tx = Transaction::captured(TransactionId::new("net-1"), 7, None, &request());
        tx.finish_with("HTTP/1.1 200 OK\r\n\r\n");
        assert!(tx.is_finished());
        assert_eq!(tx.raw_response.as_deref(), Some("HTTP/1.1 200 OK\r\n\r\n"));
    }

    #[test]
    fn test_serialization_uses_snake_case_status() {
        let tx = Transaction::captured(TransactionId::new("net-1"), 7, None, &request());
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"status\":\"paused\""));
    }
}
