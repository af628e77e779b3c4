// src/wire/response.rs
//! Raw response text assembly

use crate::wire::{find_header, Header};
use serde::{Deserialize, Serialize};

/// A captured HTTP response
///
/// Built from whatever channel produced it (interception body fetch or a
/// direct replay execution) and rendered to raw text for the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    /// Status code
    pub status: u16,

    /// Status text as reported, may be empty
    pub status_text: String,

    /// Ordered header list
    pub headers: Vec<Header>,

    /// Response body as text
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Assemble the raw text form: status line, headers, blank line, body
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("HTTP/1.1 ");
        out.push_str(&self.status.to_string());
        if !self.status_text.is_empty() {
            out.push(' ');
            out.push_str(&self.status_text);
        }
        out.push_str("\r\n");
        for header in &self.headers {
            out.push_str(&header.name);
            out.push_str(": ");
            out.push_str(&header.value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.push_str(&self.body);
        out
    }

    /// Look up a header value, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Whether the status code indicates a redirect
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}
