// src/wire/request.rs
//! Raw request text parsing and assembly

use crate::utils::errors::{EngineError, Result};
use crate::wire::{find_header, remove_header, set_header, Header};
use serde::{Deserialize, Serialize};

/// A parsed raw HTTP request
///
/// The canonical editable form of a transaction's request: what the operator
/// sees in the editor, and what a replay re-parses after editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    /// Request method, preserved as written
    pub method: String,

    /// Absolute or origin-form request target
    pub url: String,

    /// Ordered header list
    pub headers: Vec<Header>,

    /// Request body, preserved byte-for-byte as text
    pub body: String,
}

impl RawRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Parse editor text into a request
    ///
    /// Accepts `\n` or `\r\n` line endings. The first line must be
    /// `METHOD URL [VERSION]`; header lines run until the first blank line;
    /// everything after the blank line is the body, untouched.
    pub fn parse(text: &str) -> Result<Self> {
        let (head, body) = split_head_body(text);

        let mut lines = head.lines();
        let request_line = lines
            .by_ref()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| EngineError::MalformedRequest("empty request line".to_string()))?;

        let mut parts = request_line.split_whitespace();
        let method = parts
            .next()
            .ok_or_else(|| EngineError::MalformedRequest("empty request line".to_string()))?
            .to_string();
        let url = parts.next().ok_or_else(|| {
            EngineError::MalformedRequest(format!("request line missing URL: {:?}", request_line))
        })?;

        let mut headers = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                EngineError::MalformedRequest(format!("header line missing colon: {:?}", line))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(EngineError::MalformedRequest(format!(
                    "header line missing name: {:?}",
                    line
                )));
            }
            headers.push(Header::new(name, value.trim()));
        }

        Ok(Self {
            method,
            url: url.to_string(),
            headers,
            body: body.to_string(),
        })
    }

    /// Assemble the canonical raw text form
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.method);
        out.push(' ');
        out.push_str(&self.url);
        out.push_str(" HTTP/1.1\r\n");
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

    /// Replace or append a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        set_header(&mut self.headers, name, value);
    }

    /// Remove a header, returning whether it was present
    pub fn remove_header(&mut self, name: &str) -> bool {
        remove_header(&mut self.headers, name)
    }
}

/// Split raw text at the first blank line, whichever ending comes first
fn split_head_body(text: &str) -> (&str, &str) {
    let crlf = text.find("\r\n\r\n").map(|i| (i, 4));
    let lf = text.find("\n\n").map(|i| (i, 2));
    let sep = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, None) => a,
        (None, b) => b,
    };
    match sep {
        Some((idx, len)) => (&text[..idx], &text[idx + len..]),
        None => (text, ""),
    }
}
