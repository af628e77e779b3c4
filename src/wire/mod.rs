// src/wire/mod.rs
//! Raw HTTP text framing
//!
//! The engine stores every exchange as editable raw text: request text the
//! operator can modify before resuming or replaying, response text assembled
//! from captured status, headers, and body. This module owns that framing:
//!
//! - **Header**: ordered, duplicate-preserving name/value pair
//! - **RawRequest**: tolerant parse of editor text, canonical assembly
//! - **RawResponse**: status line + headers + body assembly
//!
//! Parsing accepts both `\n` and `\r\n` line endings since the text comes
//! from a UI editor; assembly always emits `\r\n`.

pub mod request;
pub mod response;

// Re-export commonly used types
pub use request::RawRequest;
pub use response::RawResponse;

use serde::{Deserialize, Serialize};

/// A single HTTP header
///
/// Headers are kept as an ordered list, not a map, so duplicates and
/// ordering survive the parse/assemble round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name, case preserved as captured
    pub name: String,

    /// Header value with surrounding whitespace trimmed
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Find the first header with the given name, case-insensitive
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Replace every header with the given name, or append when absent
pub fn set_header(headers: &mut Vec<Header>, name: &str, value: &str) {
    remove_header(headers, name);
    headers.push(Header::new(name, value));
}

/// Remove every header with the given name, returning whether any existed
pub fn remove_header(headers: &mut Vec<Header>, name: &str) -> bool {
    let before = headers.len();
    headers.retain(|h| !h.name.eq_ignore_ascii_case(name));
    headers.len() != before
}
