// src/pipeline/content.rs
//! Content transformation pipeline seam
//!
//! Transforms are consulted by the router at fixed injection points while a
//! transaction's content is being captured. Implementations must be total:
//! given any input they return a transformed (or unchanged) value, never an
//! error and never a side effect the engine can observe.

use crate::utils::ids::{TabId, TransactionId};
use crate::wire::Header;

/// Where in a transaction's lifecycle a transform is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionPoint {
    RequestUrl,
    RequestHeaders,
    RequestBody,
    ResponseHeaders,
    ResponseBody,
}

/// Identifying context handed to transforms
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Ledger row the content belongs to
    pub transaction_id: TransactionId,

    /// Originating tab
    pub tab_id: TabId,

    /// Request URL as captured before URL transforms ran
    pub url: String,

    /// Request method
    pub method: String,
}

/// Per-field content transforms
pub trait ContentPipeline: Send + Sync {
    /// Transform a text field (URL, body) at the given injection point
    fn apply_text(&self, text: String, point: InjectionPoint, ctx: &TransformContext) -> String;

    /// Transform a header list at the given injection point
    fn apply_headers(
        &self,
        headers: Vec<Header>,
        point: InjectionPoint,
        ctx: &TransformContext,
    ) -> Vec<Header>;
}

/// Identity pipeline, the default when no transforms are configured
pub struct PassthroughPipeline;

impl ContentPipeline for PassthroughPipeline {
    fn apply_text(&self, text: String, _point: InjectionPoint, _ctx: &TransformContext) -> String {
        text
    }

    fn apply_headers(
        &self,
        headers: Vec<Header>,
        _point: InjectionPoint,
        _ctx: &TransformContext,
    ) -> Vec<Header> {
        headers
    }
}
