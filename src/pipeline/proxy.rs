// src/pipeline/proxy.rs
//! Proxy reconciler seam and the default allow-list implementation
//!
//! The router consults the reconciler twice per fresh Request-stage event:
//! `should_bypass` decides whether the exchange skips interception entirely,
//! and `apply_if_enabled` gives system-proxy reconciliation a chance to take
//! over the exchange before it is treated as a new transaction.

use crate::utils::ids::TabId;
use parking_lot::RwLock;
use tracing::debug;

/// Context handed to `apply_if_enabled` for a new exchange
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request URL
    pub url: String,

    /// Request method
    pub method: String,

    /// Originating tab
    pub tab_id: TabId,
}

/// Bypass and system-proxy reconciliation decisions
pub trait ProxyReconciler: Send + Sync {
    /// Whether this URL is exempt from interception entirely
    fn should_bypass(&self, url: &str) -> bool;

    /// Give proxy reconciliation a chance to handle the exchange;
    /// `true` means it did and the router takes no further action
    fn apply_if_enabled(&self, ctx: &RequestContext) -> bool;
}

/// Host allow-list reconciler
///
/// Matches hosts exactly or against `*.domain` wildcard patterns. The
/// wildcard covers subdomains only; list the bare domain as well to cover
/// it. `apply_if_enabled` always reports unhandled: system-proxy
/// reconciliation lives outside this crate.
pub struct AllowListReconciler {
    patterns: RwLock<Vec<String>>,
}

impl AllowListReconciler {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(Vec::new()),
        }
    }

    /// Allow-list seeded with the analysis backend's own endpoints, so the
    /// engine never intercepts its own reporting traffic
    pub fn with_defaults() -> Self {
        Self::with_patterns(["api.tapwire.dev", "*.tapwire.dev"])
    }

    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: RwLock::new(patterns.into_iter().map(Into::into).collect()),
        }
    }

    /// Add a pattern at runtime
    pub fn add_pattern(&self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        let mut patterns = self.patterns.write();
        if !patterns.contains(&pattern) {
            debug!(pattern = %pattern, "bypass pattern added");
            patterns.push(pattern);
        }
    }

    /// Remove a pattern, returning whether it was present
    pub fn remove_pattern(&self, pattern: &str) -> bool {
        let mut patterns = self.patterns.write();
        let before = patterns.len();
        patterns.retain(|p| p != pattern);
        patterns.len() != before
    }

    /// Current patterns, for inspection
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.read().clone()
    }

    fn matches_host(&self, host: &str) -> bool {
        let patterns = self.patterns.read();

        // Exact match first
        if patterns.iter().any(|p| p == host) {
            return true;
        }

        // Wildcard match (e.g., *.tapwire.dev covers api.tapwire.dev)
        for pattern in patterns.iter() {
            if let Some(domain) = pattern.strip_prefix("*.") {
                if host.len() > domain.len()
                    && host.ends_with(domain)
                    && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
                {
                    return true;
                }
            }
        }

        false
    }
}

impl ProxyReconciler for AllowListReconciler {
    fn should_bypass(&self, url: &str) -> bool {
        let Some(host) = host_of(url) else {
            return false;
        };
        self.matches_host(&host)
    }

    fn apply_if_enabled(&self, _ctx: &RequestContext) -> bool {
        false
    }
}

impl Default for AllowListReconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the host component from a URL
fn host_of(url: &str) -> Option<String> {
    url.parse::<hyper::Uri>()
        .ok()
        .and_then(|uri| uri.host().map(|h| h.to_ascii_lowercase()))
}
