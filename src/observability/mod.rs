// src/observability/mod.rs
//! Metrics, tracing, and logging
//!
//! Embedders call [`init_tracing`] and [`init_metrics`] once at startup.
//! Both are idempotent so tests and layered applications can call them
//! freely. Metrics installation requires a running Tokio runtime because
//! the Prometheus exporter spawns its HTTP listener onto it.

use crate::utils::errors::{EngineError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

static TRACING: OnceCell<()> = OnceCell::new();
static METRICS: OnceCell<()> = OnceCell::new();

/// Initialize the global tracing subscriber with the default `info` filter
///
/// `RUST_LOG` overrides the filter; `TAPWIRE_LOG_FORMAT=json` switches to
/// JSON output for log aggregation.
pub fn init_tracing() -> Result<()> {
    init_tracing_with("info")
}

/// Initialize the global tracing subscriber with an explicit fallback filter
pub fn init_tracing_with(default_filter: &str) -> Result<()> {
    let filter = default_filter.to_string();
    TRACING
        .get_or_try_init(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&filter));

            let json_output = std::env::var("TAPWIRE_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false);

            let result = if json_output {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(env_filter)
                    .try_init()
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .try_init()
            };

            result
                .map_err(|e| EngineError::ObservabilityError(format!("tracing init: {}", e)))
        })
        .map(|_| ())
}

/// Install the Prometheus metrics exporter on the default bind address
pub fn init_metrics() -> Result<()> {
    init_metrics_with("127.0.0.1:9464")
}

/// Install the Prometheus metrics exporter on an explicit bind address
pub fn init_metrics_with(addr: &str) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| EngineError::ObservabilityError(format!("metrics addr: {}", e)))?;

    METRICS
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .map_err(|e| EngineError::ObservabilityError(format!("metrics init: {}", e)))
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing().unwrap();
        init_tracing().unwrap();
        init_tracing_with("debug").unwrap();
    }

    #[test]
    fn test_init_metrics_rejects_bad_addr() {
        assert!(init_metrics_with("not-an-addr").is_err());
    }
}
