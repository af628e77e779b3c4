// src/replay/http_injector.rs
//! Direct HTTP replay execution
//!
//! For deployments without a browser execution context: replays are issued
//! straight from the engine process over plain HTTP. Tab identity is
//! meaningless here, so any context is considered alive and the request is
//! executed as given. HTTPS targets need a context-backed injector; this
//! client reports them as injection failures.

use crate::replay::injector::ReplayInjector;
use crate::utils::errors::{EngineError, Result};
use crate::utils::ids::TabId;
use crate::wire::{Header, RawRequest, RawResponse};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

/// Injector that executes replays with an in-process HTTP client
pub struct HttpInjector {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpInjector {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client }
    }
}

impl Default for HttpInjector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayInjector for HttpInjector {
    async fn context_alive(&self, _tab_id: TabId) -> bool {
        true
    }

    async fn fallback_context(&self) -> Option<TabId> {
        Some(0)
    }

    async fn execute(&self, _tab_id: TabId, request: &RawRequest) -> Result<RawResponse> {
        debug!(method = %request.method, url = %request.url, "executing replay directly");

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| EngineError::InjectionFailed(format!("bad method: {}", e)))?;

        let mut builder = Request::builder().method(method).uri(&request.url);
        for header in &request.headers {
            let name = match HeaderName::from_bytes(header.name.as_bytes()) {
                Ok(name) => name,
                Err(_) => {
                    warn!(name = %header.name, "skipping invalid header name");
                    continue;
                }
            };
            let value = match HeaderValue::from_str(&header.value) {
                Ok(value) => value,
                Err(_) => {
                    warn!(name = %header.name, "skipping invalid header value");
                    continue;
                }
            };
            builder = builder.header(name, value);
        }

        let outgoing = builder
            .body(Full::new(Bytes::from(request.body.clone())))
            .map_err(|e| EngineError::InjectionFailed(format!("request build error: {}", e)))?;

        let response = self
            .client
            .request(outgoing)
            .await
            .map_err(|e| EngineError::InjectionFailed(format!("request failed: {}", e)))?;

        let (parts, body) = response.into_parts();
        let body_bytes = body
            .collect()
            .await
            .map_err(|e| EngineError::InjectionFailed(format!("response body error: {}", e)))?
            .to_bytes();

        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| Header::new(name.as_str(), v))
            })
            .collect();

        Ok(RawResponse {
            status: parts.status.as_u16(),
            status_text: parts
                .status
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
            headers,
            body: String::from_utf8_lossy(&body_bytes).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_context_is_alive() {
        let injector = HttpInjector::new();
        assert!(injector.context_alive(42).await);
        assert!(injector.fallback_context().await.is_some());
    }

    #[tokio::test]
    async fn test_bad_method_is_injection_failure() {
        let injector = HttpInjector::new();
        let request = RawRequest::new("NOT A METHOD", "http://127.0.0.1:1/");
        let err = injector.execute(0, &request).await.unwrap_err();
        assert!(matches!(err, EngineError::InjectionFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_target_is_injection_failure() {
        let injector = HttpInjector::new();
        let request = RawRequest::new("GET", "http://127.0.0.1:1/unreachable");
        let err = injector.execute(0, &request).await.unwrap_err();
        assert!(matches!(err, EngineError::InjectionFailed(_)));
    }
}
