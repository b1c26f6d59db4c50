//! HTTP JSON transport for provider calls, with timeouts and error mapping.
//!
//! # Responsibilities
//! - Issue GET/POST requests to provider endpoints
//! - Enforce a per-request deadline
//! - Map transport and HTTP-level failures to `ProviderUnavailable`
//! - Hand JSON bodies back untouched; shape checks belong to the validator

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::blockchain::types::{SyncError, SyncResult};
use crate::resilience::timeouts::with_deadline;

/// Minimal JSON-over-HTTP surface used by every provider codec.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    /// GET `url` and return the parsed JSON body.
    async fn get_json(&self, url: &str) -> SyncResult<Value>;

    /// POST `body` as JSON to `url` and return the parsed JSON body.
    async fn post_json(&self, url: &str, body: &Value) -> SyncResult<Value>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout_duration: Duration,
}

impl HttpTransport {
    /// Create a new transport with the given per-request timeout.
    pub fn new(timeout_secs: u64) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("wallet-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::unavailable("http", format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            timeout_duration: Duration::from_secs(timeout_secs),
        })
    }

    async fn finish(&self, label: &str, response: reqwest::Response) -> SyncResult<Value> {
        let status = response.status();
        // 4xx bodies may still carry an application error the caller must surface.
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SyncError::unavailable(label, format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::unavailable(label, format!("body read failed: {e}")))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            if status.is_success() {
                SyncError::malformed(label, format!("invalid JSON: {e}"))
            } else {
                SyncError::unavailable(label, format!("HTTP {status}"))
            }
        })
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn get_json(&self, url: &str) -> SyncResult<Value> {
        let label = host_label(url);
        let fut = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| SyncError::unavailable(&label, e.to_string()))?;
            self.finish(&label, response).await
        };
        with_deadline(&label, self.timeout_duration, fut).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> SyncResult<Value> {
        let label = host_label(url);
        let fut = async {
            let response = self
                .client
                .post(url)
                .json(body)
                .send()
                .await
                .map_err(|e| SyncError::unavailable(&label, e.to_string()))?;
            self.finish(&label, response).await
        };
        with_deadline(&label, self.timeout_duration, fut).await
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

/// Host part of a URL, used to label transport errors without leaking API keys.
fn host_label(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str().map(|h| match u.port() {
                Some(port) => format!("{h}:{port}"),
                None => h.to_string(),
            })
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_label_strips_query() {
        assert_eq!(
            host_label("https://api.example.io/api?module=proxy&apikey=SECRET"),
            "api.example.io"
        );
        assert_eq!(host_label("http://127.0.0.1:8545"), "127.0.0.1:8545");
        assert_eq!(host_label("not a url"), "unknown");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_unavailable() {
        let transport = HttpTransport::new(2).unwrap();
        // Port 9 (discard) is closed on loopback in test environments.
        let result = transport.get_json("http://127.0.0.1:9/").await;
        assert!(matches!(
            result,
            Err(SyncError::ProviderUnavailable { .. }) | Err(SyncError::Timeout { .. })
        ));
    }
}
