//! Provider subsystem.
//!
//! # Data Flow
//! ```text
//! Fetcher / transmitter
//!     → racer.rs (ordered fallback or concurrent race over candidates)
//!     → explorer.rs | rpc.rs | aggregator.rs (wire codecs)
//!     → blockchain::client (HTTP JSON transport)
//!     → validator.rs (structural gate before any value is read)
//! ```
//!
//! # Design Decisions
//! - A race is memoryless: no session affinity, no scoring of providers
//! - A structurally invalid answer is a failed candidate, never a partial value
//! - Provider labels are for diagnostics only

pub mod aggregator;
pub mod explorer;
#[cfg(test)]
pub(crate) mod mock;
pub mod racer;
pub mod rpc;
pub mod validator;

use alloy::primitives::{Address, U256};
use serde_json::Value;
use std::sync::Arc;

use crate::blockchain::client::JsonTransport;
use crate::blockchain::types::{SyncError, SyncResult};
use crate::config::ProvidersConfig;

pub use aggregator::AggregatorClient;
pub use explorer::ExplorerClient;
pub use racer::{first_success, in_order, ordered_fallback, Candidate};
pub use rpc::RpcClient;

/// A transfer row as reported by a history provider, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRow {
    pub hash: String,
    /// 0 while the provider reports it as pending.
    pub block_height: u64,
    pub timestamp: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    /// Native-asset fee paid by the sender.
    pub fee: U256,
    /// Token contract for token feeds, `None` for the native feed.
    pub contract: Option<Address>,
    pub failed: bool,
    pub nonce: Option<u64>,
    pub metadata: Value,
}

/// Map a JSON-RPC `error` object to an application rejection.
pub(crate) fn check_rpc_error(provider: &str, raw: &Value) -> SyncResult<()> {
    match raw.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(error) => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            Err(SyncError::rejected(provider, message))
        }
    }
}

/// Every configured provider, grouped by capability.
#[derive(Debug, Clone, Default)]
pub struct ProviderSet {
    /// Explorer endpoints: hex height/nonce, decimal balances, page-number history.
    pub explorers: Vec<ExplorerClient>,
    /// JSON-RPC endpoints: hex height/nonce/balances, no history.
    pub rpcs: Vec<RpcClient>,
    /// Secondary source tried after the shuffled peers.
    pub aggregator: Option<AggregatorClient>,
}

impl ProviderSet {
    /// Build clients from configuration. Invalid URLs are skipped with a warning.
    pub fn from_config(config: &ProvidersConfig, transport: Arc<dyn JsonTransport>) -> Self {
        let mut set = Self::default();

        for explorer in &config.explorers {
            match url::Url::parse(&explorer.url) {
                Ok(base) => set.explorers.push(ExplorerClient::new(
                    explorer.name.clone(),
                    base,
                    explorer.api_key.clone(),
                    transport.clone(),
                )),
                Err(e) => tracing::warn!(url = %explorer.url, error = %e, "Ignoring invalid explorer URL"),
            }
        }

        for rpc in &config.rpc {
            match url::Url::parse(&rpc.url) {
                Ok(_) => set.rpcs.push(RpcClient::new(rpc.name.clone(), rpc.url.clone(), transport.clone())),
                Err(e) => tracing::warn!(url = %rpc.url, error = %e, "Ignoring invalid RPC URL"),
            }
        }

        if let Some(aggregator) = &config.aggregator {
            // `Url::join` drops the last segment unless the base ends with '/'.
            let base = if aggregator.url.ends_with('/') {
                aggregator.url.clone()
            } else {
                format!("{}/", aggregator.url)
            };
            match url::Url::parse(&base) {
                Ok(base) => {
                    set.aggregator = Some(AggregatorClient::new(
                        aggregator.name.clone(),
                        base,
                        aggregator.api_key.clone(),
                        transport.clone(),
                    ))
                }
                Err(e) => tracing::warn!(url = %aggregator.url, error = %e, "Ignoring invalid aggregator URL"),
            }
        }

        tracing::info!(
            explorers = set.explorers.len(),
            rpcs = set.rpcs.len(),
            aggregator = set.aggregator.is_some(),
            "Provider set initialized"
        );
        set
    }

    pub fn is_empty(&self) -> bool {
        self.explorers.is_empty() && self.rpcs.is_empty() && self.aggregator.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AggregatorConfig, EndpointConfig};
    use crate::providers::mock::MockTransport;
    use serde_json::json;

    #[test]
    fn test_rpc_error_mapping() {
        assert!(check_rpc_error("p", &json!({"result": "0x1"})).is_ok());
        assert!(check_rpc_error("p", &json!({"result": "0x1", "error": null})).is_ok());
        let err = check_rpc_error("p", &json!({"error": {"code": -32000, "message": "nonce too low"}})).unwrap_err();
        assert_eq!(err.to_string(), "nonce too low");
    }

    #[test]
    fn test_from_config_skips_bad_urls() {
        let config = ProvidersConfig {
            explorers: vec![
                EndpointConfig { name: "good".into(), url: "https://explorer.test/api".into(), api_key: None },
                EndpointConfig { name: "bad".into(), url: "not a url".into(), api_key: None },
            ],
            rpc: vec![EndpointConfig { name: "rpc".into(), url: "http://127.0.0.1:8545".into(), api_key: None }],
            aggregator: Some(AggregatorConfig {
                name: "agg".into(),
                url: "https://agg.test/ethereum".into(),
                api_key: None,
            }),
            timeout_secs: 5,
        };
        let set = ProviderSet::from_config(&config, MockTransport::new());
        assert_eq!(set.explorers.len(), 1);
        assert_eq!(set.rpcs.len(), 1);
        assert!(set.aggregator.is_some());
        assert!(!set.is_empty());
    }
}
