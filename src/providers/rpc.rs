//! JSON-RPC gateway provider.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::blockchain::client::JsonTransport;
use crate::blockchain::transaction::erc20;
use crate::blockchain::types::{parse_hex_quantity, SyncError, SyncResult};
use crate::providers::check_rpc_error;
use crate::providers::validator::{validate, Schema};

/// One JSON-RPC endpoint.
#[derive(Clone)]
pub struct RpcClient {
    name: String,
    url: String,
    transport: Arc<dyn JsonTransport>,
    request_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(name: impl Into<String>, url: impl Into<String>, transport: Arc<dyn JsonTransport>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            transport,
            request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, method: &str, params: Value, schema: Schema) -> SyncResult<String> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let raw = self.transport.post_json(&self.url, &body).await?;
        check_rpc_error(&self.name, &raw)?;
        if !validate(&raw, schema) {
            return Err(SyncError::malformed(&self.name, format!("{method}: unexpected shape")));
        }
        Ok(raw["result"].as_str().unwrap_or_default().to_string())
    }

    async fn quantity(&self, method: &str, params: Value) -> SyncResult<U256> {
        let result = self.call(method, params, Schema::RpcHexResult).await?;
        parse_hex_quantity(&self.name, &result)
    }

    pub async fn block_number(&self) -> SyncResult<U256> {
        self.quantity("eth_blockNumber", json!([])).await
    }

    pub async fn transaction_count(&self, address: Address) -> SyncResult<U256> {
        self.quantity("eth_getTransactionCount", json!([address.to_string(), "latest"]))
            .await
    }

    pub async fn native_balance(&self, address: Address) -> SyncResult<String> {
        let wei = self
            .quantity("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        Ok(wei.to_string())
    }

    /// ERC-20 `balanceOf` through `eth_call`.
    pub async fn token_balance(&self, address: Address, contract: Address) -> SyncResult<String> {
        let data = erc20::balanceOfCall { owner: address }.abi_encode();
        let params = json!([
            {"to": contract.to_string(), "data": alloy::hex::encode_prefixed(data)},
            "latest"
        ]);
        let amount = self.quantity("eth_call", params).await?;
        Ok(amount.to_string())
    }

    /// Submit a signed transaction; answers with the transaction hash.
    pub async fn send_raw(&self, signed_raw: &str) -> SyncResult<String> {
        let hash = self
            .call("eth_sendRawTransaction", json!([signed_raw]), Schema::RpcTxHash)
            .await?;
        Ok(hash.to_lowercase())
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockReply, MockTransport};

    const WALLET: &str = "0x1111111111111111111111111111111111111111";
    const TOKEN: &str = "0x3333333333333333333333333333333333333333";

    #[tokio::test]
    async fn test_balance_hex_to_decimal() {
        let mock = MockTransport::new();
        mock.on("eth_getBalance", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x0de0b6b3a7640000"})));
        let client = RpcClient::new("rpc", "http://rpc.test", mock.clone());
        let balance = client.native_balance(WALLET.parse().unwrap()).await.unwrap();
        assert_eq!(balance, "1000000000000000000");
    }

    #[tokio::test]
    async fn test_token_balance_calls_balance_of() {
        let mock = MockTransport::new();
        mock.on("eth_call", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x00000000000000000000000000000000000000000000000000000000000003e8"})));
        let client = RpcClient::new("rpc", "http://rpc.test", mock.clone());
        let balance = client
            .token_balance(WALLET.parse().unwrap(), TOKEN.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(balance, "1000");
        // balanceOf(address) selector
        assert!(mock.calls()[0].contains("0x70a08231"));
    }

    #[tokio::test]
    async fn test_application_error_is_rejection() {
        let mock = MockTransport::new();
        mock.on(
            "eth_sendRawTransaction",
            MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "insufficient funds for gas * price + value"}})),
        );
        let client = RpcClient::new("rpc", "http://rpc.test", mock.clone());
        let err = client.send_raw("0xf86b").await.unwrap_err();
        assert!(matches!(err, SyncError::ProviderRejected { ref provider, .. } if provider == "rpc"));
    }

    #[tokio::test]
    async fn test_negative_or_decimal_height_rejected() {
        let mock = MockTransport::new();
        mock.on("eth_blockNumber", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": "100"})));
        let client = RpcClient::new("rpc", "http://rpc.test", mock.clone());
        assert!(matches!(
            client.block_number().await,
            Err(SyncError::ProviderMalformedResponse { .. })
        ));
    }
}
