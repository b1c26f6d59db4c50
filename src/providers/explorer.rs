//! Explorer-style provider (query-string API with `module`/`action` pairs).
//!
//! Heights and nonces come through the explorer's JSON-RPC proxy as hex; balances come back
//! as decimal strings; history is page-number paginated in ascending block order.

use alloy::primitives::{Address, U256};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::blockchain::client::JsonTransport;
use crate::blockchain::types::{parse_decimal, parse_hex_quantity, SyncError, SyncResult};
use crate::providers::validator::{validate, Schema};
use crate::providers::{check_rpc_error, TransferRow};

/// Fixed page size of the explorer history API.
pub const PAGE_SIZE: usize = 50;

/// One explorer endpoint.
#[derive(Clone)]
pub struct ExplorerClient {
    name: String,
    base: Url,
    api_key: Option<String>,
    transport: Arc<dyn JsonTransport>,
}

impl ExplorerClient {
    pub fn new(
        name: impl Into<String>,
        base: Url,
        api_key: Option<String>,
        transport: Arc<dyn JsonTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            base,
            api_key,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn url(&self, params: &[(&str, String)]) -> String {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(key) = &self.api_key {
                query.append_pair("apikey", key);
            }
        }
        url.into()
    }

    async fn proxy_hex(&self, action: &str, extra: &[(&str, String)]) -> SyncResult<U256> {
        let mut params = vec![("module", "proxy".to_string()), ("action", action.to_string())];
        params.extend_from_slice(extra);
        let raw = self.transport.get_json(&self.url(&params)).await?;
        check_rpc_error(&self.name, &raw)?;
        if !validate(&raw, Schema::RpcHexResult) {
            return Err(SyncError::malformed(&self.name, format!("{action}: unexpected shape")));
        }
        parse_hex_quantity(&self.name, raw["result"].as_str().unwrap_or_default())
    }

    async fn account_decimal(&self, params: Vec<(&str, String)>) -> SyncResult<String> {
        let raw = self.transport.get_json(&self.url(&params)).await?;
        if !validate(&raw, Schema::ExplorerDecimal) {
            return Err(SyncError::malformed(&self.name, "balance: unexpected shape"));
        }
        // Canonical form: leading zeros are kept exactly as the provider sent them.
        let text = raw["result"].as_str().unwrap_or_default();
        parse_decimal(&self.name, text)?;
        Ok(text.to_string())
    }

    /// Latest block height.
    pub async fn block_height(&self) -> SyncResult<U256> {
        self.proxy_hex("eth_blockNumber", &[]).await
    }

    /// Confirmed transaction count for `address`.
    pub async fn transaction_count(&self, address: Address) -> SyncResult<U256> {
        self.proxy_hex(
            "eth_getTransactionCount",
            &[("address", address.to_string()), ("tag", "latest".to_string())],
        )
        .await
    }

    /// Native balance as a decimal string of base units.
    pub async fn native_balance(&self, address: Address) -> SyncResult<String> {
        self.account_decimal(vec![
            ("module", "account".to_string()),
            ("action", "balance".to_string()),
            ("address", address.to_string()),
            ("tag", "latest".to_string()),
        ])
        .await
    }

    /// Token balance at `contract` as a decimal string of base units.
    pub async fn token_balance(&self, address: Address, contract: Address) -> SyncResult<String> {
        self.account_decimal(vec![
            ("module", "account".to_string()),
            ("action", "tokenbalance".to_string()),
            ("contractaddress", contract.to_string()),
            ("address", address.to_string()),
            ("tag", "latest".to_string()),
        ])
        .await
    }

    /// One page of history at or above `start_block`, ascending.
    ///
    /// `contract` selects the token transfer feed instead of the native one.
    pub async fn tx_page(
        &self,
        address: Address,
        contract: Option<Address>,
        start_block: u64,
        page: u32,
    ) -> SyncResult<Vec<TransferRow>> {
        let mut params = vec![
            ("module", "account".to_string()),
            (
                "action",
                if contract.is_some() { "tokentx" } else { "txlist" }.to_string(),
            ),
        ];
        if let Some(contract) = contract {
            params.push(("contractaddress", contract.to_string()));
        }
        params.extend([
            ("address", address.to_string()),
            ("startblock", start_block.to_string()),
            ("page", page.to_string()),
            ("offset", PAGE_SIZE.to_string()),
            ("sort", "asc".to_string()),
        ]);

        let raw = self.transport.get_json(&self.url(&params)).await?;
        if !validate(&raw, Schema::ExplorerTxList) {
            return Err(SyncError::malformed(&self.name, "tx list: unexpected shape"));
        }

        raw["result"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|row| self.row(row, contract))
            .collect()
    }

    fn row(&self, row: &Value, feed_contract: Option<Address>) -> SyncResult<TransferRow> {
        let text = |key: &str| row.get(key).and_then(Value::as_str).unwrap_or_default();
        let address = |key: &str| -> SyncResult<Option<Address>> {
            let raw = text(key);
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse()
                .map(Some)
                .map_err(|e| SyncError::malformed(&self.name, format!("{key} '{raw}': {e}")))
        };
        let number = |key: &str| -> SyncResult<u64> {
            text(key)
                .parse()
                .map_err(|e| SyncError::malformed(&self.name, format!("{key}: {e}")))
        };

        let gas_price = parse_decimal(&self.name, text("gasPrice"))?;
        let gas_used = parse_decimal(&self.name, text("gasUsed"))?;
        let contract = match feed_contract {
            Some(_) => address("contractAddress")?.or(feed_contract),
            None => None,
        };

        Ok(TransferRow {
            hash: text("hash").to_lowercase(),
            block_height: number("blockNumber")?,
            timestamp: number("timeStamp")?,
            from: address("from")?.unwrap_or(Address::ZERO),
            to: address("to")?,
            value: parse_decimal(&self.name, text("value"))?,
            fee: gas_price.saturating_mul(gas_used),
            contract,
            failed: text("isError") == "1",
            nonce: text("nonce").parse().ok(),
            metadata: row.clone(),
        })
    }

    /// Submit a signed transaction; answers with the transaction hash.
    pub async fn send_raw(&self, signed_raw: &str) -> SyncResult<String> {
        let url = self.url(&[
            ("module", "proxy".to_string()),
            ("action", "eth_sendRawTransaction".to_string()),
            ("hex", signed_raw.to_string()),
        ]);
        let raw = self.transport.get_json(&url).await?;
        check_rpc_error(&self.name, &raw)?;
        if !validate(&raw, Schema::RpcTxHash) {
            return Err(SyncError::malformed(&self.name, "broadcast: unexpected shape"));
        }
        Ok(raw["result"].as_str().unwrap_or_default().to_lowercase())
    }
}

impl std::fmt::Debug for ExplorerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerClient")
            .field("name", &self.name)
            .field("base", &self.base.as_str())
            .finish()
    }
}
