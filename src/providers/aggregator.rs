//! Analytics aggregator provider.
//!
//! The aggregator is the distinguished secondary source: decimal heights, one fan-in call
//! returning every asset balance for the address, cursor ("next link") history served
//! newest first, and a broadcast endpoint answering with a nested object.

use alloy::primitives::Address;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use crate::blockchain::client::JsonTransport;
use crate::blockchain::types::{parse_decimal, SyncError, SyncResult};
use crate::providers::validator::{validate, Schema};
use crate::providers::TransferRow;

/// Fan-in balances keyed by asset: `None` is the native asset, `Some(contract)` a token.
pub type FanInBalances = BTreeMap<Option<Address>, String>;

#[derive(Clone)]
pub struct AggregatorClient {
    name: String,
    base: Url,
    api_key: Option<String>,
    transport: Arc<dyn JsonTransport>,
}

impl AggregatorClient {
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

    fn url(&self, path: &str, params: &[(&str, String)]) -> SyncResult<String> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| SyncError::unavailable(&self.name, format!("bad path '{path}': {e}")))?;
        if !params.is_empty() || self.api_key.is_some() {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
        }
        Ok(url.into())
    }

    /// Latest block height, reported as a plain decimal number.
    pub async fn block_height(&self) -> SyncResult<u64> {
        let raw = self.transport.get_json(&self.url("stats", &[])?).await?;
        if !validate(&raw, Schema::AggregatorHeight) {
            return Err(SyncError::malformed(&self.name, "stats: unexpected shape"));
        }
        raw["data"]["best_block_height"]
            .as_u64()
            .ok_or_else(|| SyncError::malformed(&self.name, "stats: height missing"))
    }

    /// Every asset balance the aggregator knows for `address`, in one call.
    pub async fn balances(&self, address: Address) -> SyncResult<FanInBalances> {
        let key = address.to_string().to_lowercase();
        let raw = self
            .transport
            .get_json(&self.url(&format!("dashboards/address/{key}"), &[("erc_20", "true".to_string())])?)
            .await?;
        if !validate(&raw, Schema::AggregatorBalances) {
            return Err(SyncError::malformed(&self.name, "balances: unexpected shape"));
        }

        let entry = raw["data"]
            .as_object()
            .and_then(|data| {
                data.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&key))
                    .map(|(_, v)| v)
            })
            .ok_or_else(|| SyncError::malformed(&self.name, "balances: wallet address missing"))?;

        let mut balances = FanInBalances::new();
        let native = entry["address"]["balance"].as_str().unwrap_or_default();
        balances.insert(None, native.to_string());

        if let Some(tokens) = entry["layer_2"]["erc_20"].as_array() {
            for token in tokens {
                let contract: Address = token["token_address"]
                    .as_str()
                    .unwrap_or_default()
                    .parse()
                    .map_err(|e| SyncError::malformed(&self.name, format!("token_address: {e}")))?;
                balances.insert(
                    Some(contract),
                    token["balance"].as_str().unwrap_or_default().to_string(),
                );
            }
        }
        Ok(balances)
    }

    /// URL of the newest history page for `address`, optionally filtered to one token.
    pub fn first_page_url(&self, address: Address, contract: Option<Address>) -> SyncResult<String> {
        let mut params = vec![("size", crate::providers::explorer::PAGE_SIZE.to_string())];
        if let Some(contract) = contract {
            params.push(("token", contract.to_string()));
        }
        self.url(&format!("addresses/{address}/transactions"), &params)
    }

    /// Fetch one history page and the link to the next (older) one.
    pub async fn tx_page(&self, url: &str) -> SyncResult<(Vec<TransferRow>, Option<String>)> {
        let raw = self.transport.get_json(url).await?;
        if !validate(&raw, Schema::AggregatorTxPage) {
            return Err(SyncError::malformed(&self.name, "history: unexpected shape"));
        }

        let rows = raw["payload"]["records"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|row| self.row(row))
            .collect::<SyncResult<Vec<_>>>()?;
        let next = raw["payload"]["next"].as_str().map(str::to_string);
        Ok((rows, next))
    }

    fn row(&self, row: &Value) -> SyncResult<TransferRow> {
        let address = |key: &str| -> SyncResult<Address> {
            row[key]
                .as_str()
                .unwrap_or_default()
                .parse()
                .map_err(|e| SyncError::malformed(&self.name, format!("{key}: {e}")))
        };
        let contract = match row.get("contract").and_then(Value::as_str) {
            Some(_) => Some(address("contract")?),
            None => None,
        };
        let to = match row.get("to").and_then(Value::as_str) {
            Some(to) if !to.is_empty() => Some(address("to")?),
            _ => None,
        };

        Ok(TransferRow {
            hash: row["hash"].as_str().unwrap_or_default().to_lowercase(),
            block_height: row["blockNumber"].as_u64().unwrap_or_default(),
            timestamp: row["timestamp"].as_u64().unwrap_or_default(),
            from: address("from")?,
            to,
            value: parse_decimal(&self.name, row["value"].as_str().unwrap_or_default())?,
            fee: parse_decimal(&self.name, row["fee"].as_str().unwrap_or_default())?,
            contract,
            failed: row["status"].as_str() == Some("failed"),
            nonce: row["nonce"].as_u64(),
            metadata: row.clone(),
        })
    }

    /// Submit a signed transaction; answers with the transaction hash.
    pub async fn send_raw(&self, signed_raw: &str) -> SyncResult<String> {
        let raw = self
            .transport
            .post_json(&self.url("push/transaction", &[])?, &json!({ "data": signed_raw }))
            .await?;
        if let Some(message) = raw.get("error").and_then(|e| e.get("message")).and_then(Value::as_str) {
            return Err(SyncError::rejected(&self.name, message));
        }
        if !validate(&raw, Schema::AggregatorBroadcast) {
            return Err(SyncError::malformed(&self.name, "broadcast: unexpected shape"));
        }
        Ok(raw["data"]["transaction_hash"]
            .as_str()
            .unwrap_or_default()
            .to_lowercase())
    }
}

impl std::fmt::Debug for AggregatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorClient")
            .field("name", &self.name)
            .field("base", &self.base.as_str())
            .finish()
    }
}
