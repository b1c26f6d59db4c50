//! Local wallet state.
//!
//! The snapshot is exclusively owned by [`StateReconciler`](crate::state::StateReconciler):
//! every write goes through its merge, and everybody else reads an `Arc<Snapshot>` that is
//! never mutated after publication.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::spend::nonce::NonceAllocator;

/// One transaction as the wallet sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Chain transaction hash, lowercase.
    pub txid: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub currency: String,
    /// 0 while unconfirmed.
    pub block_height: u64,
    /// Signed decimal amount in base units; negative means outgoing.
    pub amount: String,
    /// Fee in the record's own currency; always "0" for token records.
    pub network_fee: String,
    /// Native-asset fee paid for a token spend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_network_fee: Option<String>,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Opaque provider payload.
    #[serde(default)]
    pub metadata: Value,
    /// Block height at which this process submitted the transaction; unset for records
    /// learned from providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at_height: Option<u64>,
}

impl TransactionRecord {
    pub fn is_pending(&self) -> bool {
        self.block_height == 0
    }
}

/// Render `value` as a signed decimal string.
pub fn signed_amount(negative: bool, value: U256) -> String {
    if negative && !value.is_zero() {
        format!("-{value}")
    } else {
        value.to_string()
    }
}

/// Everything the engine knows about the wallet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub block_height: u64,

    #[serde(flatten)]
    pub nonces: NonceAllocator,

    /// Currency code → decimal string in base units, exactly as the provider sent it.
    pub balances: BTreeMap<String, String>,

    /// Currency code → block height sampled before the last history check that merged rows.
    pub last_queried_height: BTreeMap<String, u64>,

    /// Currency code → txid → record.
    pub transactions: BTreeMap<String, BTreeMap<String, TransactionRecord>>,

    /// Unix seconds of the last merge that changed anything.
    pub updated_at: u64,
}

impl Snapshot {
    pub fn balance(&self, code: &str) -> Option<&str> {
        self.balances.get(code).map(String::as_str)
    }

    /// Records for `code`, newest first, pending rows at the top.
    pub fn transactions_for(&self, code: &str) -> Vec<&TransactionRecord> {
        let mut records: Vec<_> = self
            .transactions
            .get(code)
            .map(|by_id| by_id.values().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| {
            (!a.is_pending(), b.block_height, b.timestamp).cmp(&(!b.is_pending(), a.block_height, a.timestamp))
        });
        records
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.values().map(BTreeMap::len).sum()
    }

    /// Locally submitted records that have not been mined yet.
    pub fn pending_local(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.transactions
            .values()
            .flat_map(BTreeMap::values)
            .filter(|r| r.is_pending() && r.submitted_at_height.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(txid: &str, block_height: u64, timestamp: u64) -> TransactionRecord {
        TransactionRecord {
            txid: txid.to_string(),
            timestamp,
            currency: "ETH".to_string(),
            block_height,
            amount: "1".to_string(),
            network_fee: "0".to_string(),
            parent_network_fee: None,
            from: "0x1".to_string(),
            to: None,
            nonce: None,
            metadata: Value::Null,
            submitted_at_height: None,
        }
    }

    #[test]
    fn test_signed_amount() {
        assert_eq!(signed_amount(true, U256::from(42)), "-42");
        assert_eq!(signed_amount(false, U256::from(42)), "42");
        assert_eq!(signed_amount(true, U256::ZERO), "0");
    }

    #[test]
    fn test_transactions_sorted_pending_first() {
        let mut snapshot = Snapshot::default();
        let by_id = snapshot.transactions.entry("ETH".to_string()).or_default();
        for r in [record("0xa", 10, 100), record("0xb", 0, 300), record("0xc", 12, 200)] {
            by_id.insert(r.txid.clone(), r);
        }

        let order: Vec<_> = snapshot.transactions_for("ETH").iter().map(|r| r.txid.as_str()).collect();
        assert_eq!(order, ["0xb", "0xc", "0xa"]);
        assert_eq!(snapshot.transaction_count(), 3);
        assert!(snapshot.transactions_for("USDC").is_empty());
    }

    #[test]
    fn test_json_shape_flattens_nonces() {
        let mut snapshot = Snapshot::default();
        snapshot.nonces = NonceAllocator::new(U256::from(5));
        snapshot.balances.insert("ETH".to_string(), "01".to_string());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("confirmed_nonce").is_some());
        assert!(json.get("nonces").is_none());

        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
