//! Balance fetcher.
//!
//! Peers answer per asset (explorer account API, RPC `eth_getBalance` / `balanceOf`). The
//! aggregator answers for every asset at once; its fan-in result is mapped back to
//! currency codes and handed over whole.

use std::collections::BTreeMap;

use crate::blockchain::types::{SyncError, SyncResult};
use crate::fetchers::{Asset, Fact, FactKind, FetchContext};
use crate::providers::aggregator::FanInBalances;
use crate::providers::{ordered_fallback, Candidate};

pub async fn fetch_balance(ctx: &FetchContext, code: &str) -> SyncResult<Fact> {
    let asset = ctx.asset(code)?;
    let address = ctx.address;
    let resource = format!("balance:{code}");
    let mut peers = Vec::new();

    for explorer in &ctx.providers.explorers {
        peers.push(Candidate::new(explorer.name(), move || async move {
            let balance = match asset {
                Asset::Native => explorer.native_balance(address).await?,
                Asset::Token(contract) => explorer.token_balance(address, contract).await?,
            };
            Ok(Fact::new(explorer.name(), single(code, balance)))
        }));
    }
    for rpc in &ctx.providers.rpcs {
        peers.push(Candidate::new(rpc.name(), move || async move {
            let balance = match asset {
                Asset::Native => rpc.native_balance(address).await?,
                Asset::Token(contract) => rpc.token_balance(address, contract).await?,
            };
            Ok(Fact::new(rpc.name(), single(code, balance)))
        }));
    }

    let secondary = ctx.providers.aggregator.as_ref().map(|aggregator| {
        Candidate::new(aggregator.name(), move || async move {
            let fan_in = aggregator.balances(address).await?;
            let balances = by_currency(ctx, &fan_in);
            if !balances.contains_key(code) {
                return Err(SyncError::malformed(
                    aggregator.name(),
                    format!("fan-in has no balance for {code}"),
                ));
            }
            Ok(Fact::new(aggregator.name(), FactKind::Balances(balances)))
        })
    });

    ordered_fallback(&resource, peers, secondary).await
}

fn single(code: &str, balance: String) -> FactKind {
    FactKind::Balances(BTreeMap::from([(code.to_string(), balance)]))
}

/// Map fan-in entries to enabled currency codes; unknown contracts are ignored.
fn by_currency(ctx: &FetchContext, fan_in: &FanInBalances) -> BTreeMap<String, String> {
    let mut balances = BTreeMap::new();
    for (contract, balance) in fan_in {
        if let Some(code) = ctx.code_for(*contract) {
            balances.insert(code.to_string(), balance.clone());
        }
    }
    balances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::testing::{context, OTHER, USDC, WALLET};
    use crate::providers::mock::{MockReply, MockTransport};
    use serde_json::json;

    fn fan_in() -> serde_json::Value {
        json!({"data": {WALLET: {
            "address": {"balance": "500"},
            "layer_2": {"erc_20": [
                {"token_address": USDC, "balance": "12"},
                {"token_address": OTHER, "balance": "99"}
            ]}
        }}})
    }

    #[tokio::test]
    async fn test_per_asset_token_balance() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::json(json!({"status": "1", "message": "OK", "result": "1000"})));
        mock.on("rpc.test", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x3e8"})));

        let fact = fetch_balance(&context(mock.clone()), "USDC").await.unwrap();
        assert_eq!(fact.kind, single("USDC", "1000".to_string()));
    }

    #[tokio::test]
    async fn test_fan_in_secondary_maps_codes() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::unavailable());
        mock.on("rpc.test", MockReply::unavailable());
        mock.on("agg.test", MockReply::json(fan_in()));

        let fact = fetch_balance(&context(mock), "ETH").await.unwrap();
        let FactKind::Balances(balances) = fact.kind else {
            panic!("expected balances");
        };
        assert_eq!(balances.len(), 2);
        assert_eq!(balances["ETH"], "500");
        assert_eq!(balances["USDC"], "12");
    }

    #[tokio::test]
    async fn test_fan_in_missing_requested_asset_fails() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::unavailable());
        mock.on("rpc.test", MockReply::unavailable());
        mock.on("agg.test", MockReply::json(json!({"data": {WALLET: {"address": {"balance": "500"}}}})));

        let err = fetch_balance(&context(mock), "USDC").await.unwrap_err();
        assert_eq!(err.underlying().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_currency_is_invalid_contract() {
        let err = fetch_balance(&context(MockTransport::new()), "DAI").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidContract(_)));
    }
}
