//! Block height fetcher.
//!
//! Hex-returning peers (explorers and RPC gateways) in shuffled order, then the
//! aggregator's decimal height as the secondary.

use crate::blockchain::types::{height_from_quantity, SyncResult};
use crate::fetchers::{Fact, FactKind, FetchContext};
use crate::providers::{ordered_fallback, Candidate};

pub async fn fetch_block_height(ctx: &FetchContext) -> SyncResult<Fact> {
    let mut peers = Vec::new();

    for explorer in &ctx.providers.explorers {
        peers.push(Candidate::new(explorer.name(), move || async move {
            let height = height_from_quantity(explorer.name(), explorer.block_height().await?)?;
            Ok(Fact::new(explorer.name(), FactKind::BlockHeight(height)))
        }));
    }
    for rpc in &ctx.providers.rpcs {
        peers.push(Candidate::new(rpc.name(), move || async move {
            let height = height_from_quantity(rpc.name(), rpc.block_number().await?)?;
            Ok(Fact::new(rpc.name(), FactKind::BlockHeight(height)))
        }));
    }

    let secondary = ctx.providers.aggregator.as_ref().map(|aggregator| {
        Candidate::new(aggregator.name(), move || async move {
            let height = aggregator.block_height().await?;
            Ok(Fact::new(aggregator.name(), FactKind::BlockHeight(height)))
        })
    });

    ordered_fallback("height", peers, secondary).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::SyncError;
    use crate::fetchers::testing::context;
    use crate::providers::mock::{MockReply, MockTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_hex_peer_answers() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x64"})));
        mock.on("rpc.test", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x64"})));

        let fact = fetch_block_height(&context(mock.clone())).await.unwrap();
        assert_eq!(fact.kind, FactKind::BlockHeight(100));
        assert_eq!(mock.count("agg.test"), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_decimal_secondary() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::json(json!({"status": "0", "message": "NOTOK", "result": "Max rate limit reached"})));
        mock.on("rpc.test", MockReply::unavailable());
        mock.on("agg.test", MockReply::json(json!({"data": {"best_block_height": 18000000}})));

        let fact = fetch_block_height(&context(mock.clone())).await.unwrap();
        assert_eq!(fact.kind, FactKind::BlockHeight(18_000_000));
        assert_eq!(fact.source, "aggregator");
        // The secondary always comes after both peers.
        assert_eq!(mock.calls().len(), 3);
        assert!(mock.calls()[2].contains("agg.test"));
    }

    #[tokio::test]
    async fn test_negative_height_is_a_failure() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": "-0x1"})));
        mock.on("rpc.test", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": "12"})));
        mock.on("agg.test", MockReply::json(json!({"data": {"best_block_height": -5}})));

        let err = fetch_block_height(&context(mock)).await.unwrap_err();
        assert!(matches!(err, SyncError::AllProvidersFailed(ref errors) if errors.len() == 3));
    }
}
