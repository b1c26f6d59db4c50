//! Broadcast racing for signed transactions.
//!
//! Every broadcast-capable endpoint gets the raw transaction at once; the first to accept
//! it wins. Endpoints answer in different shapes (a bare `result` string, a nested
//! `{data: {transaction_hash}}`); each client normalizes to the hash before the race.

use crate::blockchain::types::{SyncError, SyncResult};
use crate::providers::{first_success, Candidate, ProviderSet};

/// Broadcast `signed_raw` and return the hash reported by the winning endpoint.
///
/// When every endpoint fails and the last failure is an application error (e.g. "nonce
/// too low"), that error is returned verbatim instead of the aggregate.
pub async fn broadcast(providers: &ProviderSet, signed_raw: &str) -> SyncResult<String> {
    let mut candidates = Vec::new();

    for explorer in &providers.explorers {
        candidates.push(Candidate::new(explorer.name(), move || explorer.send_raw(signed_raw)));
    }
    for rpc in &providers.rpcs {
        candidates.push(Candidate::new(rpc.name(), move || rpc.send_raw(signed_raw)));
    }
    if let Some(aggregator) = &providers.aggregator {
        candidates.push(Candidate::new(aggregator.name(), move || aggregator.send_raw(signed_raw)));
    }

    match first_success("broadcast", candidates).await {
        Ok(hash) => Ok(hash),
        Err(SyncError::AllProvidersFailed(mut errors)) => match errors.pop() {
            Some(last @ SyncError::ProviderRejected { .. }) => Err(last),
            Some(last) => {
                errors.push(last);
                Err(SyncError::AllProvidersFailed(errors))
            }
            None => Err(SyncError::AllProvidersFailed(errors)),
        },
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::testing::context;
    use crate::providers::mock::{MockReply, MockTransport};
    use serde_json::json;

    const HASH: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

    #[tokio::test(start_paused = true)]
    async fn test_first_acceptance_wins() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::delayed(json!({"jsonrpc": "2.0", "id": 1, "result": HASH}), 50));
        mock.on("rpc.test", MockReply::unavailable());
        mock.on("agg.test", MockReply::delayed(json!({"data": {"transaction_hash": HASH}}), 10));

        let providers = context(mock.clone()).providers;
        assert_eq!(broadcast(&providers, "0xf86b").await.unwrap(), HASH);
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_application_error_surfaces_when_last() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::unavailable());
        mock.on("rpc.test", MockReply::json(json!({"status": "0"})));
        mock.on(
            "agg.test",
            MockReply::delayed(json!({"error": {"message": "nonce too low"}}), 20),
        );

        let err = broadcast(&context(mock).providers, "0xf86b").await.unwrap_err();
        assert_eq!(err.to_string(), "nonce too low");
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_failure_keeps_aggregate() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "error": {"message": "already known"}})));
        mock.on("rpc.test", MockReply::delayed(json!({"result": "0x12"}), 10));
        mock.on("agg.test", MockReply::unavailable());

        let err = broadcast(&context(mock).providers, "0xf86b").await.unwrap_err();
        assert_eq!(err.underlying().len(), 3);
    }
}
