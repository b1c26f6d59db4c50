//! Confirmed nonce fetcher: transaction count for the wallet address, hex sources only.

use crate::blockchain::types::SyncResult;
use crate::fetchers::{Fact, FactKind, FetchContext};
use crate::providers::{ordered_fallback, Candidate};

pub async fn fetch_nonce(ctx: &FetchContext) -> SyncResult<Fact> {
    let address = ctx.address;
    let mut peers = Vec::new();

    for explorer in &ctx.providers.explorers {
        peers.push(Candidate::new(explorer.name(), move || async move {
            let count = explorer.transaction_count(address).await?;
            Ok(Fact::new(explorer.name(), FactKind::Nonce(count)))
        }));
    }
    for rpc in &ctx.providers.rpcs {
        peers.push(Candidate::new(rpc.name(), move || async move {
            let count = rpc.transaction_count(address).await?;
            Ok(Fact::new(rpc.name(), FactKind::Nonce(count)))
        }));
    }

    ordered_fallback("nonce", peers, None).await
}
