//! Transaction history fetcher.
//!
//! # Pagination
//! - Explorers: numbered pages of [`PAGE_SIZE`] rows, ascending from `start_block`. A page
//!   shorter than `PAGE_SIZE` is the last one.
//! - Aggregator: cursor links, newest first. The walk ends when there is no next link or a
//!   confirmed row at or below `start_block` shows up.
//!
//! Either walk stops after [`MAX_PAGES`] pages.
//!
//! # Classification
//! Rows are classified relative to the wallet address. Rows that do not involve the wallet,
//! or that belong to another asset than the one requested, are dropped.

use alloy::primitives::{Address, U256};
use std::collections::hash_map::{Entry, HashMap};

use crate::blockchain::types::SyncResult;
use crate::fetchers::{Fact, FactKind, FetchContext};
use crate::providers::explorer::PAGE_SIZE;
use crate::providers::{ordered_fallback, AggregatorClient, Candidate, ExplorerClient, TransferRow};
use crate::state::snapshot::{signed_amount, TransactionRecord};

/// Upper bound on pages fetched in one history check.
pub const MAX_PAGES: u32 = 200;

pub async fn fetch_history(ctx: &FetchContext, start_block: u64, code: &str) -> SyncResult<Fact> {
    let contract = ctx.asset(code)?.contract();
    let address = ctx.address;
    let resource = format!("history:{code}");

    let peers = ctx
        .providers
        .explorers
        .iter()
        .map(|explorer| {
            Candidate::new(explorer.name(), move || async move {
                let rows = numbered_pages(explorer, address, contract, start_block).await?;
                Ok((explorer.name(), rows))
            })
        })
        .collect();

    let secondary = ctx.providers.aggregator.as_ref().map(|aggregator| {
        Candidate::new(aggregator.name(), move || async move {
            let rows = cursor_pages(aggregator, address, contract, start_block).await?;
            Ok((aggregator.name(), rows))
        })
    });

    let (source, rows) = ordered_fallback(&resource, peers, secondary).await?;

    let mut records: Vec<TransactionRecord> = Vec::with_capacity(rows.len());
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        let Some(record) = classify(ctx, code, row) else {
            continue;
        };
        // A transaction can show up more than once in a token feed; the later row wins.
        match positions.entry(record.txid.clone()) {
            Entry::Occupied(slot) => records[*slot.get()] = record,
            Entry::Vacant(slot) => {
                slot.insert(records.len());
                records.push(record);
            }
        }
    }

    tracing::debug!(
        resource = %resource,
        provider = %source,
        start_block,
        records = records.len(),
        "History fetched"
    );
    Ok(Fact::new(
        source,
        FactKind::TransactionBatch {
            currency: code.to_string(),
            records,
        },
    ))
}

async fn numbered_pages(
    explorer: &ExplorerClient,
    address: Address,
    contract: Option<Address>,
    start_block: u64,
) -> SyncResult<Vec<TransferRow>> {
    let mut rows = Vec::new();
    for page in 1..=MAX_PAGES {
        let batch = explorer.tx_page(address, contract, start_block, page).await?;
        let last = batch.len() < PAGE_SIZE;
        rows.extend(batch);
        if last {
            return Ok(rows);
        }
    }
    tracing::warn!(provider = %explorer.name(), pages = MAX_PAGES, "History page cap reached");
    Ok(rows)
}

async fn cursor_pages(
    aggregator: &AggregatorClient,
    address: Address,
    contract: Option<Address>,
    start_block: u64,
) -> SyncResult<Vec<TransferRow>> {
    let mut rows = Vec::new();
    let mut url = aggregator.first_page_url(address, contract)?;

    for _ in 0..MAX_PAGES {
        let (batch, next) = aggregator.tx_page(&url).await?;
        let mut reached_start = false;
        for row in batch {
            // Pending rows carry height 0 and never end the walk.
            if row.block_height != 0 && row.block_height <= start_block {
                reached_start = true;
                if row.block_height < start_block {
                    continue;
                }
            }
            rows.push(row);
        }
        match next {
            Some(next) if !reached_start => url = next,
            _ => return Ok(rows),
        }
    }
    tracing::warn!(provider = %aggregator.name(), pages = MAX_PAGES, "History page cap reached");
    Ok(rows)
}

/// Turn a provider row into a wallet record, or `None` if it is not ours.
fn classify(ctx: &FetchContext, code: &str, row: TransferRow) -> Option<TransactionRecord> {
    if ctx.code_for(row.contract) != Some(code) {
        return None;
    }

    let outgoing = row.from == ctx.address;
    let incoming = row.to == Some(ctx.address);
    let is_token = row.contract.is_some();

    let (amount, network_fee, parent_network_fee) = if outgoing {
        // Self-sends and reverted spends only cost the fee.
        let moved = if incoming || row.failed { U256::ZERO } else { row.value };
        if is_token {
            (signed_amount(true, moved), "0".to_string(), Some(row.fee.to_string()))
        } else {
            (signed_amount(true, moved.saturating_add(row.fee)), row.fee.to_string(), None)
        }
    } else if incoming {
        if row.failed {
            return None;
        }
        let fee = if is_token { "0".to_string() } else { row.fee.to_string() };
        (signed_amount(false, row.value), fee, None)
    } else {
        return None;
    };

    Some(TransactionRecord {
        txid: row.hash,
        timestamp: row.timestamp,
        currency: code.to_string(),
        block_height: row.block_height,
        amount,
        network_fee,
        parent_network_fee,
        from: row.from.to_string(),
        to: row.to.map(|to| to.to_string()),
        nonce: row.nonce,
        metadata: row.metadata,
        submitted_at_height: None,
    })
}
