//! Merge of fetched facts into the wallet snapshot.
//!
//! # Responsibilities
//! - Apply height, nonce, balance and transaction facts idempotently
//! - Roll back stale locally submitted transactions when the height moves
//! - Coalesce change notifications: at most one event of each kind per merge
//! - Publish an immutable copy of the snapshot for lock-free readers
//!
//! # Design Decisions
//! - The working snapshot sits behind a `std::sync::Mutex` that is never held across an
//!   await or a sink callback
//! - Readers load the last published `Arc<Snapshot>` through `ArcSwap`
//! - Balances compare by exact string, so "1" and "01" are different values

use alloy::primitives::U256;
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::blockchain::types::SyncResult;
use crate::fetchers::{Fact, FactKind};
use crate::observability::metrics;
use crate::state::events::NotificationSink;
use crate::state::snapshot::{Snapshot, TransactionRecord};

/// What one merge changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    pub block_height: Option<u64>,
    pub nonce: Option<(U256, U256)>,
    pub balances: BTreeMap<String, String>,
    pub transactions: Vec<TransactionRecord>,
    pub dropped: Vec<TransactionRecord>,
}

impl UpdateSummary {
    pub fn is_empty(&self) -> bool {
        self.block_height.is_none()
            && self.nonce.is_none()
            && self.balances.is_empty()
            && self.transactions.is_empty()
            && self.dropped.is_empty()
    }
}

/// Sole writer of the wallet snapshot.
pub struct StateReconciler {
    working: Mutex<Snapshot>,
    published: ArcSwap<Snapshot>,
    dirty: AtomicBool,
    sink: Arc<dyn NotificationSink>,
    stale_pending_blocks: u64,
}

impl StateReconciler {
    pub fn new(initial: Snapshot, sink: Arc<dyn NotificationSink>, stale_pending_blocks: u64) -> Self {
        Self {
            published: ArcSwap::from_pointee(initial.clone()),
            working: Mutex::new(initial),
            dirty: AtomicBool::new(false),
            sink,
            stale_pending_blocks,
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.load_full()
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Re-arm the dirty flag after a failed save.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // A panic while merging leaves a half-applied snapshot; keep serving it rather than
        // wedging every later merge.
        self.working.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, snapshot: &Snapshot) {
        self.published.store(Arc::new(snapshot.clone()));
        self.dirty.store(true, Ordering::Release);
        metrics::record_block_height(snapshot.block_height);
        metrics::record_pending_spends(snapshot.nonces.pending_spend_count);
    }

    /// Merge `facts` into the snapshot and notify the sink once per changed kind.
    ///
    /// `pre_update_height` is the block height sampled before the fetch started; it becomes
    /// the next history start for every asset whose batch was non-empty.
    pub fn process_update(&self, now: u64, facts: Vec<Fact>, pre_update_height: u64) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        let mut bookkeeping = false;
        {
            let mut snapshot = self.lock();

            for fact in facts {
                tracing::trace!(source = %fact.source, "Merging fact");
                match fact.kind {
                    FactKind::BlockHeight(height) => self.merge_height(&mut snapshot, height, &mut summary),
                    FactKind::Nonce(confirmed) => {
                        if snapshot.nonces.observe_confirmed(confirmed).changed {
                            summary.nonce =
                                Some((snapshot.nonces.confirmed_nonce, snapshot.nonces.next_unconfirmed_nonce));
                        }
                    }
                    FactKind::Balances(balances) => {
                        for (code, balance) in balances {
                            if snapshot.balances.get(&code) != Some(&balance) {
                                snapshot.balances.insert(code.clone(), balance.clone());
                                summary.balances.insert(code, balance);
                            }
                        }
                    }
                    FactKind::TransactionBatch { currency, records } => {
                        if records.is_empty() {
                            continue;
                        }
                        let by_id = snapshot.transactions.entry(currency.clone()).or_default();
                        for mut record in records {
                            match by_id.get_mut(&record.txid) {
                                Some(existing) => {
                                    record.submitted_at_height = existing.submitted_at_height;
                                    if *existing != record {
                                        *existing = record.clone();
                                        upsert_changed(&mut summary.transactions, record);
                                    }
                                }
                                None => {
                                    by_id.insert(record.txid.clone(), record.clone());
                                    upsert_changed(&mut summary.transactions, record);
                                }
                            }
                        }
                        let last = snapshot.last_queried_height.insert(currency, pre_update_height);
                        bookkeeping |= last != Some(pre_update_height);
                    }
                }
            }

            if !summary.is_empty() {
                snapshot.updated_at = now;
            }
            if !summary.is_empty() || bookkeeping {
                self.publish(&snapshot);
            }
        }

        self.notify(&summary);
        summary
    }

    fn merge_height(&self, snapshot: &mut Snapshot, height: u64, summary: &mut UpdateSummary) {
        if height == snapshot.block_height {
            return;
        }

        let window = self.stale_pending_blocks;
        let mut dropped = Vec::new();
        for by_id in snapshot.transactions.values_mut() {
            by_id.retain(|_, record| {
                // Submitted before any height was known: start the window now.
                if record.submitted_at_height == Some(0) {
                    record.submitted_at_height = Some(height);
                }
                let stale = record.is_pending()
                    && record
                        .submitted_at_height
                        .is_some_and(|submitted| height.saturating_sub(submitted) >= window);
                if stale {
                    dropped.push(record.clone());
                }
                !stale
            });
        }
        if !dropped.is_empty() {
            snapshot.nonces.drop_pending(dropped.len() as u64);
            tracing::warn!(count = dropped.len(), height, "Rolled back stale pending transactions");
            summary.dropped.extend(dropped);
        }

        tracing::debug!(from = snapshot.block_height, to = height, "Block height advanced");
        snapshot.block_height = height;
        summary.block_height = Some(height);
    }

    fn notify(&self, summary: &UpdateSummary) {
        if let Some(height) = summary.block_height {
            metrics::record_notification("block_height");
            self.sink.on_block_height_changed(height);
        }
        if let Some((confirmed, next)) = summary.nonce {
            metrics::record_notification("nonce");
            self.sink.on_nonce_changed(confirmed, next);
        }
        if !summary.balances.is_empty() {
            metrics::record_notification("balances");
            self.sink.on_balance_changed(&summary.balances);
        }
        if !summary.transactions.is_empty() {
            metrics::record_notification("transactions");
            self.sink.on_transactions_changed(&summary.transactions);
        }
        if !summary.dropped.is_empty() {
            metrics::record_notification("dropped");
            self.sink.on_transactions_dropped(&summary.dropped);
        }
    }

    /// Reserve a nonce for an outgoing spend.
    pub fn allocate_nonce(&self, max_pending: u64) -> SyncResult<U256> {
        let mut snapshot = self.lock();
        let nonce = snapshot.nonces.allocate(max_pending)?;
        self.publish(&snapshot);
        Ok(nonce)
    }

    /// Return a nonce whose spend never reached the network.
    pub fn release_nonce(&self, nonce: U256) {
        let mut snapshot = self.lock();
        if snapshot.nonces.release(nonce) {
            self.publish(&snapshot);
        } else {
            tracing::debug!(nonce = %nonce, "Nonce not released; a later spend already holds the next one");
        }
    }

    /// Track a transaction this process just broadcast.
    pub fn record_pending(&self, now: u64, record: TransactionRecord) {
        {
            let mut snapshot = self.lock();
            snapshot
                .transactions
                .entry(record.currency.clone())
                .or_default()
                .insert(record.txid.clone(), record.clone());
            snapshot.updated_at = now;
            self.publish(&snapshot);
        }
        metrics::record_notification("transactions");
        self.sink.on_transactions_changed(std::slice::from_ref(&record));
    }
}

impl std::fmt::Debug for StateReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReconciler")
            .field("dirty", &self.is_dirty())
            .field("stale_pending_blocks", &self.stale_pending_blocks)
            .finish()
    }
}

fn upsert_changed(changed: &mut Vec<TransactionRecord>, record: TransactionRecord) {
    match changed.iter_mut().find(|r| r.txid == record.txid && r.currency == record.currency) {
        Some(existing) => *existing = record,
        None => changed.push(record),
    }
}
