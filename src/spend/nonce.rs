//! Nonce allocation for outgoing spends.
//!
//! Tracks the network's confirmed nonce alongside the next nonce this process may hand
//! out. Holds `next_unconfirmed_nonce >= confirmed_nonce` at all times; in normal operation
//! `pending_spend_count == next_unconfirmed_nonce - confirmed_nonce`.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::blockchain::types::{SyncError, SyncResult};
use crate::observability::metrics;

/// Result of folding a freshly fetched confirmed nonce into the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceObservation {
    /// Any of the three counters moved.
    pub changed: bool,
    /// The network confirmed more transactions than this process knew about.
    pub anomaly: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceAllocator {
    pub confirmed_nonce: U256,
    pub next_unconfirmed_nonce: U256,
    pub pending_spend_count: u64,
}

impl NonceAllocator {
    pub fn new(confirmed_nonce: U256) -> Self {
        Self {
            confirmed_nonce,
            next_unconfirmed_nonce: confirmed_nonce,
            pending_spend_count: 0,
        }
    }

    /// Hand out the nonce for the next spend.
    ///
    /// Fails with `ExcessivePendingSpends` once the gap to the confirmed nonce exceeds
    /// `max_pending`.
    pub fn allocate(&mut self, max_pending: u64) -> SyncResult<U256> {
        if self.pending_spend_count > 0 && self.next_unconfirmed_nonce > self.confirmed_nonce {
            let diff = self.next_unconfirmed_nonce - self.confirmed_nonce;
            if diff > U256::from(max_pending) {
                return Err(SyncError::ExcessivePendingSpends {
                    pending: diff,
                    limit: max_pending,
                });
            }
            let nonce = self.next_unconfirmed_nonce;
            self.next_unconfirmed_nonce += U256::from(1);
            self.pending_spend_count += 1;
            return Ok(nonce);
        }

        let nonce = self.confirmed_nonce;
        self.next_unconfirmed_nonce = nonce + U256::from(1);
        self.pending_spend_count = 1;
        Ok(nonce)
    }

    /// Give back `nonce` after a failed sign or broadcast.
    ///
    /// Only the newest allocation can be returned; anything older is already followed by
    /// another spend and stays consumed.
    pub fn release(&mut self, nonce: U256) -> bool {
        if self.pending_spend_count == 0 || self.next_unconfirmed_nonce != nonce + U256::from(1) {
            return false;
        }
        self.next_unconfirmed_nonce = nonce;
        self.pending_spend_count -= 1;
        if self.pending_spend_count == 0 {
            self.next_unconfirmed_nonce = self.confirmed_nonce;
        }
        true
    }

    /// Forget `count` spends that were rolled back as stale.
    pub fn drop_pending(&mut self, count: u64) {
        self.pending_spend_count = self.pending_spend_count.saturating_sub(count);
        if self.pending_spend_count == 0 {
            self.next_unconfirmed_nonce = self.confirmed_nonce;
        }
    }

    /// Fold in the confirmed nonce reported by the network.
    pub fn observe_confirmed(&mut self, confirmed: U256) -> NonceObservation {
        let before = self.clone();
        let mut anomaly = false;

        self.confirmed_nonce = confirmed;
        if self.pending_spend_count == 0 {
            self.next_unconfirmed_nonce = confirmed;
        } else {
            if confirmed > before.next_unconfirmed_nonce {
                anomaly = true;
                metrics::record_nonce_anomaly();
                tracing::warn!(
                    confirmed = %confirmed,
                    tracked_next = %before.next_unconfirmed_nonce,
                    pending = before.pending_spend_count,
                    "Confirmed nonce passed every tracked spend; an untracked spend was mined"
                );
            }
            self.next_unconfirmed_nonce = self.next_unconfirmed_nonce.max(confirmed);
            let gap = self.next_unconfirmed_nonce - confirmed;
            self.pending_spend_count = u64::try_from(gap).unwrap_or(u64::MAX);
        }

        NonceObservation {
            changed: *self != before,
            anomaly,
        }
    }
}
