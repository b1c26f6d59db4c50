//! Change notifications.
//!
//! The reconciler raises at most one event of each kind per merge: one balance event
//! covering every changed asset, one transactions event covering every inserted or
//! updated record.

use alloy::primitives::U256;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use crate::state::snapshot::TransactionRecord;

/// Receiver of wallet state changes.
pub trait NotificationSink: Send + Sync {
    fn on_block_height_changed(&self, height: u64);

    fn on_nonce_changed(&self, _confirmed: U256, _next_unconfirmed: U256) {}

    /// Changed assets only: currency code → new balance.
    fn on_balance_changed(&self, changed: &BTreeMap<String, String>);

    fn on_transactions_changed(&self, records: &[TransactionRecord]);

    /// Locally submitted transactions removed by the stale-pending rollback.
    fn on_transactions_dropped(&self, _records: &[TransactionRecord]) {}
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn on_block_height_changed(&self, height: u64) {
        tracing::info!(height, "Block height changed");
    }

    fn on_nonce_changed(&self, confirmed: U256, next_unconfirmed: U256) {
        tracing::info!(confirmed = %confirmed, next = %next_unconfirmed, "Nonce changed");
    }

    fn on_balance_changed(&self, changed: &BTreeMap<String, String>) {
        for (code, balance) in changed {
            tracing::info!(currency = %code, balance = %balance, "Balance changed");
        }
    }

    fn on_transactions_changed(&self, records: &[TransactionRecord]) {
        tracing::info!(count = records.len(), "Transactions changed");
    }

    fn on_transactions_dropped(&self, records: &[TransactionRecord]) {
        for record in records {
            tracing::warn!(txid = %record.txid, currency = %record.currency, "Dropped stale pending transaction");
        }
    }
}

/// A notification as a value, for channel delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    BlockHeight(u64),
    Nonce { confirmed: U256, next_unconfirmed: U256 },
    Balances(BTreeMap<String, String>),
    Transactions(Vec<TransactionRecord>),
    Dropped(Vec<TransactionRecord>),
}

/// Forwards every notification into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<WalletEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WalletEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: WalletEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl NotificationSink for ChannelSink {
    fn on_block_height_changed(&self, height: u64) {
        self.send(WalletEvent::BlockHeight(height));
    }

    fn on_nonce_changed(&self, confirmed: U256, next_unconfirmed: U256) {
        self.send(WalletEvent::Nonce {
            confirmed,
            next_unconfirmed,
        });
    }

    fn on_balance_changed(&self, changed: &BTreeMap<String, String>) {
        self.send(WalletEvent::Balances(changed.clone()));
    }

    fn on_transactions_changed(&self, records: &[TransactionRecord]) {
        self.send(WalletEvent::Transactions(records.to_vec()));
    }

    fn on_transactions_dropped(&self, records: &[TransactionRecord]) {
        self.send(WalletEvent::Dropped(records.to_vec()));
    }
}
