//! Wallet state subsystem.
//!
//! # Data Flow
//! ```text
//! Fact(s) from a fetcher
//!     → reconciler.rs (idempotent merge, stale-pending rollback)
//!     → snapshot.rs (working copy, then published Arc<Snapshot>)
//!     → events.rs (one notification per changed kind)
//! ```

pub mod events;
pub mod reconciler;
pub mod snapshot;

pub use events::{ChannelSink, LoggingSink, NotificationSink, WalletEvent};
pub use reconciler::{StateReconciler, UpdateSummary};
pub use snapshot::{Snapshot, TransactionRecord};

/// Wall-clock seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
