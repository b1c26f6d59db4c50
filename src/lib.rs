//! Multi-provider wallet state synchronization.

pub mod admin;
pub mod blockchain;
pub mod config;
pub mod engine;
pub mod fetchers;
pub mod lifecycle;
pub mod observability;
pub mod persistence;
pub mod providers;
pub mod resilience;
pub mod scheduler;
pub mod spend;
pub mod state;

pub use blockchain::types::{SyncError, SyncResult};
pub use config::schema::EngineConfig;
pub use engine::{EngineDeps, WalletEngine};
pub use lifecycle::Liveness;
pub use state::{NotificationSink, Snapshot, TransactionRecord};
