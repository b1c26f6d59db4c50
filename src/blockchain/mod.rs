//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Provider codecs → client.rs (HTTP JSON transport with timeouts)
//! Spend path      → transaction.rs (intent, fee estimate, calldata)
//!                 → wallet.rs (signer collaborator)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All provider calls have configurable timeouts

pub mod client;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{HttpTransport, JsonTransport};
pub use transaction::{ConfiguredFeeEstimator, FeeEstimator, SpendIntent};
pub use types::{SyncError, SyncResult, TokenInfo};
pub use wallet::{LocalSigner, ReadOnlySigner, TransactionSigner};
