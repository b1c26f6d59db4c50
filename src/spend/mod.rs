//! Spend path.
//!
//! # Data Flow
//! ```text
//! submit_spend(intent)
//!     → validate currency, recipient, amount
//!     → FeeEstimator (gas limit, gas price)
//!     → funds check against the published snapshot
//!     → nonce.rs (allocate under the pending-spend cap)
//!     → TransactionSigner (collaborator, never sees state)
//!     → transmitter.rs (first_success over every broadcast endpoint)
//!     → StateReconciler::record_pending
//! ```
//!
//! A nonce whose spend failed to sign or broadcast is released again.

pub mod nonce;
pub mod transmitter;

pub use nonce::NonceAllocator;
pub use transmitter::broadcast;
