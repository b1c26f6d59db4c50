//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider call:
//!     → timeouts.rs (enforce request deadline)
//!     → On failure: the enclosing race moves to the next candidate
//!     → Retry cadence belongs to the poll scheduler, never to the call site
//! ```

pub mod timeouts;
