//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Liveness (shutdown.rs):
//!     engine.start() → alive → scheduler passes, flusher ticks
//!     engine.stop()  → cleared → no new checks, in-flight results discarded at merge
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → clear liveness → final snapshot save → exit
//! ```
//!
//! # Design Decisions
//! - One liveness flag per engine instance; nothing is process-global
//! - In-flight provider calls are never force-cancelled

pub mod shutdown;
pub mod signals;

pub use shutdown::Liveness;
